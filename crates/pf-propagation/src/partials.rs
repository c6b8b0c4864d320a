//! State transition matrix of two-body motion.
//!
//! The matrix is integrated as a 36-component additional state, stored
//! row-major, with `dPhi/dt = A(t) Phi` where `A` is the Jacobian of the
//! Cartesian point-mass dynamics.

use nalgebra::{Matrix3, Matrix6};

use crate::error::{PropagationError, PropagationResult};
use crate::generators::IntegrableGenerator;
use crate::state::SpacecraftState;

pub const STM_DIMENSION: usize = 36;

#[derive(Clone, Debug)]
pub struct StateTransitionGenerator {
    name: String,
}

impl StateTransitionGenerator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Identity matrix, the value at the reference epoch.
    pub fn initial_value() -> Vec<f64> {
        let mut value = vec![0.0; STM_DIMENSION];
        for i in 0..6 {
            value[i * 7] = 1.0;
        }
        value
    }
}

impl Default for StateTransitionGenerator {
    fn default() -> Self {
        Self::new("stm")
    }
}

impl IntegrableGenerator for StateTransitionGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn compute_derivatives(&mut self, state: &SpacecraftState) -> PropagationResult<Vec<f64>> {
        let phi = state_transition_matrix(state, &self.name)?;
        let orbit = state.orbit();
        let r = orbit.position();
        let r_norm = r.norm();
        let gradient =
            (r * r.transpose() * (3.0 / (r_norm * r_norm)) - Matrix3::identity()) * (orbit.mu() / r_norm.powi(3));

        let mut jacobian = Matrix6::zeros();
        jacobian.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());
        jacobian.fixed_view_mut::<3, 3>(3, 0).copy_from(&gradient);
        let derivative = jacobian * phi;
        Ok(derivative.transpose().as_slice().to_vec())
    }
}

/// State transition matrix stored under `name` in `state`.
pub fn state_transition_matrix(state: &SpacecraftState, name: &str) -> PropagationResult<Matrix6<f64>> {
    let value = state.additional_state(name)?;
    if value.len() != STM_DIMENSION {
        return Err(PropagationError::DimensionMismatch {
            what: "state transition matrix",
            expected: STM_DIMENSION,
            actual: value.len(),
        });
    }
    Ok(Matrix6::from_row_slice(value))
}
