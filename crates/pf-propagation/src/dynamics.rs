//! Reference dynamics.

use crate::equations::MainStateEquations;
use crate::error::PropagationResult;
use crate::mapper::{BASIC_DIMENSION, StateMapper};
use crate::orbit::{OrbitType, PositionAngle};
use crate::state::SpacecraftState;

/// Unperturbed two-body motion with constant mass.
///
/// Works in every element set: Cartesian elements get the point-mass
/// acceleration, element sets only see their anomaly advance.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeplerianMotion;

impl MainStateEquations for KeplerianMotion {
    fn compute_derivatives(
        &mut self,
        state: &SpacecraftState,
        mapper: &StateMapper,
    ) -> PropagationResult<Vec<f64>> {
        let orbit = state.orbit();
        let mu = orbit.mu();
        let mut derivative = vec![0.0; BASIC_DIMENSION];
        match mapper.orbit_type() {
            OrbitType::Cartesian => {
                let r = orbit.position();
                let acceleration = r * (-mu / r.norm().powi(3));
                derivative[..3].copy_from_slice(orbit.velocity().as_slice());
                derivative[3..6].copy_from_slice(acceleration.as_slice());
            }
            OrbitType::Keplerian => {
                let k = orbit.keplerian()?;
                let n = (mu / k.a.powi(3)).sqrt();
                derivative[5] = match mapper.position_angle() {
                    PositionAngle::Mean => n,
                    PositionAngle::Eccentric => n / (1.0 - k.e * k.eccentric_anomaly().cos()),
                    PositionAngle::True => {
                        let ecv = 1.0 + k.e * k.true_anomaly.cos();
                        n * ecv * ecv / (1.0 - k.e * k.e).powf(1.5)
                    }
                };
            }
            OrbitType::Equinoctial => {
                let q = orbit.equinoctial()?;
                let n = (mu / q.a.powi(3)).sqrt();
                derivative[5] = match mapper.position_angle() {
                    PositionAngle::Mean => n,
                    PositionAngle::Eccentric => {
                        let (s, c) = q.eccentric_longitude().sin_cos();
                        n / (1.0 - q.ex * c - q.ey * s)
                    }
                    PositionAngle::True => {
                        let (s, c) = q.true_longitude.sin_cos();
                        let ecv = 1.0 + q.ex * c + q.ey * s;
                        let e2 = q.ex * q.ex + q.ey * q.ey;
                        n * ecv * ecv / (1.0 - e2).powf(1.5)
                    }
                };
            }
        }
        Ok(derivative)
    }
}
