//! Continuous output assembled from the interpolators of accepted steps.

use crate::error::{OdeError, OdeResult};
use crate::handlers::StepHandler;
use crate::interpolator::StepInterpolator;
use crate::state::OdeStateAndDerivative;

/// Piecewise model covering every step handed to it, in integration order.
#[derive(Clone, Debug, Default)]
pub struct DenseOutputModel {
    steps: Vec<StepInterpolator>,
    initial_time: f64,
    final_time: f64,
    forward: bool,
}

impl DenseOutputModel {
    pub fn new() -> Self {
        Self {
            forward: true,
            ..Self::default()
        }
    }

    pub fn initial_time(&self) -> f64 {
        self.initial_time
    }

    pub fn final_time(&self) -> f64 {
        self.final_time
    }

    pub fn is_forward(&self) -> bool {
        self.forward
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn number_of_steps(&self) -> usize {
        self.steps.len()
    }

    /// Append one step. The first step fixes the initial time and direction.
    pub fn append(&mut self, interpolator: &StepInterpolator) {
        if self.steps.is_empty() {
            self.initial_time = interpolator.previous_state().time();
            self.forward = interpolator.is_forward();
        }
        self.final_time = interpolator.current_state().time();
        self.steps.push(interpolator.clone());
    }

    /// Interpolated state at `time`. Times outside the covered span are
    /// extrapolated from the nearest step.
    pub fn interpolated_state(&self, time: f64) -> OdeResult<OdeStateAndDerivative> {
        if self.steps.is_empty() {
            return Err(OdeError::EmptyModel);
        }
        let forward = self.forward;
        let index = self.steps.partition_point(|step| {
            let end = step.current_state().time();
            if forward { end < time } else { end > time }
        });
        let step = &self.steps[index.min(self.steps.len() - 1)];
        Ok(step.interpolated_state(time))
    }
}

impl StepHandler for DenseOutputModel {
    fn init(&mut self, initial: &OdeStateAndDerivative, final_time: f64) -> OdeResult<()> {
        self.steps.clear();
        self.initial_time = initial.time();
        self.final_time = initial.time();
        self.forward = final_time >= initial.time();
        Ok(())
    }

    fn handle_step(&mut self, interpolator: &StepInterpolator) -> OdeResult<()> {
        self.append(interpolator);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::EquationsMapper;

    fn line(t0: f64, t1: f64) -> StepInterpolator {
        // y = 2 t
        StepInterpolator::hermite(
            EquationsMapper::new(1),
            t0,
            &[2.0 * t0],
            &[2.0],
            t1,
            &[2.0 * t1],
            &[2.0],
        )
    }

    #[test]
    fn empty_model_fails() {
        assert!(matches!(
            DenseOutputModel::new().interpolated_state(0.0),
            Err(OdeError::EmptyModel)
        ));
    }

    #[test]
    fn picks_the_covering_step_in_both_directions() {
        let mut forward = DenseOutputModel::new();
        for (a, b) in [(0.0, 1.0), (1.0, 2.5), (2.5, 4.0)] {
            forward.append(&line(a, b));
        }
        assert_eq!(forward.initial_time(), 0.0);
        assert_eq!(forward.final_time(), 4.0);
        let s = forward.interpolated_state(3.0).unwrap();
        assert!((s.primary()[0] - 6.0).abs() < 1e-12);

        let mut backward = DenseOutputModel::new();
        for (a, b) in [(4.0, 2.5), (2.5, 1.0)] {
            backward.append(&line(a, b));
        }
        assert!(!backward.is_forward());
        let s = backward.interpolated_state(1.5).unwrap();
        assert!((s.primary()[0] - 3.0).abs() < 1e-12);
    }
}
