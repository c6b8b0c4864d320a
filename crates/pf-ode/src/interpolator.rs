//! Dense interpolants over a single accepted step.

use crate::state::{EquationsMapper, OdeStateAndDerivative};

/// Continuous extension coefficients of one step, over the complete state vector.
#[derive(Clone, Debug)]
enum DenseStep {
    /// Dormand–Prince 5(4) continuous extension:
    /// `y(θ) = r0 + θ (r1 + η (r2 + θ (r3 + η r4)))` with `η = 1 - θ`.
    DormandPrince { r: [Vec<f64>; 5] },
    /// Cubic Hermite polynomial on both step ends.
    Hermite {
        y0: Vec<f64>,
        f0: Vec<f64>,
        y1: Vec<f64>,
        f1: Vec<f64>,
    },
}

/// Interpolator over one step `[t0, t0 + h]`.
///
/// The coefficients always span the full integrator step. The soft bounds
/// returned by [`previous_state`](Self::previous_state) and
/// [`current_state`](Self::current_state) may be narrower after
/// [`restrict_step`](Self::restrict_step), for instance when an event
/// truncates the step.
#[derive(Clone, Debug)]
pub struct StepInterpolator {
    mapper: EquationsMapper,
    t0: f64,
    h: f64,
    dense: DenseStep,
    soft_previous: OdeStateAndDerivative,
    soft_current: OdeStateAndDerivative,
}

impl StepInterpolator {
    /// Interpolator for a Dormand–Prince step from its seven stage derivatives.
    ///
    /// `t1` is the step end as reported to handlers; it equals `t0 + h` up to
    /// rounding, and exactly the target time on the final step.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn dormand_prince(
        mapper: EquationsMapper,
        t0: f64,
        y0: &[f64],
        t1: f64,
        y1: &[f64],
        stages: &[Vec<f64>; 7],
        h: f64,
        dense_weights: &[f64; 7],
    ) -> Self {
        let n = y0.len();
        let mut r: [Vec<f64>; 5] = Default::default();
        r[0] = y0.to_vec();
        r[1] = (0..n).map(|i| y1[i] - y0[i]).collect();
        r[2] = (0..n).map(|i| h * stages[0][i] - r[1][i]).collect();
        r[3] = (0..n).map(|i| r[1][i] - h * stages[6][i] - r[2][i]).collect();
        r[4] = (0..n)
            .map(|i| {
                h * stages
                    .iter()
                    .zip(dense_weights)
                    .map(|(k, d)| d * k[i])
                    .sum::<f64>()
            })
            .collect();

        let soft_previous = mapper.map_state_and_derivative(t0, y0, &stages[0]);
        let soft_current = mapper.map_state_and_derivative(t1, y1, &stages[6]);
        Self {
            mapper,
            t0,
            h,
            dense: DenseStep::DormandPrince { r },
            soft_previous,
            soft_current,
        }
    }

    /// Cubic Hermite interpolator between two states and their derivatives.
    pub(crate) fn hermite(
        mapper: EquationsMapper,
        t0: f64,
        y0: &[f64],
        f0: &[f64],
        t1: f64,
        y1: &[f64],
        f1: &[f64],
    ) -> Self {
        let soft_previous = mapper.map_state_and_derivative(t0, y0, f0);
        let soft_current = mapper.map_state_and_derivative(t1, y1, f1);
        Self {
            mapper,
            t0,
            h: t1 - t0,
            dense: DenseStep::Hermite {
                y0: y0.to_vec(),
                f0: f0.to_vec(),
                y1: y1.to_vec(),
                f1: f1.to_vec(),
            },
            soft_previous,
            soft_current,
        }
    }

    pub fn previous_state(&self) -> &OdeStateAndDerivative {
        &self.soft_previous
    }

    pub fn current_state(&self) -> &OdeStateAndDerivative {
        &self.soft_current
    }

    pub fn is_forward(&self) -> bool {
        self.h >= 0.0
    }

    pub fn mapper(&self) -> &EquationsMapper {
        &self.mapper
    }

    /// Start of the full integrator step, ignoring any restriction.
    pub fn global_previous_time(&self) -> f64 {
        self.t0
    }

    /// End of the full integrator step, ignoring any restriction.
    pub fn global_current_time(&self) -> f64 {
        self.t0 + self.h
    }

    /// Copy of this interpolator with narrower soft bounds.
    pub fn restrict_step(
        &self,
        previous: OdeStateAndDerivative,
        current: OdeStateAndDerivative,
    ) -> Self {
        Self {
            soft_previous: previous,
            soft_current: current,
            ..self.clone()
        }
    }

    /// State and derivative at `time`, which should lie within the step.
    pub fn interpolated_state(&self, time: f64) -> OdeStateAndDerivative {
        let (y, y_dot) = self.interpolate(time);
        self.mapper.map_state_and_derivative(time, &y, &y_dot)
    }

    fn interpolate(&self, time: f64) -> (Vec<f64>, Vec<f64>) {
        let theta = (time - self.t0) / self.h;
        match &self.dense {
            DenseStep::DormandPrince { r } => {
                let eta = 1.0 - theta;
                let n = r[0].len();
                let mut y = Vec::with_capacity(n);
                let mut y_dot = Vec::with_capacity(n);
                for i in 0..n {
                    let c = r[3][i] + eta * r[4][i];
                    let b = r[2][i] + theta * c;
                    let a = r[1][i] + eta * b;
                    y.push(r[0][i] + theta * a);

                    let dc = -r[4][i];
                    let db = c + theta * dc;
                    let da = -b + eta * db;
                    y_dot.push((a + theta * da) / self.h);
                }
                (y, y_dot)
            }
            DenseStep::Hermite { y0, f0, y1, f1 } => {
                let s = theta;
                let s2 = s * s;
                let s3 = s2 * s;
                let h00 = 1.0 - 3.0 * s2 + 2.0 * s3;
                let h10 = s - 2.0 * s2 + s3;
                let h01 = 3.0 * s2 - 2.0 * s3;
                let h11 = s3 - s2;
                let d00 = 6.0 * (s2 - s);
                let d10 = 1.0 - 4.0 * s + 3.0 * s2;
                let d11 = 3.0 * s2 - 2.0 * s;
                let h = self.h;
                let y = (0..y0.len())
                    .map(|i| h00 * y0[i] + h10 * h * f0[i] + h01 * y1[i] + h11 * h * f1[i])
                    .collect();
                let y_dot = (0..y0.len())
                    .map(|i| (d00 * y0[i] - d00 * y1[i]) / h + d10 * f0[i] + d11 * f1[i])
                    .collect();
                (y, y_dot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hermite_reproduces_cubic() {
        // y = t^3, y' = 3 t^2 on [1, 3]
        let mapper = EquationsMapper::new(1);
        let interp = StepInterpolator::hermite(mapper, 1.0, &[1.0], &[3.0], 3.0, &[27.0], &[27.0]);
        let mid = interp.interpolated_state(2.0);
        assert!((mid.primary()[0] - 8.0).abs() < 1e-12);
        assert!((mid.primary_derivative[0] - 12.0).abs() < 1e-12);
        assert!(interp.is_forward());
    }

    #[test]
    fn restriction_keeps_coefficients() {
        let mapper = EquationsMapper::new(1);
        let interp = StepInterpolator::hermite(mapper, 0.0, &[0.0], &[1.0], 2.0, &[2.0], &[1.0]);
        let head = interp.restrict_step(
            interp.previous_state().clone(),
            interp.interpolated_state(0.5),
        );
        assert_eq!(head.current_state().time(), 0.5);
        assert_eq!(head.global_current_time(), 2.0);
        assert!((head.interpolated_state(1.5).primary()[0] - 1.5).abs() < 1e-12);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn hermite_reproduces_any_cubic(
                c in proptest::array::uniform4(-10.0f64..10.0),
                t0 in -50.0f64..50.0,
                h in prop_oneof![-5.0f64..-0.1, 0.1f64..5.0],
                theta in 0.0f64..1.0,
            ) {
                let y = |t: f64| c[0] + t * (c[1] + t * (c[2] + t * c[3]));
                let y_dot = |t: f64| c[1] + t * (2.0 * c[2] + 3.0 * t * c[3]);
                let t1 = t0 + h;
                let interp = StepInterpolator::hermite(
                    EquationsMapper::new(1),
                    t0,
                    &[y(t0)],
                    &[y_dot(t0)],
                    t1,
                    &[y(t1)],
                    &[y_dot(t1)],
                );
                let t = t0 + theta * h;
                let s = interp.interpolated_state(t);
                let scale = 1.0 + y(t).abs().max(y(t0).abs()).max(y(t1).abs());
                prop_assert!((s.primary()[0] - y(t)).abs() <= 1e-9 * scale);
                let dscale =
                    1.0 + y_dot(t).abs().max(y_dot(t0).abs()).max(y_dot(t1).abs()) + scale / h.abs();
                prop_assert!((s.primary_derivative[0] - y_dot(t)).abs() <= 1e-9 * dscale);
                prop_assert_eq!(interp.is_forward(), h > 0.0);
            }
        }
    }
}

