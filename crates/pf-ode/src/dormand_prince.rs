//! Adaptive Dormand–Prince 5(4) integrator with native dense output.
//!
//! Reference: Hairer, Nørsett & Wanner, *Solving Ordinary Differential
//! Equations I*, section II.5 and the `DOPRI5` continuous extension.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::equations::ExpandableOde;
use crate::error::{OdeError, OdeResult};
use crate::integrator::{
    HandlerRegistry, IntegrationSession, OdeIntegrator, check_finite, sanity_checks,
};
use crate::interpolator::StepInterpolator;
use crate::state::{OdeState, OdeStateAndDerivative};

const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

const A: [&[f64]; 6] = [
    &[1.0 / 5.0],
    &[3.0 / 40.0, 9.0 / 40.0],
    &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
    &[
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
    ],
    &[
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
    ],
    // fifth order weights; stage 7 is evaluated at the step end (FSAL)
    &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// Difference between the fifth and fourth order weights.
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

/// Weights of the fourth degree term of the continuous extension.
const D: [f64; 7] = [
    -12715105075.0 / 11282082432.0,
    0.0,
    87487479700.0 / 32700410799.0,
    -10690763975.0 / 1880347072.0,
    701980252875.0 / 199316789632.0,
    -1453857185.0 / 822651844.0,
    69997945.0 / 29380423.0,
];

const ORDER: f64 = 5.0;

/// Step size control settings.
///
/// Tolerances apply to the primary block only; secondary blocks follow the
/// step sizes chosen for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DormandPrinceConfig {
    pub min_step: f64,
    pub max_step: f64,
    pub absolute_tolerance: f64,
    pub relative_tolerance: f64,
    /// First trial step; estimated from the initial derivatives when absent.
    pub initial_step: Option<f64>,
    pub safety: f64,
    pub min_reduction: f64,
    pub max_growth: f64,
    pub max_steps: usize,
}

impl Default for DormandPrinceConfig {
    fn default() -> Self {
        Self {
            min_step: 1e-6,
            max_step: 86_400.0,
            absolute_tolerance: 1e-6,
            relative_tolerance: 1e-10,
            initial_step: None,
            safety: 0.9,
            min_reduction: 0.2,
            max_growth: 10.0,
            max_steps: 1_000_000,
        }
    }
}

impl DormandPrinceConfig {
    pub fn validate(&self) -> OdeResult<()> {
        let invalid = |what: &str| {
            Err(OdeError::InvalidArg {
                what: what.to_string(),
            })
        };
        if !(self.min_step > 0.0) || !(self.max_step >= self.min_step) {
            return invalid("step bounds must satisfy 0 < min_step <= max_step");
        }
        if !(self.absolute_tolerance >= 0.0 && self.relative_tolerance >= 0.0)
            || self.absolute_tolerance + self.relative_tolerance == 0.0
        {
            return invalid("tolerances must be non-negative and not both zero");
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return invalid("safety factor must be in (0, 1]");
        }
        if !(self.min_reduction > 0.0 && self.min_reduction < 1.0 && self.max_growth > 1.0) {
            return invalid("step factors must satisfy 0 < min_reduction < 1 < max_growth");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be positive");
        }
        Ok(())
    }

    fn scale(&self, a: f64, b: f64) -> f64 {
        self.absolute_tolerance + self.relative_tolerance * a.abs().max(b.abs())
    }
}

/// Embedded Runge–Kutta 5(4) pair with automatic step size control.
#[derive(Debug, Default)]
pub struct DormandPrinceIntegrator {
    config: DormandPrinceConfig,
    handlers: HandlerRegistry,
    evaluations: usize,
}

impl DormandPrinceIntegrator {
    pub fn new(config: DormandPrinceConfig) -> OdeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handlers: HandlerRegistry::default(),
            evaluations: 0,
        })
    }

    pub fn config(&self) -> &DormandPrinceConfig {
        &self.config
    }

    fn derivatives(&mut self, ode: &mut ExpandableOde<'_>, t: f64, y: &[f64]) -> OdeResult<Vec<f64>> {
        self.evaluations += 1;
        ode.compute_derivatives(t, y)
    }

    /// First step size, from the initial derivatives when not configured.
    fn initial_step(
        &mut self,
        ode: &mut ExpandableOde<'_>,
        forward: bool,
        t0: f64,
        y0: &[f64],
        f0: &[f64],
        main: usize,
    ) -> OdeResult<f64> {
        let cfg = self.config.clone();
        if let Some(h) = cfg.initial_step {
            return Ok(h.abs().clamp(cfg.min_step, cfg.max_step));
        }

        let mut y_on_scale2 = 0.0;
        let mut y_dot_on_scale2 = 0.0;
        for i in 0..main {
            let sc = cfg.scale(y0[i], y0[i]);
            y_on_scale2 += (y0[i] / sc).powi(2);
            y_dot_on_scale2 += (f0[i] / sc).powi(2);
        }
        let mut h = if y_on_scale2 < 1e-10 || y_dot_on_scale2 < 1e-10 {
            1e-6
        } else {
            0.01 * (y_on_scale2 / y_dot_on_scale2).sqrt()
        };
        if !forward {
            h = -h;
        }

        // one Euler step to estimate the second derivative
        let y1: Vec<f64> = y0.iter().zip(f0).map(|(y, f)| y + h * f).collect();
        let f1 = self.derivatives(ode, t0 + h, &y1)?;
        let mut y_ddot_on_scale = 0.0;
        for i in 0..main {
            let sc = cfg.scale(y0[i], y0[i]);
            y_ddot_on_scale += ((f1[i] - f0[i]) / sc).powi(2);
        }
        let y_ddot_on_scale = y_ddot_on_scale.sqrt() / h.abs();

        let max_inv2 = y_dot_on_scale2.sqrt().max(y_ddot_on_scale);
        let h1 = if max_inv2 < 1e-15 {
            (0.001 * h.abs()).max(1e-6)
        } else {
            (0.01 / max_inv2).powf(1.0 / ORDER)
        };
        let h = (100.0 * h.abs()).min(h1).max(1e-12 * t0.abs());
        Ok(h.clamp(cfg.min_step, cfg.max_step))
    }

    /// Seven stage derivatives and the fifth order solution for one trial step.
    fn attempt(
        &mut self,
        ode: &mut ExpandableOde<'_>,
        t: f64,
        y: &[f64],
        f0: &[f64],
        h: f64,
    ) -> OdeResult<([Vec<f64>; 7], Vec<f64>)> {
        let mut k: [Vec<f64>; 7] = Default::default();
        k[0] = f0.to_vec();
        let mut y_stage = vec![0.0; y.len()];
        for (s, row) in A.iter().enumerate() {
            for i in 0..y.len() {
                let sum: f64 = row.iter().enumerate().map(|(j, a)| a * k[j][i]).sum();
                y_stage[i] = y[i] + h * sum;
            }
            k[s + 1] = self.derivatives(ode, t + C[s] * h, &y_stage)?;
        }
        // the last stage was evaluated on the fifth order solution
        Ok((k, y_stage))
    }

    /// RMS of the scaled error estimate over the primary block.
    fn error_norm(&self, y0: &[f64], y1: &[f64], k: &[Vec<f64>; 7], h: f64, main: usize) -> f64 {
        let mut sum = 0.0;
        for i in 0..main {
            let err: f64 = h * E.iter().zip(k).map(|(e, ks)| e * ks[i]).sum::<f64>();
            let sc = self.config.scale(y0[i], y1[i]);
            sum += (err / sc).powi(2);
        }
        (sum / main.max(1) as f64).sqrt()
    }

    fn step_factor(&self, error: f64) -> f64 {
        let factor = self.config.safety * error.powf(-1.0 / ORDER);
        factor.clamp(self.config.min_reduction, self.config.max_growth)
    }
}

impl OdeIntegrator for DormandPrinceIntegrator {
    fn name(&self) -> &str {
        "Dormand-Prince 5(4)"
    }

    fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    fn handlers_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.handlers
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }

    fn integrate(
        &mut self,
        ode: &mut ExpandableOde<'_>,
        initial: &OdeState,
        final_time: f64,
    ) -> OdeResult<OdeStateAndDerivative> {
        let mut y = sanity_checks(ode, initial, final_time)?;
        self.evaluations = 0;
        ode.init(initial, final_time)?;

        let mapper = ode.mapper().clone();
        let main = mapper.block_dimension(0);
        let forward = final_time > initial.time;
        let mut t = initial.time;
        let mut f0 = self.derivatives(ode, t, &y)?;
        let mut current = mapper.map_state_and_derivative(t, &y, &f0);

        let mut session = IntegrationSession::new(&self.handlers);
        session.init(&current, final_time)?;
        debug!(
            integrator = self.name(),
            t0 = t,
            t = final_time,
            dimension = mapper.total_dimension(),
            "integration started"
        );

        let mut h_abs = self.initial_step(ode, forward, t, &y, &f0, main)?;
        let mut steps = 0usize;
        loop {
            let (stages, y_new, h, error, last) = loop {
                let mut h = if forward { h_abs } else { -h_abs };
                let last = if forward { t + h >= final_time } else { t + h <= final_time };
                if last {
                    h = final_time - t;
                }

                let (stages, y_new) = self.attempt(ode, t, &y, &f0, h)?;
                check_finite(t + h, &y_new, "trial state")?;
                let error = self.error_norm(&y, &y_new, &stages, h, main);
                if error <= 1.0 {
                    break (stages, y_new, h, error, last);
                }

                let shrunk = h.abs() * self.step_factor(error);
                trace!(t, h, error, "step rejected");
                if shrunk < self.config.min_step {
                    return Err(OdeError::StepSizeUnderflow {
                        t,
                        step: shrunk,
                        min_step: self.config.min_step,
                    });
                }
                h_abs = shrunk;
            };

            steps += 1;
            if steps > self.config.max_steps {
                return Err(OdeError::MaxStepsExceeded {
                    max_steps: self.config.max_steps,
                    t,
                });
            }

            let t_new = if last { final_time } else { t + h };
            let interpolator =
                StepInterpolator::dormand_prince(mapper.clone(), t, &y, t_new, &y_new, &stages, h, &D);
            let outcome = session.accept_step(ode, interpolator, &mut self.evaluations)?;
            current = outcome.state;

            if outcome.stop || current.time() == final_time {
                break;
            }

            t = current.time();
            if outcome.reset {
                y = mapper.map_state(&current.state)?;
                f0 = mapper.map_derivative(&current)?;
                h_abs = self.initial_step(ode, forward, t, &y, &f0, main)?;
            } else {
                y = y_new;
                let [_, _, _, _, _, _, last_stage] = stages;
                f0 = last_stage;
                h_abs = (h.abs() * self.step_factor(error))
                    .clamp(self.config.min_step, self.config.max_step);
            }
        }

        session.finish(&current)?;
        debug!(
            t = current.time(),
            steps,
            evaluations = self.evaluations,
            "integration finished"
        );
        Ok(current)
    }
}
