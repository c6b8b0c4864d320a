//! Fixed-step classical Runge-Kutta integrator.

use tracing::debug;

use crate::equations::ExpandableOde;
use crate::error::{OdeError, OdeResult};
use crate::integrator::{
    HandlerRegistry, IntegrationSession, OdeIntegrator, check_finite, sanity_checks,
};
use crate::interpolator::StepInterpolator;
use crate::state::{OdeState, OdeStateAndDerivative};

/// Classical RK4 (Runge-Kutta 4th order) with a constant step.
///
/// The last step is shortened to land on the requested final time. Dense
/// output uses cubic Hermite interpolation on the step ends.
#[derive(Debug)]
pub struct ClassicalRungeKuttaIntegrator {
    step: f64,
    handlers: HandlerRegistry,
    evaluations: usize,
}

impl ClassicalRungeKuttaIntegrator {
    pub fn new(step: f64) -> OdeResult<Self> {
        if !(step.is_finite() && step > 0.0) {
            return Err(OdeError::InvalidArg {
                what: format!("step must be positive and finite, got {step}"),
            });
        }
        Ok(Self {
            step,
            handlers: HandlerRegistry::default(),
            evaluations: 0,
        })
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    fn derivatives(&mut self, ode: &mut ExpandableOde<'_>, t: f64, y: &[f64]) -> OdeResult<Vec<f64>> {
        self.evaluations += 1;
        ode.compute_derivatives(t, y)
    }

    /// Advance `y` by `dt` given its derivative `k1` at `t`.
    fn advance(
        &mut self,
        ode: &mut ExpandableOde<'_>,
        t: f64,
        y: &[f64],
        k1: &[f64],
        dt: f64,
    ) -> OdeResult<Vec<f64>> {
        let offset = |k: &[f64], scale: f64| -> Vec<f64> {
            y.iter().zip(k).map(|(y, k)| y + scale * k).collect()
        };

        let k2 = self.derivatives(ode, t + 0.5 * dt, &offset(k1, 0.5 * dt))?;
        let k3 = self.derivatives(ode, t + 0.5 * dt, &offset(&k2, 0.5 * dt))?;
        let k4 = self.derivatives(ode, t + dt, &offset(&k3, dt))?;

        // y_new = y + (dt/6) * (k1 + 2*k2 + 2*k3 + k4)
        Ok((0..y.len())
            .map(|i| y[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
            .collect())
    }
}

impl OdeIntegrator for ClassicalRungeKuttaIntegrator {
    fn name(&self) -> &str {
        "classical Runge-Kutta"
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
        let forward = final_time > initial.time;
        let mut t = initial.time;
        let mut f = self.derivatives(ode, t, &y)?;
        let mut current = mapper.map_state_and_derivative(t, &y, &f);

        let mut session = IntegrationSession::new(&self.handlers);
        session.init(&current, final_time)?;
        debug!(integrator = self.name(), t0 = t, t = final_time, "integration started");

        loop {
            let mut dt = if forward { self.step } else { -self.step };
            let last = if forward { t + dt >= final_time } else { t + dt <= final_time };
            if last {
                dt = final_time - t;
            }
            let t_new = if last { final_time } else { t + dt };

            let y_new = self.advance(ode, t, &y, &f, dt)?;
            check_finite(t_new, &y_new, "state")?;
            let f_new = self.derivatives(ode, t_new, &y_new)?;

            let interpolator = StepInterpolator::hermite(mapper.clone(), t, &y, &f, t_new, &y_new, &f_new);
            let outcome = session.accept_step(ode, interpolator, &mut self.evaluations)?;
            current = outcome.state;
            if outcome.stop || current.time() == final_time {
                break;
            }

            t = current.time();
            if outcome.reset {
                y = mapper.map_state(&current.state)?;
                f = mapper.map_derivative(&current)?;
            } else {
                y = y_new;
                f = f_new;
            }
        }

        session.finish(&current)?;
        debug!(t = current.time(), evaluations = self.evaluations, "integration finished");
        Ok(current)
    }
}
