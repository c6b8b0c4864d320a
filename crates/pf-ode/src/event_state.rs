//! Per-integration tracking of one registered event handler.

use crate::error::{OdeResult, borrow_handler};
use crate::events::{Action, EventHandlerConfiguration};
use crate::interpolator::StepInterpolator;
use crate::state::{OdeState, OdeStateAndDerivative};

pub(crate) struct EventState {
    config: EventHandlerConfiguration,
    /// Time of the last point where `g` was checked and accepted.
    t0: f64,
    g0: f64,
    g0_positive: bool,
    pending: Option<PendingEvent>,
}

#[derive(Clone, Copy, Debug)]
struct PendingEvent {
    time: f64,
    increasing: bool,
}

impl EventState {
    pub(crate) fn new(config: EventHandlerConfiguration) -> Self {
        Self {
            config,
            t0: f64::NAN,
            g0: f64::NAN,
            g0_positive: true,
            pending: None,
        }
    }

    pub(crate) fn init(&mut self, initial: &OdeStateAndDerivative, final_time: f64) -> OdeResult<()> {
        self.pending = None;
        borrow_handler(self.config.handler(), "event handler")?.init(initial, final_time)
    }

    fn g(&self, state: &OdeStateAndDerivative) -> OdeResult<f64> {
        borrow_handler(self.config.handler(), "event handler")?.g(state)
    }

    /// Set the reference sign at the start of the step held by `interpolator`.
    pub(crate) fn reinitialize_begin(&mut self, interpolator: &StepInterpolator) -> OdeResult<()> {
        let start = interpolator.previous_state();
        self.t0 = start.time();
        self.g0 = self.g(start)?;
        if self.g0 == 0.0 {
            // starting exactly on a root: take the sign just after it
            let direction = if interpolator.is_forward() { 1.0 } else { -1.0 };
            let nudge = 0.5 * self.config.settings().convergence * direction;
            self.t0 += nudge;
            self.g0 = self.g(&interpolator.interpolated_state(self.t0))?;
        }
        self.g0_positive = self.g0 >= 0.0;
        self.pending = None;
        Ok(())
    }

    /// Look for the first sign change between `t0` and the end of the step.
    pub(crate) fn evaluate_step(&mut self, interpolator: &StepInterpolator) -> OdeResult<bool> {
        self.pending = None;
        let settings = *self.config.settings();
        let t1 = interpolator.current_state().time();
        let dt = t1 - self.t0;
        if dt.abs() < settings.convergence {
            return Ok(false);
        }

        let n = ((dt.abs() / settings.max_check_interval).ceil() as usize).max(1);
        let h = dt / n as f64;
        let mut ta = self.t0;
        let mut ga = self.g0;
        for i in 0..n {
            let tb = if i + 1 == n { t1 } else { self.t0 + (i + 1) as f64 * h };
            let gb = self.g(&interpolator.interpolated_state(tb))?;
            if (gb >= 0.0) != self.g0_positive {
                let root = settings.solver.solve(
                    |t| self.g(&interpolator.interpolated_state(t)),
                    ta,
                    ga,
                    tb,
                    gb,
                    settings.convergence,
                    settings.max_iteration_count,
                )?;
                self.pending = Some(PendingEvent {
                    time: root.after,
                    increasing: !self.g0_positive,
                });
                return Ok(true);
            }
            ta = tb;
            ga = gb;
        }
        Ok(false)
    }

    pub(crate) fn pending_time(&self) -> Option<f64> {
        self.pending.map(|p| p.time)
    }

    /// Accept the step up to `state`; fires the pending event if it sits there.
    pub(crate) fn step_accepted(&mut self, state: &OdeStateAndDerivative) -> OdeResult<Option<Action>> {
        self.t0 = state.time();
        self.g0 = self.g(state)?;
        match self.pending.take() {
            Some(event) if event.time == state.time() => {
                self.g0_positive = event.increasing;
                tracing::debug!(t = event.time, increasing = event.increasing, "event occurred");
                let action = borrow_handler(self.config.handler(), "event handler")?
                    .event_occurred(state, event.increasing)?;
                Ok(Some(action))
            }
            _ => {
                self.g0_positive = self.g0 >= 0.0;
                Ok(None)
            }
        }
    }

    pub(crate) fn reset_state(&self, state: &OdeStateAndDerivative) -> OdeResult<OdeState> {
        borrow_handler(self.config.handler(), "event handler")?.reset_state(state)
    }
}
