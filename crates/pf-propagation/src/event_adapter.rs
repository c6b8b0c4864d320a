//! Event detectors on spacecraft states and their integrator adapter.

use std::cell::RefCell;
use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{Action, EventHandler, EventSettings, OdeResult, OdeState, OdeStateAndDerivative};

use crate::context::ConversionContext;
use crate::error::{PropagationError, PropagationResult, borrow_shared};
use crate::hooks::SharedHooks;
use crate::state::SpacecraftState;

/// Switching function on spacecraft states with its detection settings.
pub trait EventDetector {
    /// Largest time span sampled without evaluating `g` (seconds).
    fn max_check_interval(&self) -> f64 {
        600.0
    }

    /// Time accuracy of the located event (seconds).
    fn threshold(&self) -> f64 {
        1e-6
    }

    fn max_iteration_count(&self) -> usize {
        100
    }

    fn init(&mut self, _initial: &SpacecraftState, _target: AbsoluteDate) -> PropagationResult<()> {
        Ok(())
    }

    fn g(&mut self, state: &SpacecraftState) -> PropagationResult<f64>;

    fn event_occurred(&mut self, state: &SpacecraftState, increasing: bool) -> PropagationResult<Action>;

    /// State to restart from after [`Action::ResetState`].
    fn reset_state(&mut self, state: &SpacecraftState) -> PropagationResult<SpacecraftState> {
        Ok(state.clone())
    }

    /// Called with the final state of a successful propagation.
    fn finish(&mut self, _final_state: &SpacecraftState) -> PropagationResult<()> {
        Ok(())
    }
}

pub type SharedDetector = Rc<RefCell<dyn EventDetector>>;

/// Integrator-side view of one detector for one propagation leg.
///
/// Caches the last `g` value keyed on the whole integrator state, so repeated
/// evaluations at the same point skip the state rebuild. A reset at an event time
/// brings a different state at the same time and misses the cache.
pub(crate) struct AdaptedEventDetector {
    detector: SharedDetector,
    context: Rc<ConversionContext>,
    hooks: SharedHooks,
    use_cache: bool,
    last: Option<(OdeState, f64)>,
}

impl AdaptedEventDetector {
    pub(crate) fn new(
        detector: SharedDetector,
        context: Rc<ConversionContext>,
        hooks: SharedHooks,
        use_cache: bool,
    ) -> Self {
        Self {
            detector,
            context,
            hooks,
            use_cache,
            last: None,
        }
    }

    pub(crate) fn settings(&self) -> PropagationResult<EventSettings> {
        let detector = self
            .detector
            .try_borrow()
            .map_err(|_| PropagationError::HandlerBusy {
                what: "event detector",
            })?;
        Ok(EventSettings {
            max_check_interval: detector.max_check_interval(),
            convergence: detector.threshold(),
            max_iteration_count: detector.max_iteration_count(),
            ..EventSettings::default()
        })
    }
}

impl EventHandler for AdaptedEventDetector {
    fn init(&mut self, initial: &OdeStateAndDerivative, final_time: f64) -> OdeResult<()> {
        let state = self.context.ode_to_state(initial)?;
        borrow_shared(&self.detector, "event detector")?
            .init(&state, self.context.date(final_time))?;
        self.last = None;
        Ok(())
    }

    fn g(&mut self, s: &OdeStateAndDerivative) -> OdeResult<f64> {
        if self.use_cache
            && let Some((cached, g)) = &self.last
            && *cached == s.state
        {
            return Ok(*g);
        }
        let state = self.context.ode_to_state(s)?;
        let g = borrow_shared(&self.detector, "event detector")?.g(&state)?;
        if self.use_cache {
            self.last = Some((s.state.clone(), g));
        }
        Ok(g)
    }

    fn event_occurred(&mut self, s: &OdeStateAndDerivative, increasing: bool) -> OdeResult<Action> {
        let state = self.context.ode_to_state(s)?;
        let action = borrow_shared(&self.detector, "event detector")?.event_occurred(&state, increasing)?;
        tracing::debug!(date = %state.date(), increasing, ?action, "event occurred");
        Ok(action)
    }

    fn reset_state(&mut self, s: &OdeStateAndDerivative) -> OdeResult<OdeState> {
        let state = self.context.ode_to_state(s)?;
        let new_state = borrow_shared(&self.detector, "event detector")?.reset_state(&state)?;
        borrow_shared(&self.hooks, "propagation hooks")?.state_changed(&new_state)?;
        let mut reset = self.context.to_ode_state(&new_state)?;
        if new_state.date() == state.date() {
            reset.time = s.time();
        }
        Ok(reset)
    }
}
