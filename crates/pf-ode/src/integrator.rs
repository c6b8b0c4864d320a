//! Integrator trait and the step acceptance logic shared by all integrators.

use crate::equations::ExpandableOde;
use crate::error::{OdeError, OdeResult, borrow_handler};
use crate::event_state::EventState;
use crate::events::{Action, EventHandlerConfiguration, EventSettings, SharedEventHandler};
use crate::handlers::SharedStepHandler;
use crate::interpolator::StepInterpolator;
use crate::state::{OdeState, OdeStateAndDerivative};

/// Event handler configurations and step handlers attached to an integrator.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    events: Vec<EventHandlerConfiguration>,
    steps: Vec<SharedStepHandler>,
}

impl HandlerRegistry {
    pub fn event_handlers(&self) -> &[EventHandlerConfiguration] {
        &self.events
    }

    pub fn step_handlers(&self) -> &[SharedStepHandler] {
        &self.steps
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("events", &self.events)
            .field("steps", &self.steps.len())
            .finish()
    }
}

/// Common interface of the ODE integrators.
///
/// Handler registrations persist across [`integrate`](Self::integrate) calls
/// until cleared.
pub trait OdeIntegrator {
    fn name(&self) -> &str;

    fn handlers(&self) -> &HandlerRegistry;

    fn handlers_mut(&mut self) -> &mut HandlerRegistry;

    /// Number of derivative evaluations performed by the last integration.
    fn evaluations(&self) -> usize;

    /// Integrate `ode` from `initial` up to `final_time`, or to the first
    /// event requesting a stop.
    fn integrate(
        &mut self,
        ode: &mut ExpandableOde<'_>,
        initial: &OdeState,
        final_time: f64,
    ) -> OdeResult<OdeStateAndDerivative>;

    fn add_event_handler(&mut self, handler: SharedEventHandler, settings: EventSettings) {
        self.add_event_configuration(EventHandlerConfiguration::new(handler, settings));
    }

    fn add_event_configuration(&mut self, configuration: EventHandlerConfiguration) {
        self.handlers_mut().events.push(configuration);
    }

    fn event_handler_configurations(&self) -> Vec<EventHandlerConfiguration> {
        self.handlers().events.clone()
    }

    fn clear_event_handlers(&mut self) {
        self.handlers_mut().events.clear();
    }

    fn add_step_handler(&mut self, handler: SharedStepHandler) {
        self.handlers_mut().steps.push(handler);
    }

    fn step_handlers(&self) -> Vec<SharedStepHandler> {
        self.handlers().steps.clone()
    }

    fn clear_step_handlers(&mut self) {
        self.handlers_mut().steps.clear();
    }
}

/// Result of handing one step to the session.
pub(crate) struct StepOutcome {
    /// State the integration continues from.
    pub state: OdeStateAndDerivative,
    /// An event asked to stop.
    pub stop: bool,
    /// The state or its derivatives were reset; the next step restarts from scratch.
    pub reset: bool,
}

/// Per-call event tracking and step handler dispatch.
pub(crate) struct IntegrationSession {
    events: Vec<EventState>,
    steps: Vec<SharedStepHandler>,
    events_initialized: bool,
}

impl IntegrationSession {
    pub(crate) fn new(handlers: &HandlerRegistry) -> Self {
        Self {
            events: handlers
                .events
                .iter()
                .cloned()
                .map(EventState::new)
                .collect(),
            steps: handlers.steps.clone(),
            events_initialized: false,
        }
    }

    pub(crate) fn init(&mut self, initial: &OdeStateAndDerivative, final_time: f64) -> OdeResult<()> {
        for event in &mut self.events {
            event.init(initial, final_time)?;
        }
        for handler in &self.steps {
            borrow_handler(handler, "step handler")?.init(initial, final_time)?;
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self, final_state: &OdeStateAndDerivative) -> OdeResult<()> {
        for handler in &self.steps {
            borrow_handler(handler, "step handler")?.finish(final_state)?;
        }
        Ok(())
    }

    fn handle_step(&self, interpolator: &StepInterpolator) -> OdeResult<()> {
        for handler in &self.steps {
            borrow_handler(handler, "step handler")?.handle_step(interpolator)?;
        }
        Ok(())
    }

    /// Process events inside an accepted step, then pass the step to the handlers.
    ///
    /// Events are handled in chronological order. A step truncated by an
    /// event is handed over as a restricted interpolator ending at the event.
    pub(crate) fn accept_step(
        &mut self,
        ode: &mut ExpandableOde<'_>,
        interpolator: StepInterpolator,
        evaluations: &mut usize,
    ) -> OdeResult<StepOutcome> {
        if !self.events_initialized {
            for event in &mut self.events {
                event.reinitialize_begin(&interpolator)?;
            }
            self.events_initialized = true;
        }

        let forward = interpolator.is_forward();
        let step_end = interpolator.current_state().clone();
        let mut remaining = interpolator;

        loop {
            let mut earliest: Option<f64> = None;
            for event in &mut self.events {
                if event.evaluate_step(&remaining)? {
                    if let Some(t) = event.pending_time() {
                        let sooner = match earliest {
                            None => true,
                            Some(best) => {
                                if forward { t < best } else { t > best }
                            }
                        };
                        if sooner {
                            earliest = Some(t);
                        }
                    }
                }
            }
            let Some(event_time) = earliest else {
                break;
            };

            let event_state = remaining.interpolated_state(event_time);
            let head = remaining.restrict_step(remaining.previous_state().clone(), event_state.clone());
            self.handle_step(&head)?;

            let mut stop = false;
            let mut resetter: Option<usize> = None;
            let mut reset_derivatives = false;
            for (index, event) in self.events.iter_mut().enumerate() {
                match event.step_accepted(&event_state)? {
                    Some(Action::Stop) => stop = true,
                    Some(Action::ResetState) => {
                        resetter.get_or_insert(index);
                    }
                    Some(Action::ResetDerivatives) => reset_derivatives = true,
                    Some(Action::Continue) | None => {}
                }
            }

            if stop {
                return Ok(StepOutcome {
                    state: event_state,
                    stop: true,
                    reset: false,
                });
            }

            if resetter.is_some() || reset_derivatives {
                let new_state = match resetter {
                    Some(index) => self.events[index].reset_state(&event_state)?,
                    None => event_state.state.clone(),
                };
                let complete = ode.mapper().map_state(&new_state)?;
                let y_dot = ode.compute_derivatives(new_state.time, &complete)?;
                *evaluations += 1;
                let restarted = ode
                    .mapper()
                    .map_state_and_derivative(new_state.time, &complete, &y_dot);
                tracing::debug!(t = restarted.time(), "integration restarted after event reset");
                self.events_initialized = false;
                return Ok(StepOutcome {
                    state: restarted,
                    stop: false,
                    reset: true,
                });
            }

            remaining = remaining.restrict_step(event_state, step_end.clone());
        }

        for event in &mut self.events {
            event.step_accepted(&step_end)?;
        }
        // an event sitting exactly on the step end leaves an empty tail
        if remaining.previous_state().time() != step_end.time() {
            self.handle_step(&remaining)?;
        }
        Ok(StepOutcome {
            state: step_end,
            stop: false,
            reset: false,
        })
    }
}

/// Reject a NaN or infinite component in the complete state.
pub(crate) fn check_finite(t: f64, y: &[f64], what: &'static str) -> OdeResult<()> {
    if y.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(OdeError::NonFiniteState { what, t })
    }
}

/// Shared argument checks at the start of `integrate`.
pub(crate) fn sanity_checks(
    ode: &ExpandableOde<'_>,
    initial: &OdeState,
    final_time: f64,
) -> OdeResult<Vec<f64>> {
    if !initial.time.is_finite() || !final_time.is_finite() {
        return Err(OdeError::InvalidArg {
            what: format!(
                "integration bounds must be finite (t0 = {}, t = {final_time})",
                initial.time
            ),
        });
    }
    let span = (final_time - initial.time).abs();
    if span <= 1e-12 * initial.time.abs().max(final_time.abs()) || span == 0.0 {
        return Err(OdeError::InvalidArg {
            what: format!(
                "integration interval too small: [{}, {final_time}]",
                initial.time
            ),
        });
    }
    let y0 = ode.mapper().map_state(initial)?;
    check_finite(initial.time, &y0, "initial state")?;
    Ok(y0)
}
