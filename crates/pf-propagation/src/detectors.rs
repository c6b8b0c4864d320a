//! Stock event detectors.

use pf_core::AbsoluteDate;
use pf_ode::Action;

use crate::error::PropagationResult;
use crate::event_adapter::EventDetector;
use crate::state::SpacecraftState;

/// Triggers when the propagation reaches a given date.
#[derive(Clone, Debug)]
pub struct DateDetector {
    date: AbsoluteDate,
    action: Action,
    triggered: Option<AbsoluteDate>,
}

impl DateDetector {
    /// Stops the propagation at `date`.
    pub fn new(date: AbsoluteDate) -> Self {
        Self {
            date,
            action: Action::Stop,
            triggered: None,
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn date(&self) -> AbsoluteDate {
        self.date
    }

    /// Date at which the event was located, if it was.
    pub fn triggered(&self) -> Option<AbsoluteDate> {
        self.triggered
    }
}

impl EventDetector for DateDetector {
    fn g(&mut self, state: &SpacecraftState) -> PropagationResult<f64> {
        Ok(state.date().duration_from(&self.date))
    }

    fn event_occurred(&mut self, state: &SpacecraftState, _increasing: bool) -> PropagationResult<Action> {
        self.triggered = Some(state.date());
        Ok(self.action)
    }
}

/// One located event.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedEvent {
    pub date: AbsoluteDate,
    pub increasing: bool,
    pub g: f64,
}

/// Detector built from a closure, recording every event it sees.
pub struct FunctionalDetector<G> {
    g: G,
    action: Action,
    max_check_interval: f64,
    threshold: f64,
    events: Vec<RecordedEvent>,
}

impl<G> FunctionalDetector<G>
where
    G: FnMut(&SpacecraftState) -> f64,
{
    /// Continues through every event unless told otherwise.
    pub fn new(g: G) -> Self {
        Self {
            g,
            action: Action::Continue,
            max_check_interval: 600.0,
            threshold: 1e-6,
            events: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn with_max_check_interval(mut self, max_check_interval: f64) -> Self {
        self.max_check_interval = max_check_interval;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }
}

impl<G> EventDetector for FunctionalDetector<G>
where
    G: FnMut(&SpacecraftState) -> f64,
{
    fn max_check_interval(&self) -> f64 {
        self.max_check_interval
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn init(&mut self, _initial: &SpacecraftState, _target: AbsoluteDate) -> PropagationResult<()> {
        self.events.clear();
        Ok(())
    }

    fn g(&mut self, state: &SpacecraftState) -> PropagationResult<f64> {
        Ok((self.g)(state))
    }

    fn event_occurred(&mut self, state: &SpacecraftState, increasing: bool) -> PropagationResult<Action> {
        let g = (self.g)(state);
        self.events.push(RecordedEvent {
            date: state.date(),
            increasing,
            g,
        });
        Ok(self.action)
    }
}
