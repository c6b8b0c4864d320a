//! Scoped restoration of an integrator's handler lists.

use std::ops::{Deref, DerefMut};

use pf_ode::{EventHandlerConfiguration, OdeIntegrator, SharedStepHandler};

/// Snapshots the event and step handlers of an integrator and puts them
/// back when dropped, whatever happened in between.
///
/// Handlers added through the guard only live for its scope.
pub struct IntegratorResetter<'a, I: OdeIntegrator + ?Sized> {
    integrator: &'a mut I,
    events: Vec<EventHandlerConfiguration>,
    steps: Vec<SharedStepHandler>,
}

impl<'a, I: OdeIntegrator + ?Sized> IntegratorResetter<'a, I> {
    pub fn new(integrator: &'a mut I) -> Self {
        let events = integrator.event_handler_configurations();
        let steps = integrator.step_handlers();
        Self {
            integrator,
            events,
            steps,
        }
    }
}

impl<I: OdeIntegrator + ?Sized> Deref for IntegratorResetter<'_, I> {
    type Target = I;

    fn deref(&self) -> &I {
        self.integrator
    }
}

impl<I: OdeIntegrator + ?Sized> DerefMut for IntegratorResetter<'_, I> {
    fn deref_mut(&mut self) -> &mut I {
        self.integrator
    }
}

impl<I: OdeIntegrator + ?Sized> Drop for IntegratorResetter<'_, I> {
    fn drop(&mut self) {
        self.integrator.clear_event_handlers();
        self.integrator.clear_step_handlers();
        for configuration in self.events.drain(..) {
            self.integrator.add_event_configuration(configuration);
        }
        for handler in self.steps.drain(..) {
            self.integrator.add_step_handler(handler);
        }
    }
}
