//! Step handlers on spacecraft states.

use std::cell::RefCell;
use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{OdeResult, OdeStateAndDerivative, StepHandler, StepInterpolator};

use crate::context::ConversionContext;
use crate::error::{PropagationResult, borrow_shared};
use crate::state::SpacecraftState;

pub trait OrbitStepHandler {
    fn init(&mut self, _initial: &SpacecraftState, _target: AbsoluteDate) -> PropagationResult<()> {
        Ok(())
    }

    fn handle_step(&mut self, interpolator: &OrbitStepInterpolator) -> PropagationResult<()>;

    fn finish(&mut self, _final_state: &SpacecraftState) -> PropagationResult<()> {
        Ok(())
    }
}

pub type SharedOrbitStepHandler = Rc<RefCell<dyn OrbitStepHandler>>;

/// One integrator step seen as spacecraft states.
pub struct OrbitStepInterpolator {
    inner: StepInterpolator,
    context: Rc<ConversionContext>,
    previous: SpacecraftState,
    current: SpacecraftState,
}

impl OrbitStepInterpolator {
    pub(crate) fn new(inner: StepInterpolator, context: Rc<ConversionContext>) -> PropagationResult<Self> {
        let previous = context.ode_to_state(inner.previous_state())?;
        let current = context.ode_to_state(inner.current_state())?;
        Ok(Self {
            inner,
            context,
            previous,
            current,
        })
    }

    pub fn previous_state(&self) -> &SpacecraftState {
        &self.previous
    }

    pub fn current_state(&self) -> &SpacecraftState {
        &self.current
    }

    pub fn is_forward(&self) -> bool {
        self.inner.is_forward()
    }

    /// State at `date`, which should lie within the step.
    pub fn interpolated_state(&self, date: AbsoluteDate) -> PropagationResult<SpacecraftState> {
        let ode = self.interpolated_ode(date);
        self.context.ode_to_state_at(&ode, date)
    }

    /// Same step narrowed to `[previous, current]`.
    pub fn restrict_step(
        &self,
        previous: SpacecraftState,
        current: SpacecraftState,
    ) -> Self {
        let inner = self.inner.restrict_step(
            self.interpolated_ode(previous.date()),
            self.interpolated_ode(current.date()),
        );
        Self {
            inner,
            context: Rc::clone(&self.context),
            previous,
            current,
        }
    }

    fn interpolated_ode(&self, date: AbsoluteDate) -> OdeStateAndDerivative {
        self.inner
            .interpolated_state(self.context.mapper().map_date_to_double(date))
    }
}

/// Integrator-side view of an [`OrbitStepHandler`] for one propagation leg.
pub(crate) struct AdaptedStepHandler {
    handler: SharedOrbitStepHandler,
    context: Rc<ConversionContext>,
}

impl AdaptedStepHandler {
    pub(crate) fn new(handler: SharedOrbitStepHandler, context: Rc<ConversionContext>) -> Self {
        Self { handler, context }
    }
}

impl StepHandler for AdaptedStepHandler {
    fn init(&mut self, initial: &OdeStateAndDerivative, final_time: f64) -> OdeResult<()> {
        let state = self.context.ode_to_state(initial)?;
        borrow_shared(&self.handler, "step handler")?.init(&state, self.context.date(final_time))?;
        Ok(())
    }

    fn handle_step(&mut self, interpolator: &StepInterpolator) -> OdeResult<()> {
        let orbit_interpolator =
            OrbitStepInterpolator::new(interpolator.clone(), Rc::clone(&self.context))?;
        borrow_shared(&self.handler, "step handler")?.handle_step(&orbit_interpolator)?;
        Ok(())
    }

    fn finish(&mut self, final_state: &OdeStateAndDerivative) -> OdeResult<()> {
        let state = self.context.ode_to_state(final_state)?;
        borrow_shared(&self.handler, "step handler")?.finish(&state)?;
        Ok(())
    }
}
