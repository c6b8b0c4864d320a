//! Main state equations and the adapters exposing them to the integrator.

use std::cell::Cell;
use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{OdeResult, OrdinaryDifferentialEquation, SecondaryOde};

use crate::context::ConversionContext;
use crate::error::{PropagationError, PropagationResult, borrow_shared};
use crate::generators::SharedGenerator;
use crate::mapper::{BASIC_DIMENSION, StateMapper};
use crate::state::SpacecraftState;

/// Dynamics of the main state (orbit and mass).
pub trait MainStateEquations {
    fn init(&mut self, _initial: &SpacecraftState, _target: AbsoluteDate) -> PropagationResult<()> {
        Ok(())
    }

    /// Derivative of the primary block, laid out as `mapper` lays out the state.
    fn compute_derivatives(
        &mut self,
        state: &SpacecraftState,
        mapper: &StateMapper,
    ) -> PropagationResult<Vec<f64>>;
}

/// Primary block of the integrated ODE.
pub(crate) struct MainStateAdapter<'a> {
    equations: &'a mut dyn MainStateEquations,
    context: Rc<ConversionContext>,
    calls: Rc<Cell<usize>>,
}

impl<'a> MainStateAdapter<'a> {
    /// Building the adapter starts a new leg: the call counter is reset.
    pub(crate) fn new(
        equations: &'a mut dyn MainStateEquations,
        context: Rc<ConversionContext>,
        calls: Rc<Cell<usize>>,
    ) -> Self {
        calls.set(0);
        Self {
            equations,
            context,
            calls,
        }
    }
}

impl OrdinaryDifferentialEquation for MainStateAdapter<'_> {
    fn dimension(&self) -> usize {
        BASIC_DIMENSION
    }

    fn init(&mut self, t0: f64, y0: &[f64], final_time: f64) -> OdeResult<()> {
        let state = self.context.to_state(t0, y0, None)?;
        self.equations.init(&state, self.context.date(final_time))?;
        Ok(())
    }

    fn compute_derivatives(&mut self, t: f64, y: &[f64]) -> OdeResult<Vec<f64>> {
        self.calls.set(self.calls.get() + 1);
        let state = self.context.to_state(t, y, None)?;
        Ok(self
            .equations
            .compute_derivatives(&state, self.context.mapper())?)
    }
}

/// Secondary block owned by one generator.
pub(crate) struct SecondaryStateAdapter {
    name: String,
    generator: SharedGenerator,
    dimension: usize,
    context: Rc<ConversionContext>,
}

impl SecondaryStateAdapter {
    pub(crate) fn new(
        name: String,
        generator: SharedGenerator,
        dimension: usize,
        context: Rc<ConversionContext>,
    ) -> Self {
        Self {
            name,
            generator,
            dimension,
            context,
        }
    }

    fn state(
        &self,
        t: f64,
        primary: &[f64],
        primary_dot: Option<&[f64]>,
        secondary: &[f64],
    ) -> PropagationResult<SpacecraftState> {
        Ok(self
            .context
            .to_state(t, primary, primary_dot)?
            .with_additional_state(self.name.clone(), secondary.to_vec()))
    }
}

impl SecondaryOde for SecondaryStateAdapter {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn init(
        &mut self,
        t0: f64,
        primary0: &[f64],
        secondary0: &[f64],
        final_time: f64,
    ) -> OdeResult<()> {
        let state = self.state(t0, primary0, None, secondary0)?;
        borrow_shared(&self.generator, "generator")?.init(&state, self.context.date(final_time))?;
        Ok(())
    }

    fn compute_derivatives(
        &mut self,
        t: f64,
        primary: &[f64],
        primary_dot: &[f64],
        secondary: &[f64],
    ) -> OdeResult<Vec<f64>> {
        let state = self.state(t, primary, Some(primary_dot), secondary)?;
        let derivative = borrow_shared(&self.generator, "generator")?.compute_derivatives(&state)?;
        if derivative.len() != self.dimension {
            return Err(PropagationError::DimensionMismatch {
                what: "generator derivative",
                expected: self.dimension,
                actual: derivative.len(),
            }
            .into());
        }
        Ok(derivative)
    }
}
