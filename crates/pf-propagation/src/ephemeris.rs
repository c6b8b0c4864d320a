//! Ephemerides sealed from the dense output of one propagation.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{DenseOutputModel, OdeResult, OdeStateAndDerivative, StepHandler, StepInterpolator};
use thiserror::Error;

use crate::context::ConversionContext;
use crate::error::PropagationError;
use crate::state::SpacecraftState;

#[derive(Error, Debug)]
pub enum EphemerisError {
    #[error("Date {date} outside of ephemeris range [{min}, {max}]")]
    OutOfRange {
        date: AbsoluteDate,
        min: AbsoluteDate,
        max: AbsoluteDate,
    },

    #[error(transparent)]
    Conversion(#[from] PropagationError),
}

pub type EphemerisResult<T> = Result<T, EphemerisError>;

/// Propagator valid over a bounded date range.
pub trait BoundedPropagator {
    fn min_date(&self) -> AbsoluteDate;

    fn max_date(&self) -> AbsoluteDate;

    fn propagate(&self, date: AbsoluteDate) -> EphemerisResult<SpacecraftState>;
}

/// Read-only interpolating ephemeris over `[min_date, max_date]`.
pub struct IntegratedEphemeris {
    model: DenseOutputModel,
    context: Rc<ConversionContext>,
    start_date: AbsoluteDate,
    min_date: AbsoluteDate,
    max_date: AbsoluteDate,
}

impl IntegratedEphemeris {
    /// Date the underlying integration started from.
    pub fn start_date(&self) -> AbsoluteDate {
        self.start_date
    }

    pub fn number_of_steps(&self) -> usize {
        self.model.number_of_steps()
    }
}

impl BoundedPropagator for IntegratedEphemeris {
    fn min_date(&self) -> AbsoluteDate {
        self.min_date
    }

    fn max_date(&self) -> AbsoluteDate {
        self.max_date
    }

    fn propagate(&self, date: AbsoluteDate) -> EphemerisResult<SpacecraftState> {
        if date < self.min_date || date > self.max_date {
            return Err(EphemerisError::OutOfRange {
                date,
                min: self.min_date,
                max: self.max_date,
            });
        }
        let t = self.context.mapper().map_date_to_double(date);
        let ode = self
            .model
            .interpolated_state(t)
            .map_err(PropagationError::from)?;
        Ok(self.context.ode_to_state_at(&ode, date)?)
    }
}

impl fmt::Debug for IntegratedEphemeris {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegratedEphemeris")
            .field("min_date", &self.min_date)
            .field("max_date", &self.max_date)
            .field("steps", &self.model.number_of_steps())
            .finish()
    }
}

type EphemerisSlot = Rc<RefCell<Option<Rc<IntegratedEphemeris>>>>;

/// Handle returned by
/// [`IntegratedPropagator::ephemeris_generator`](crate::IntegratedPropagator::ephemeris_generator).
///
/// Receives the ephemeris of the next propagation call only.
#[derive(Clone, Debug, Default)]
pub struct EphemerisGenerator {
    slot: EphemerisSlot,
}

impl EphemerisGenerator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// The sealed ephemeris, once the propagation it was registered for has finished.
    pub fn generated_ephemeris(&self) -> Option<Rc<IntegratedEphemeris>> {
        self.slot.borrow().clone()
    }

    pub(crate) fn storage(&self, context: Rc<ConversionContext>, end_date: AbsoluteDate) -> StoringStepHandler {
        StoringStepHandler {
            model: DenseOutputModel::new(),
            context,
            end_date,
            slot: Rc::clone(&self.slot),
        }
    }
}

/// Step handler accumulating the dense output and sealing it at `finish`.
pub(crate) struct StoringStepHandler {
    model: DenseOutputModel,
    context: Rc<ConversionContext>,
    end_date: AbsoluteDate,
    slot: EphemerisSlot,
}

impl StepHandler for StoringStepHandler {
    fn init(&mut self, initial: &OdeStateAndDerivative, final_time: f64) -> OdeResult<()> {
        self.model.init(initial, final_time)
    }

    fn handle_step(&mut self, interpolator: &StepInterpolator) -> OdeResult<()> {
        self.model.append(interpolator);
        Ok(())
    }

    fn finish(&mut self, _final_state: &OdeStateAndDerivative) -> OdeResult<()> {
        let mapper = self.context.mapper();
        let start = mapper.map_double_to_date_near(self.model.initial_time(), mapper.reference_date());
        // an event may stop the integration short of the requested end
        let end = mapper.map_double_to_date_near(self.model.final_time(), self.end_date);
        let (min_date, max_date) = if self.model.is_forward() {
            (start, end)
        } else {
            (end, start)
        };
        tracing::debug!(%min_date, %max_date, steps = self.model.number_of_steps(), "ephemeris sealed");

        let ephemeris = IntegratedEphemeris {
            model: mem::take(&mut self.model),
            context: Rc::clone(&self.context),
            start_date: start,
            min_date,
            max_date,
        };
        *self
            .slot
            .try_borrow_mut()
            .map_err(|_| PropagationError::HandlerBusy { what: "ephemeris generator" })? =
            Some(Rc::new(ephemeris));
        Ok(())
    }
}
