//! Error types for ODE integration.

use std::cell::{RefCell, RefMut};

use thiserror::Error;

/// Errors encountered while integrating an ODE.
#[derive(Error, Debug)]
pub enum OdeError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Step size {step:e} below minimum {min_step:e} at t = {t}")]
    StepSizeUnderflow { t: f64, step: f64, min_step: f64 },

    #[error("Maximum number of steps ({max_steps}) exceeded at t = {t}")]
    MaxStepsExceeded { max_steps: usize, t: f64 },

    #[error("Non-finite {what} at t = {t}")]
    NonFiniteState { what: &'static str, t: f64 },

    #[error("Event root not bracketed in [{ta}, {tb}] (g = {ga}, {gb})")]
    RootNotBracketed { ta: f64, tb: f64, ga: f64, gb: f64 },

    #[error("Event root not converged after {iterations} iterations near t = {t}")]
    RootNotConverged { t: f64, iterations: usize },

    #[error("Dense output model holds no step")]
    EmptyModel,

    #[error("Handler already borrowed: {what}")]
    HandlerBusy { what: &'static str },

    /// Error raised by user code invoked from inside the integrator.
    #[error(transparent)]
    Callback(Box<dyn std::error::Error + Send + Sync>),
}

pub type OdeResult<T> = Result<T, OdeError>;

impl OdeError {
    pub fn callback<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        OdeError::Callback(Box::new(err))
    }
}

impl From<pf_core::CoreError> for OdeError {
    fn from(e: pf_core::CoreError) -> Self {
        OdeError::callback(e)
    }
}

/// Mutable borrow of a shared handler, failing instead of panicking on re-entry.
pub(crate) fn borrow_handler<'a, T: ?Sized>(
    cell: &'a RefCell<T>,
    what: &'static str,
) -> OdeResult<RefMut<'a, T>> {
    cell.try_borrow_mut()
        .map_err(|_| OdeError::HandlerBusy { what })
}
