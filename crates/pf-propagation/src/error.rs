//! Error types for propagation.

use std::cell::{RefCell, RefMut};

use pf_core::{AbsoluteDate, CoreError};
use pf_ode::OdeError;
use thiserror::Error;

/// Errors raised while configuring or running a propagation.
#[derive(Error, Debug)]
pub enum PropagationError {
    #[error("Initial state not set")]
    MissingInitialState,

    #[error("Name conflict: '{name}' is already in use")]
    NameConflict { name: String },

    #[error("Unknown additional state '{name}'")]
    UnknownAdditionalState { name: String },

    #[error("Spacecraft mass must be positive, got {mass}")]
    NonPositiveMass { mass: f64 },

    #[error("Invalid gravitational parameter: {mu}")]
    InvalidGravitationalParameter { mu: f64 },

    #[error("Frame '{frame}' is not pseudo-inertial")]
    NonInertialFrame { frame: String },

    #[error("{representation} elements are singular for this orbit: {what}")]
    SingularElements {
        representation: &'static str,
        what: &'static str,
    },

    #[error("Orbit is not elliptic: a = {a}, e = {e}")]
    NonEllipticOrbit { a: f64, e: f64 },

    #[error("Kepler equation did not converge for mean anomaly {mean_anomaly}")]
    KeplerNotConverged { mean_anomaly: f64 },

    #[error("Dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Date {date} outside of propagation range")]
    DateOutOfRange { date: AbsoluteDate },

    #[error("Handler already borrowed: {what}")]
    HandlerBusy { what: &'static str },

    #[error("Integration failed: {0}")]
    Integration(#[source] OdeError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type PropagationResult<T> = Result<T, PropagationError>;

/// Errors raised by a propagation callback travel through the integrator
/// boxed inside [`OdeError::Callback`]; they come back out unchanged.
impl From<OdeError> for PropagationError {
    fn from(e: OdeError) -> Self {
        match e {
            OdeError::Callback(inner) => match inner.downcast::<PropagationError>() {
                Ok(original) => *original,
                Err(other) => PropagationError::Integration(OdeError::Callback(other)),
            },
            other => PropagationError::Integration(other),
        }
    }
}

impl From<PropagationError> for OdeError {
    fn from(e: PropagationError) -> Self {
        OdeError::callback(e)
    }
}

/// Mutable borrow of a shared callback object, failing instead of panicking on re-entry.
pub(crate) fn borrow_shared<'a, T: ?Sized>(
    cell: &'a RefCell<T>,
    what: &'static str,
) -> PropagationResult<RefMut<'a, T>> {
    cell.try_borrow_mut()
        .map_err(|_| PropagationError::HandlerBusy { what })
}
