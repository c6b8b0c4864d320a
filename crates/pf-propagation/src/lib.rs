//! pf-propagation: integrated spacecraft state propagation.
//!
//! Contains:
//! - frames, orbit, attitude, state (spacecraft state model)
//! - mapper (spacecraft state <-> integration vector)
//! - generators (integrable generators and closed-form providers)
//! - equations, event_adapter, step_handler (integrator-facing adapters)
//! - ephemeris (bounded ephemerides built from dense output)
//! - resetter (scoped restoration of integrator handlers)
//! - propagator (the propagation driver)
//! - dynamics, partials, detectors (reference dynamics, state transition
//!   matrix and stock detectors)

pub mod attitude;
pub mod detectors;
pub mod dynamics;
pub mod ephemeris;
pub mod equations;
pub mod error;
pub mod event_adapter;
pub mod frames;
pub mod generators;
pub mod hooks;
pub mod mapper;
pub mod orbit;
pub mod partials;
pub mod propagator;
pub mod resetter;
pub mod state;
pub mod step_handler;

mod context;

pub use attitude::{Attitude, AttitudeProvider, InertialProvider, LvlhProvider};
pub use detectors::{DateDetector, FunctionalDetector, RecordedEvent};
pub use dynamics::KeplerianMotion;
pub use ephemeris::{
    BoundedPropagator, EphemerisError, EphemerisGenerator, EphemerisResult, IntegratedEphemeris,
};
pub use equations::MainStateEquations;
pub use error::{PropagationError, PropagationResult};
pub use event_adapter::{EventDetector, SharedDetector};
pub use frames::Frame;
pub use generators::{
    AdditionalStateProvider, GeneratorRegistry, IntegrableGenerator, RESERVED_NAMES,
    SharedGenerator,
};
pub use hooks::{NoHooks, PropagationHooks, SharedHooks};
pub use mapper::{BASIC_DIMENSION, PropagationType, StateMapper};
pub use orbit::{
    EARTH_MU, EquinoctialElements, KeplerianElements, Orbit, OrbitType, PositionAngle,
};
pub use partials::{STM_DIMENSION, StateTransitionGenerator, state_transition_matrix};
pub use propagator::IntegratedPropagator;
pub use resetter::IntegratorResetter;
pub use state::{AdditionalStates, SpacecraftState};
pub use step_handler::{OrbitStepHandler, OrbitStepInterpolator, SharedOrbitStepHandler};
