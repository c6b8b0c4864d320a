//! pf-ode: ordinary differential equation substrate.
//!
//! Contains:
//! - state (ODE states, derivatives and the block layout mapper)
//! - equations (primary / secondary equations and the expandable ODE)
//! - interpolator (per-step dense interpolants)
//! - dense_output (continuous model assembled from accepted steps)
//! - events (event handlers, configurations and bracketing root solver)
//! - handlers (step handlers)
//! - integrator (integrator trait and the shared step acceptance loop)
//! - dormand_prince, runge_kutta (concrete integrators)

pub mod dense_output;
pub mod dormand_prince;
pub mod equations;
pub mod error;
pub mod events;
pub mod handlers;
pub mod integrator;
pub mod interpolator;
pub mod runge_kutta;
pub mod state;

mod event_state;

pub use dense_output::DenseOutputModel;
pub use dormand_prince::{DormandPrinceConfig, DormandPrinceIntegrator};
pub use equations::{ExpandableOde, OrdinaryDifferentialEquation, SecondaryOde};
pub use error::{OdeError, OdeResult};
pub use events::{
    Action, BracketingSolver, EventHandler, EventHandlerConfiguration, EventSettings,
    SharedEventHandler,
};
pub use handlers::{SharedStepHandler, StepHandler};
pub use integrator::{HandlerRegistry, OdeIntegrator};
pub use interpolator::StepInterpolator;
pub use runge_kutta::ClassicalRungeKuttaIntegrator;
pub use state::{EquationsMapper, OdeState, OdeStateAndDerivative};
