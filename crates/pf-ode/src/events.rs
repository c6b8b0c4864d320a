//! Event handlers, their registration settings and the bracketing root solver.
//!
//! An event is a sign change of a switching function `g(t, y)`. The
//! integrator samples `g` along each step, brackets any sign change and
//! refines it with [`BracketingSolver`] before telling the handler.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::{OdeError, OdeResult};
use crate::state::{OdeState, OdeStateAndDerivative};

/// What the integrator does after an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Stop integration at the event.
    Stop,
    /// Replace the state with [`EventHandler::reset_state`] and restart.
    ResetState,
    /// Keep the state but recompute derivatives and restart.
    ResetDerivatives,
    /// Carry on.
    Continue,
}

pub trait EventHandler {
    fn init(&mut self, _initial: &OdeStateAndDerivative, _final_time: f64) -> OdeResult<()> {
        Ok(())
    }

    /// Switching function; events are located at its sign changes.
    fn g(&mut self, state: &OdeStateAndDerivative) -> OdeResult<f64>;

    fn event_occurred(
        &mut self,
        state: &OdeStateAndDerivative,
        increasing: bool,
    ) -> OdeResult<Action>;

    /// New state after an event that returned [`Action::ResetState`].
    fn reset_state(&mut self, state: &OdeStateAndDerivative) -> OdeResult<OdeState> {
        Ok(state.state.clone())
    }
}

/// Handle under which event handlers are registered with an integrator.
pub type SharedEventHandler = Rc<RefCell<dyn EventHandler>>;

/// Root solver flavour used to refine a bracketed event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketingSolver {
    /// Brent's method: inverse quadratic interpolation, secant, bisection.
    #[default]
    Brent,
    /// Plain bisection.
    Bisection,
}

/// Detection settings attached to one registered handler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Largest time span sampled without evaluating `g` (seconds).
    pub max_check_interval: f64,
    /// Width of the final bracket around the root (seconds).
    pub convergence: f64,
    pub max_iteration_count: usize,
    pub solver: BracketingSolver,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            max_check_interval: 600.0,
            convergence: 1e-6,
            max_iteration_count: 100,
            solver: BracketingSolver::Brent,
        }
    }
}

/// A handler together with the settings it was registered with.
///
/// Two configurations are equal when they refer to the same handler
/// instance and carry the same settings.
#[derive(Clone)]
pub struct EventHandlerConfiguration {
    handler: SharedEventHandler,
    settings: EventSettings,
}

impl EventHandlerConfiguration {
    pub fn new(handler: SharedEventHandler, settings: EventSettings) -> Self {
        Self { handler, settings }
    }

    pub fn handler(&self) -> &SharedEventHandler {
        &self.handler
    }

    pub fn settings(&self) -> &EventSettings {
        &self.settings
    }
}

impl PartialEq for EventHandlerConfiguration {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.handler, &other.handler) && self.settings == other.settings
    }
}

impl fmt::Debug for EventHandlerConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlerConfiguration")
            .field("handler", &Rc::as_ptr(&self.handler))
            .field("settings", &self.settings)
            .finish()
    }
}

/// Narrow bracket around a root of `g`.
///
/// `before` lies on the same side of the root as the start of the search,
/// `after` on the other side, so `g(after)` already carries the post-event sign.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RootBracket {
    pub before: f64,
    pub after: f64,
    pub g_after: f64,
    pub evaluations: usize,
}

/// Sign class used for bracketing: zero counts as positive.
fn positive(g: f64) -> bool {
    g >= 0.0
}

impl BracketingSolver {
    /// Refine the sign change of `f` between `ta` (sign of `ga`) and `tb`.
    ///
    /// Stops when the bracket is narrower than `accuracy`. `ta` may be
    /// greater than `tb` for backward integration.
    #[allow(clippy::too_many_arguments)]
    pub fn solve<F>(
        self,
        mut f: F,
        ta: f64,
        ga: f64,
        tb: f64,
        gb: f64,
        accuracy: f64,
        max_iterations: usize,
    ) -> OdeResult<RootBracket>
    where
        F: FnMut(f64) -> OdeResult<f64>,
    {
        let start_positive = positive(ga);
        if start_positive == positive(gb) {
            return Err(OdeError::RootNotBracketed { ta, tb, ga, gb });
        }

        let (mut a, mut fa, mut b, mut fb) = (ta, ga, tb, gb);
        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }
        let mut c = a;
        let mut fc = fa;
        let mut d = b - a;
        let mut mflag = true;
        let mut evaluations = 0;

        let bracket = |a: f64, fa: f64, b: f64, fb: f64, evaluations: usize| {
            if positive(fa) == start_positive {
                RootBracket {
                    before: a,
                    after: b,
                    g_after: fb,
                    evaluations,
                }
            } else {
                RootBracket {
                    before: b,
                    after: a,
                    g_after: fa,
                    evaluations,
                }
            }
        };

        for _ in 0..max_iterations {
            if fa.abs() < fb.abs() {
                std::mem::swap(&mut a, &mut b);
                std::mem::swap(&mut fa, &mut fb);
            }
            if (b - a).abs() <= accuracy {
                return Ok(bracket(a, fa, b, fb, evaluations));
            }

            let mid = 0.5 * (a + b);
            let s = match self {
                BracketingSolver::Bisection => mid,
                BracketingSolver::Brent => {
                    let s = if fa != fc && fb != fc {
                        a * fb * fc / ((fa - fb) * (fa - fc))
                            + b * fa * fc / ((fb - fa) * (fb - fc))
                            + c * fa * fb / ((fc - fa) * (fc - fb))
                    } else if fb != fa {
                        b - fb * (b - a) / (fb - fa)
                    } else {
                        mid
                    };
                    let reject = !s.is_finite()
                        || s == a
                        || s == b
                        || (s - (3.0 * a + b) / 4.0) * (s - b) > 0.0
                        || (mflag && (s - b).abs() >= (b - c).abs() / 2.0)
                        || (!mflag && (s - b).abs() >= (c - d).abs() / 2.0)
                        || (mflag && (b - c).abs() < accuracy)
                        || (!mflag && (c - d).abs() < accuracy);
                    mflag = reject;
                    if reject { mid } else { s }
                }
            };

            let fs = f(s)?;
            evaluations += 1;
            d = c;
            c = b;
            fc = fb;
            if positive(fa) != positive(fs) {
                b = s;
                fb = fs;
            } else {
                a = s;
                fa = fs;
            }
        }

        if (b - a).abs() <= accuracy {
            return Ok(bracket(a, fa, b, fb, evaluations));
        }
        tracing::warn!(a, b, max_iterations, "event root solver did not converge");
        Err(OdeError::RootNotConverged {
            t: b,
            iterations: max_iterations,
        })
    }
}
