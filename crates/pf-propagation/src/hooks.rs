//! Extension points called by the propagator around each leg.

use std::cell::RefCell;
use std::rc::Rc;

use pf_core::AbsoluteDate;

use crate::error::PropagationResult;
use crate::state::SpacecraftState;

/// Callbacks around integration. Every method defaults to a no-op.
pub trait PropagationHooks {
    /// Called before the integrator starts, with the leg's initial state.
    fn before_integration(
        &mut self,
        _initial: &SpacecraftState,
        _target: AbsoluteDate,
    ) -> PropagationResult<()> {
        Ok(())
    }

    /// Called with the final state once the integrator has returned.
    fn after_integration(&mut self, _final_state: &SpacecraftState) -> PropagationResult<()> {
        Ok(())
    }

    /// Called when an event detector replaced the state.
    fn state_changed(&mut self, _state: &SpacecraftState) -> PropagationResult<()> {
        Ok(())
    }
}

pub type SharedHooks = Rc<RefCell<dyn PropagationHooks>>;

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl PropagationHooks for NoHooks {}
