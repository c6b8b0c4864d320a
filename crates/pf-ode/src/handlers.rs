//! Step handlers called once per accepted (possibly truncated) step.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::OdeResult;
use crate::interpolator::StepInterpolator;
use crate::state::OdeStateAndDerivative;

pub trait StepHandler {
    fn init(&mut self, _initial: &OdeStateAndDerivative, _final_time: f64) -> OdeResult<()> {
        Ok(())
    }

    fn handle_step(&mut self, interpolator: &StepInterpolator) -> OdeResult<()>;

    fn finish(&mut self, _final_state: &OdeStateAndDerivative) -> OdeResult<()> {
        Ok(())
    }
}

/// Handle under which step handlers are registered with an integrator.
pub type SharedStepHandler = Rc<RefCell<dyn StepHandler>>;
