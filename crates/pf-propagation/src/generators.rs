//! Additional state generators and their registry.
//!
//! Two kinds of contributors manage named additional states:
//! - integrable generators, whose derivatives are integrated as secondary blocks
//! - closed-form providers, evaluated directly from the current state
//!
//! Names are unique across both kinds and the main state.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use pf_core::AbsoluteDate;

use crate::error::{PropagationError, PropagationResult};
use crate::state::SpacecraftState;

/// Names of the main state components, unavailable to generators.
pub const RESERVED_NAMES: [&str; 3] = ["orbit", "attitude", "mass"];

/// Derivatives of one named additional state.
///
/// The block dimension is taken from the value stored in the initial state
/// and must not change during a propagation.
pub trait IntegrableGenerator {
    fn name(&self) -> &str;

    fn init(&mut self, _initial: &SpacecraftState, _target: AbsoluteDate) -> PropagationResult<()> {
        Ok(())
    }

    /// Time derivative of the additional state `self.name()` carried by `state`.
    fn compute_derivatives(&mut self, state: &SpacecraftState) -> PropagationResult<Vec<f64>>;
}

pub type SharedGenerator = Rc<RefCell<dyn IntegrableGenerator>>;

/// Additional state computed in closed form from the rest of the state.
pub trait AdditionalStateProvider {
    fn name(&self) -> &str;

    fn additional_state(&self, state: &SpacecraftState) -> PropagationResult<Vec<f64>>;
}

/// Ordered registry of generators and providers.
///
/// Generators keep their registration order: the k-th generator owns
/// secondary block `k + 1`.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    providers: Vec<Rc<dyn AdditionalStateProvider>>,
    generators: Vec<(String, SharedGenerator)>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_name(&self, name: &str) -> PropagationResult<()> {
        if RESERVED_NAMES.contains(&name) || self.is_managed(name) {
            return Err(PropagationError::NameConflict {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn add_generator(&mut self, generator: SharedGenerator) -> PropagationResult<()> {
        let name = generator
            .try_borrow()
            .map_err(|_| PropagationError::HandlerBusy { what: "generator" })?
            .name()
            .to_string();
        self.check_name(&name)?;
        self.generators.push((name, generator));
        Ok(())
    }

    pub fn add_provider(&mut self, provider: Rc<dyn AdditionalStateProvider>) -> PropagationResult<()> {
        self.check_name(provider.name())?;
        self.providers.push(provider);
        Ok(())
    }

    pub fn is_managed(&self, name: &str) -> bool {
        self.providers.iter().any(|p| p.name() == name)
            || self.generators.iter().any(|(n, _)| n == name)
    }

    /// Providers first, then generators in registration order.
    pub fn managed_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.name().to_string())
            .chain(self.generators.iter().map(|(n, _)| n.clone()))
            .collect()
    }

    pub fn generator_names(&self) -> Vec<String> {
        self.generators.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn generators(&self) -> impl Iterator<Item = (&str, &SharedGenerator)> {
        self.generators.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn providers(&self) -> &[Rc<dyn AdditionalStateProvider>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.generators.is_empty()
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("managed", &self.managed_names())
            .finish()
    }
}
