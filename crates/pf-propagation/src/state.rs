//! Spacecraft state snapshots.

use pf_core::AbsoluteDate;

use crate::attitude::{Attitude, AttitudeProvider};
use crate::error::{PropagationError, PropagationResult};
use crate::frames::Frame;
use crate::orbit::Orbit;

/// Named additional state vectors, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdditionalStates {
    entries: Vec<(String, Vec<f64>)>,
}

impl AdditionalStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace the value stored under `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: Vec<f64>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

/// Immutable snapshot of the spacecraft at one date.
#[derive(Clone, Debug, PartialEq)]
pub struct SpacecraftState {
    orbit: Orbit,
    attitude: Attitude,
    mass: f64,
    additional: AdditionalStates,
}

impl SpacecraftState {
    pub const DEFAULT_MASS: f64 = 1000.0;

    pub fn new(orbit: Orbit, attitude: Attitude, mass: f64) -> Self {
        Self {
            orbit,
            attitude,
            mass,
            additional: AdditionalStates::new(),
        }
    }

    /// State with the attitude computed by `provider` at the orbit date.
    pub fn from_orbit(orbit: Orbit, provider: &dyn AttitudeProvider, mass: f64) -> Self {
        let attitude = provider.attitude(&orbit, orbit.date(), orbit.frame());
        Self::new(orbit, attitude, mass)
    }

    /// Copy of this state with `name` set to `value`.
    pub fn with_additional_state(mut self, name: impl Into<String>, value: Vec<f64>) -> Self {
        self.additional.insert(name, value);
        self
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn date(&self) -> AbsoluteDate {
        self.orbit.date()
    }

    pub fn orbit(&self) -> &Orbit {
        &self.orbit
    }

    pub fn attitude(&self) -> &Attitude {
        &self.attitude
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn frame(&self) -> &Frame {
        self.orbit.frame()
    }

    pub fn mu(&self) -> f64 {
        self.orbit.mu()
    }

    pub fn has_additional_state(&self, name: &str) -> bool {
        self.additional.contains(name)
    }

    pub fn additional_state(&self, name: &str) -> PropagationResult<&[f64]> {
        self.additional
            .get(name)
            .ok_or_else(|| PropagationError::UnknownAdditionalState {
                name: name.to_string(),
            })
    }

    pub fn additional_states(&self) -> &AdditionalStates {
        &self.additional
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attitude::InertialProvider;
    use crate::orbit::EARTH_MU;
    use nalgebra::Vector3;

    fn state() -> SpacecraftState {
        let orbit = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, 7.5e3, 0.0),
            Frame::gcrf(),
            AbsoluteDate::J2000_EPOCH,
            EARTH_MU,
        )
        .unwrap();
        SpacecraftState::from_orbit(orbit, &InertialProvider::default(), 500.0)
    }

    #[test]
    fn additional_states_keep_order_and_replace() {
        let s = state()
            .with_additional_state("b", vec![1.0])
            .with_additional_state("a", vec![2.0, 3.0])
            .with_additional_state("b", vec![4.0]);
        let names: Vec<_> = s.additional_states().names().collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(s.additional_state("b").unwrap(), &[4.0]);
    }

    #[test]
    fn unknown_additional_state_is_named() {
        let err = state().additional_state("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
