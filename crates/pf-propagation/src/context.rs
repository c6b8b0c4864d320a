//! Per-leg conversion between integrator states and spacecraft states.

use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{OdeState, OdeStateAndDerivative};

use crate::error::PropagationResult;
use crate::generators::AdditionalStateProvider;
use crate::mapper::{PropagationType, StateMapper};
use crate::state::{AdditionalStates, SpacecraftState};

/// Everything needed to turn integrator vectors back into spacecraft states
/// during one integration leg.
///
/// Built at the start of each leg and shared by every adapter of that leg.
#[derive(Clone)]
pub(crate) struct ConversionContext {
    mapper: StateMapper,
    propagation_type: PropagationType,
    /// Generator names, secondary block `k + 1` belongs to `generators[k]`.
    generators: Vec<String>,
    /// Additional states of the initial state that nothing manages.
    unmanaged: AdditionalStates,
    providers: Vec<Rc<dyn AdditionalStateProvider>>,
}

impl ConversionContext {
    pub(crate) fn new(
        mapper: StateMapper,
        generators: Vec<String>,
        unmanaged: AdditionalStates,
        providers: Vec<Rc<dyn AdditionalStateProvider>>,
    ) -> Self {
        Self {
            mapper,
            propagation_type: PropagationType::Osculating,
            generators,
            unmanaged,
            providers,
        }
    }

    pub(crate) fn mapper(&self) -> &StateMapper {
        &self.mapper
    }

    pub(crate) fn date(&self, t: f64) -> AbsoluteDate {
        self.mapper.map_double_to_date(t)
    }

    /// Main state only, with unmanaged and provider states merged in.
    pub(crate) fn to_state(
        &self,
        t: f64,
        primary: &[f64],
        primary_dot: Option<&[f64]>,
    ) -> PropagationResult<SpacecraftState> {
        let state = self
            .mapper
            .array_to_state(t, primary, primary_dot, self.propagation_type)?;
        self.update_additional_states(state)
    }

    /// Complete state: main block, every generator block, then tracked states.
    pub(crate) fn ode_to_state(&self, ode: &OdeStateAndDerivative) -> PropagationResult<SpacecraftState> {
        let date = self.mapper.map_double_to_date(ode.time());
        self.ode_to_state_at(ode, date)
    }

    pub(crate) fn ode_to_state_at(
        &self,
        ode: &OdeStateAndDerivative,
        date: AbsoluteDate,
    ) -> PropagationResult<SpacecraftState> {
        let mut state = self.mapper.array_to_state_at(
            date,
            ode.primary(),
            Some(&ode.primary_derivative),
            self.propagation_type,
        )?;
        for (k, name) in self.generators.iter().enumerate() {
            if let Some(block) = ode.secondary(k) {
                state = state.with_additional_state(name.clone(), block.to_vec());
            }
        }
        self.update_additional_states(state)
    }

    /// Merge unmanaged initial states, then evaluate closed-form providers.
    pub(crate) fn update_additional_states(
        &self,
        mut state: SpacecraftState,
    ) -> PropagationResult<SpacecraftState> {
        for (name, value) in self.unmanaged.iter() {
            state = state.with_additional_state(name, value.to_vec());
        }
        for provider in &self.providers {
            let value = provider.additional_state(&state)?;
            state = state.with_additional_state(provider.name(), value);
        }
        Ok(state)
    }

    /// Integrator state of `state`, with time relative to the leg's reference date.
    pub(crate) fn to_ode_state(&self, state: &SpacecraftState) -> PropagationResult<OdeState> {
        let (primary, _) = self.mapper.state_to_array(state)?;
        let secondary = self
            .generators
            .iter()
            .map(|name| state.additional_state(name).map(<[f64]>::to_vec))
            .collect::<PropagationResult<Vec<_>>>()?;
        Ok(OdeState::with_secondary(
            self.mapper.map_date_to_double(state.date()),
            primary,
            secondary,
        ))
    }
}
