//! Integration-based propagator.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{ExpandableOde, OdeIntegrator};
use tracing::debug;

use crate::attitude::AttitudeProvider;
use crate::context::ConversionContext;
use crate::ephemeris::EphemerisGenerator;
use crate::equations::{MainStateAdapter, MainStateEquations, SecondaryStateAdapter};
use crate::error::{PropagationError, PropagationResult, borrow_shared};
use crate::event_adapter::{AdaptedEventDetector, SharedDetector};
use crate::generators::{AdditionalStateProvider, GeneratorRegistry, SharedGenerator};
use crate::hooks::{NoHooks, SharedHooks};
use crate::mapper::StateMapper;
use crate::orbit::{OrbitType, PositionAngle};
use crate::resetter::IntegratorResetter;
use crate::state::{AdditionalStates, SpacecraftState};
use crate::step_handler::{AdaptedStepHandler, SharedOrbitStepHandler};

/// Propagator integrating the main state equations together with any
/// registered additional state generators.
///
/// Detectors, step handlers and ephemeris generators are wired into the
/// integrator for one call at a time; the integrator's own handler lists
/// are left as they were found.
///
/// Calling [`propagate`](Self::propagate) from one of its own callbacks is
/// not supported and fails with [`PropagationError::HandlerBusy`] or a
/// borrow conflict.
pub struct IntegratedPropagator {
    integrator: Box<dyn OdeIntegrator>,
    equations: Box<dyn MainStateEquations>,
    mapper: StateMapper,
    registry: GeneratorRegistry,
    detectors: Vec<SharedDetector>,
    step_handlers: Vec<SharedOrbitStepHandler>,
    pending_ephemerides: Vec<EphemerisGenerator>,
    hooks: SharedHooks,
    initial_state: Option<SpacecraftState>,
    start_date: Option<AbsoluteDate>,
    reset_at_end: bool,
    g_cache: bool,
    calls: Rc<Cell<usize>>,
}

/// What a leg wires into the integrator besides the equations.
enum Wiring<'a> {
    /// Pre-roll: no detector, no handler.
    Silent,
    User { ephemerides: &'a [EphemerisGenerator] },
}

impl IntegratedPropagator {
    pub fn new<I, E>(integrator: I, equations: E) -> Self
    where
        I: OdeIntegrator + 'static,
        E: MainStateEquations + 'static,
    {
        Self {
            integrator: Box::new(integrator),
            equations: Box::new(equations),
            mapper: StateMapper::default(),
            registry: GeneratorRegistry::new(),
            detectors: Vec::new(),
            step_handlers: Vec::new(),
            pending_ephemerides: Vec::new(),
            hooks: Rc::new(RefCell::new(NoHooks)),
            initial_state: None,
            start_date: None,
            reset_at_end: true,
            g_cache: true,
            calls: Rc::new(Cell::new(0)),
        }
    }

    pub fn integrator(&self) -> &dyn OdeIntegrator {
        self.integrator.as_ref()
    }

    pub fn integrator_mut(&mut self) -> &mut dyn OdeIntegrator {
        self.integrator.as_mut()
    }

    pub fn mapper(&self) -> &StateMapper {
        &self.mapper
    }

    pub fn set_orbit_type(&mut self, orbit_type: OrbitType, position_angle: PositionAngle) {
        self.mapper = self.mapper.with_orbit_type(orbit_type, position_angle);
    }

    /// Gravitational parameter; NaN means "take it from the initial orbit".
    pub fn set_mu(&mut self, mu: f64) {
        self.mapper = self.mapper.with_mu(mu);
    }

    pub fn set_attitude_provider(&mut self, provider: Rc<dyn AttitudeProvider>) {
        self.mapper = self.mapper.with_attitude_provider(provider);
    }

    pub fn set_initial_state(&mut self, state: SpacecraftState) {
        self.initial_state = Some(state);
        self.start_date = None;
    }

    pub fn initial_state(&self) -> Option<&SpacecraftState> {
        self.initial_state.as_ref()
    }

    /// Whether the final state replaces the initial state after each call (default `true`).
    pub fn set_reset_at_end(&mut self, reset_at_end: bool) {
        self.reset_at_end = reset_at_end;
    }

    pub fn is_reset_at_end(&self) -> bool {
        self.reset_at_end
    }

    /// Enable or disable the per-detector cache of the last `g` value.
    pub fn set_event_g_cache(&mut self, enabled: bool) {
        self.g_cache = enabled;
    }

    pub fn set_hooks(&mut self, hooks: SharedHooks) {
        self.hooks = hooks;
    }

    /// Main equation evaluations during the last integration leg.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn add_generator(&mut self, generator: SharedGenerator) -> PropagationResult<()> {
        self.registry.add_generator(generator)
    }

    pub fn add_additional_state_provider(
        &mut self,
        provider: Rc<dyn AdditionalStateProvider>,
    ) -> PropagationResult<()> {
        self.registry.add_provider(provider)
    }

    pub fn is_managed(&self, name: &str) -> bool {
        self.registry.is_managed(name)
    }

    pub fn managed_names(&self) -> Vec<String> {
        self.registry.managed_names()
    }

    pub fn add_event_detector(&mut self, detector: SharedDetector) {
        self.detectors.push(detector);
    }

    pub fn event_detectors(&self) -> &[SharedDetector] {
        &self.detectors
    }

    pub fn clear_event_detectors(&mut self) {
        self.detectors.clear();
    }

    pub fn add_step_handler(&mut self, handler: SharedOrbitStepHandler) {
        self.step_handlers.push(handler);
    }

    pub fn clear_step_handlers(&mut self) {
        self.step_handlers.clear();
    }

    /// Register an ephemeris generator for the next propagation call.
    pub fn ephemeris_generator(&mut self) -> EphemerisGenerator {
        let generator = EphemerisGenerator::new();
        self.pending_ephemerides.push(generator.clone());
        generator
    }

    /// Propagate from the current start date (the initial state date unless
    /// a previous call moved it) to `target`.
    pub fn propagate_to(&mut self, target: AbsoluteDate) -> PropagationResult<SpacecraftState> {
        let initial = self
            .initial_state
            .as_ref()
            .ok_or(PropagationError::MissingInitialState)?;
        let start = self.start_date.unwrap_or_else(|| initial.date());
        self.propagate(start, target)
    }

    /// Propagate from `start` to `target`.
    ///
    /// When `start` differs from the initial state date, the propagator
    /// first integrates silently up to `start`, without detectors or step
    /// handlers. The stored initial state is only replaced once the whole
    /// call succeeded, and only with reset-at-end enabled.
    pub fn propagate(
        &mut self,
        start: AbsoluteDate,
        target: AbsoluteDate,
    ) -> PropagationResult<SpacecraftState> {
        let initial = self
            .initial_state
            .clone()
            .ok_or(PropagationError::MissingInitialState)?;
        let ephemerides = std::mem::take(&mut self.pending_ephemerides);

        let leg_start = if start == initial.date() {
            initial
        } else {
            debug!(from = %initial.date(), to = %start, "pre-rolling to start date");
            self.integrate_leg(&initial, start, Wiring::Silent)?
        };
        let final_state = self.integrate_leg(
            &leg_start,
            target,
            Wiring::User {
                ephemerides: &ephemerides,
            },
        )?;

        for detector in &self.detectors {
            borrow_shared(detector, "event detector")?.finish(&final_state)?;
        }
        if self.reset_at_end {
            self.start_date = Some(final_state.date());
            self.initial_state = Some(final_state.clone());
        }
        Ok(final_state)
    }

    fn integrate_leg(
        &mut self,
        initial: &SpacecraftState,
        target: AbsoluteDate,
        wiring: Wiring<'_>,
    ) -> PropagationResult<SpacecraftState> {
        if initial.date() == target {
            return Ok(initial.clone());
        }

        if self.mapper.mu().is_nan() {
            self.mapper = self.mapper.with_mu(initial.mu());
        }
        let mu = self.mapper.mu();
        if !(mu.is_finite() && mu > 0.0) {
            return Err(PropagationError::InvalidGravitationalParameter { mu });
        }
        let mass = initial.mass();
        if mass.is_nan() || mass <= 0.0 {
            return Err(PropagationError::NonPositiveMass { mass });
        }

        let mapper = self
            .mapper
            .with_reference_date(initial.date())
            .with_frame(initial.frame().clone());

        let mut blocks = Vec::new();
        for (name, generator) in self.registry.generators() {
            let dimension = initial.additional_state(name)?.len();
            blocks.push((name.to_string(), Rc::clone(generator), dimension));
        }
        let mut unmanaged = AdditionalStates::new();
        for (name, value) in initial.additional_states().iter() {
            if !self.registry.is_managed(name) {
                unmanaged.insert(name, value.to_vec());
            }
        }
        let context = Rc::new(ConversionContext::new(
            mapper,
            blocks.iter().map(|(name, _, _)| name.clone()).collect(),
            unmanaged,
            self.registry.providers().to_vec(),
        ));
        let ode_initial = context.to_ode_state(initial)?;
        let t_end = context.mapper().map_date_to_double(target);

        borrow_shared(&self.hooks, "propagation hooks")?.before_integration(initial, target)?;
        debug!(from = %initial.date(), to = %target, generators = blocks.len(), "integration leg started");

        let mut ode = ExpandableOde::new(MainStateAdapter::new(
            self.equations.as_mut(),
            Rc::clone(&context),
            Rc::clone(&self.calls),
        ));
        for (name, generator, dimension) in blocks {
            ode.add_secondary_equations(SecondaryStateAdapter::new(
                name,
                generator,
                dimension,
                Rc::clone(&context),
            ));
        }

        let result = {
            let mut integrator = IntegratorResetter::new(self.integrator.as_mut());
            if let Wiring::User { ephemerides } = wiring {
                for detector in &self.detectors {
                    let adapted = AdaptedEventDetector::new(
                        Rc::clone(detector),
                        Rc::clone(&context),
                        Rc::clone(&self.hooks),
                        self.g_cache,
                    );
                    let settings = adapted.settings()?;
                    integrator.add_event_handler(Rc::new(RefCell::new(adapted)), settings);
                }
                for handler in &self.step_handlers {
                    integrator.add_step_handler(Rc::new(RefCell::new(AdaptedStepHandler::new(
                        Rc::clone(handler),
                        Rc::clone(&context),
                    ))));
                }
                for generator in ephemerides {
                    integrator.add_step_handler(Rc::new(RefCell::new(
                        generator.storage(Rc::clone(&context), target),
                    )));
                }
            }
            integrator.integrate(&mut ode, &ode_initial, t_end)?
        };

        let date = context.mapper().map_double_to_date_near(result.time(), target);
        let final_state = context.ode_to_state_at(&result, date)?;
        borrow_shared(&self.hooks, "propagation hooks")?.after_integration(&final_state)?;
        debug!(to = %final_state.date(), calls = self.calls.get(), "integration leg finished");
        Ok(final_state)
    }
}
