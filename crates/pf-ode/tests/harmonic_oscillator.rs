//! Integration test: harmonic oscillator y'' = -y.
//!
//! Exercises both integrators, dense output, events with every action kind,
//! backward integration and handler persistence across calls.

use std::cell::{Cell, RefCell};
use std::f64::consts::{FRAC_PI_2, PI};
use std::rc::Rc;

use pf_ode::{
    Action, ClassicalRungeKuttaIntegrator, DenseOutputModel, DormandPrinceConfig,
    DormandPrinceIntegrator, EventHandler, EventSettings, ExpandableOde, OdeError, OdeIntegrator,
    OdeResult, OdeState, OdeStateAndDerivative, OrdinaryDifferentialEquation, SecondaryOde,
    StepHandler, StepInterpolator,
};

struct Oscillator;

impl OrdinaryDifferentialEquation for Oscillator {
    fn dimension(&self) -> usize {
        2
    }

    fn compute_derivatives(&mut self, _t: f64, y: &[f64]) -> OdeResult<Vec<f64>> {
        Ok(vec![y[1], -y[0]])
    }
}

/// Accumulates the integral of y0^2 (energy-like quantity).
struct SquareIntegral;

impl SecondaryOde for SquareIntegral {
    fn dimension(&self) -> usize {
        1
    }

    fn compute_derivatives(
        &mut self,
        _t: f64,
        primary: &[f64],
        _primary_dot: &[f64],
        _secondary: &[f64],
    ) -> OdeResult<Vec<f64>> {
        Ok(vec![primary[0] * primary[0]])
    }
}

/// Event on y0 = 0 with a configurable action.
struct ZeroCrossing {
    action: Action,
    events: Vec<(f64, bool)>,
}

impl ZeroCrossing {
    fn new(action: Action) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            action,
            events: Vec::new(),
        }))
    }
}

impl EventHandler for ZeroCrossing {
    fn g(&mut self, state: &OdeStateAndDerivative) -> OdeResult<f64> {
        Ok(state.primary()[0])
    }

    fn event_occurred(
        &mut self,
        state: &OdeStateAndDerivative,
        increasing: bool,
    ) -> OdeResult<Action> {
        self.events.push((state.time(), increasing));
        Ok(self.action)
    }

    fn reset_state(&mut self, state: &OdeStateAndDerivative) -> OdeResult<OdeState> {
        // bounce on a wall at y0 = 0: back on the wall side, velocity reflected
        let mut reset = state.state.clone();
        reset.primary[0] = reset.primary[0].abs();
        reset.primary[1] = -reset.primary[1];
        Ok(reset)
    }
}

#[derive(Default)]
struct StepCounter {
    steps: usize,
    last: Option<f64>,
    finished: bool,
}

impl StepHandler for StepCounter {
    fn handle_step(&mut self, interpolator: &StepInterpolator) -> OdeResult<()> {
        self.steps += 1;
        self.last = Some(interpolator.current_state().time());
        Ok(())
    }

    fn finish(&mut self, _final_state: &OdeStateAndDerivative) -> OdeResult<()> {
        self.finished = true;
        Ok(())
    }
}

fn tight() -> DormandPrinceIntegrator {
    DormandPrinceIntegrator::new(DormandPrinceConfig {
        absolute_tolerance: 1e-11,
        relative_tolerance: 1e-11,
        max_step: 0.5,
        ..Default::default()
    })
    .unwrap()
}

fn start() -> OdeState {
    OdeState::new(0.0, vec![1.0, 0.0])
}

#[test]
fn dormand_prince_full_period() {
    let mut integrator = tight();
    let mut ode = ExpandableOde::new(Oscillator);
    let end = integrator.integrate(&mut ode, &start(), 2.0 * PI).unwrap();
    assert_eq!(end.time(), 2.0 * PI);
    assert!((end.primary()[0] - 1.0).abs() < 1e-8);
    assert!(end.primary()[1].abs() < 1e-8);
    assert!(integrator.evaluations() > 6);
}

#[test]
fn secondary_block_is_integrated_with_primary() {
    let mut integrator = tight();
    let mut ode = ExpandableOde::new(Oscillator);
    ode.add_secondary_equations(SquareIntegral);
    let initial = OdeState::with_secondary(0.0, vec![1.0, 0.0], vec![vec![0.0]]);
    let end = integrator.integrate(&mut ode, &initial, PI).unwrap();
    // integral of cos^2 over [0, pi] is pi / 2
    assert!((end.state.secondary[0][0] - FRAC_PI_2).abs() < 1e-8);
}

#[test]
fn missing_secondary_block_is_rejected() {
    let mut integrator = tight();
    let mut ode = ExpandableOde::new(Oscillator);
    ode.add_secondary_equations(SquareIntegral);
    let err = integrator.integrate(&mut ode, &start(), 1.0).unwrap_err();
    assert!(matches!(err, OdeError::DimensionMismatch { .. }));
}

#[test]
fn runge_kutta_matches_analytic_solution() {
    let mut integrator = ClassicalRungeKuttaIntegrator::new(0.01).unwrap();
    let mut ode = ExpandableOde::new(Oscillator);
    let end = integrator.integrate(&mut ode, &start(), 1.005).unwrap();
    assert_eq!(end.time(), 1.005);
    assert!((end.primary()[0] - 1.005f64.cos()).abs() < 1e-8);
    // 101 steps, 4 evaluations each, plus the initial one
    assert_eq!(integrator.evaluations(), 1 + 101 * 4);
}

#[test]
fn dense_output_covers_integration_span() {
    let model = Rc::new(RefCell::new(DenseOutputModel::new()));
    let mut integrator = tight();
    integrator.add_step_handler(model.clone());
    let mut ode = ExpandableOde::new(Oscillator);
    integrator.integrate(&mut ode, &start(), 3.0).unwrap();

    let model = model.borrow();
    assert_eq!(model.initial_time(), 0.0);
    assert_eq!(model.final_time(), 3.0);
    for t in [0.1, 1.234, 2.5, 2.999] {
        let s = model.interpolated_state(t).unwrap();
        assert!((s.primary()[0] - t.cos()).abs() < 1e-8, "t = {t}");
        assert!((s.primary_derivative[0] + t.sin()).abs() < 1e-7, "t = {t}");
    }
}

#[test]
fn stop_event_truncates_integration() {
    let detector = ZeroCrossing::new(Action::Stop);
    let counter = Rc::new(RefCell::new(StepCounter::default()));
    let mut integrator = tight();
    integrator.add_event_handler(detector.clone(), EventSettings::default());
    integrator.add_step_handler(counter.clone());

    let mut ode = ExpandableOde::new(Oscillator);
    let end = integrator.integrate(&mut ode, &start(), 10.0).unwrap();
    assert!((end.time() - FRAC_PI_2).abs() < 1e-6);
    assert_eq!(detector.borrow().events.len(), 1);
    assert!(!detector.borrow().events[0].1);

    let counter = counter.borrow();
    assert!(counter.finished);
    assert_eq!(counter.last, Some(end.time()));
}

#[test]
fn continue_events_are_reported_in_order() {
    let detector = ZeroCrossing::new(Action::Continue);
    let mut integrator = tight();
    integrator.add_event_handler(
        detector.clone(),
        EventSettings {
            max_check_interval: 0.1,
            convergence: 1e-10,
            ..Default::default()
        },
    );
    let mut ode = ExpandableOde::new(Oscillator);
    integrator.integrate(&mut ode, &start(), 10.0).unwrap();

    // roots of cos t in [0, 10]: pi/2 + k pi, k = 0..2
    let detector = detector.borrow();
    let events = &detector.events;
    assert_eq!(events.len(), 3);
    for (k, (t, increasing)) in events.iter().enumerate() {
        assert!((t - (FRAC_PI_2 + k as f64 * PI)).abs() < 1e-8);
        assert_eq!(*increasing, k % 2 == 1);
    }
}

#[test]
fn reset_state_reflects_trajectory() {
    let detector = ZeroCrossing::new(Action::ResetState);
    let mut integrator = tight();
    integrator.add_event_handler(detector.clone(), EventSettings::default());
    let mut ode = ExpandableOde::new(Oscillator);
    let end = integrator.integrate(&mut ode, &start(), 3.0).unwrap();

    // after the bounce at pi/2 the motion mirrors: y0 = -cos(t) stays positive
    assert_eq!(detector.borrow().events.len(), 1);
    assert!((end.primary()[0] + 3.0f64.cos()).abs() < 1e-5);
    assert!(end.primary()[0] > 0.0);
}

/// y' = rate, where the rate is switched from outside the ODE.
struct Ramp {
    rate: Rc<Cell<f64>>,
}

impl OrdinaryDifferentialEquation for Ramp {
    fn dimension(&self) -> usize {
        1
    }

    fn compute_derivatives(&mut self, _t: f64, _y: &[f64]) -> OdeResult<Vec<f64>> {
        Ok(vec![self.rate.get()])
    }
}

/// Flips the ramp rate at a fixed time and asks for fresh derivatives.
struct RateSwitch {
    at: f64,
    rate: Rc<Cell<f64>>,
    fired: usize,
}

impl EventHandler for RateSwitch {
    fn g(&mut self, state: &OdeStateAndDerivative) -> OdeResult<f64> {
        Ok(state.time() - self.at)
    }

    fn event_occurred(
        &mut self,
        _state: &OdeStateAndDerivative,
        _increasing: bool,
    ) -> OdeResult<Action> {
        self.fired += 1;
        self.rate.set(-self.rate.get());
        Ok(Action::ResetDerivatives)
    }
}

#[test]
fn reset_derivatives_restarts_with_fresh_slope() {
    let rate = Rc::new(Cell::new(1.0));
    let switch = Rc::new(RefCell::new(RateSwitch {
        at: 1.0,
        rate: rate.clone(),
        fired: 0,
    }));
    let mut integrator = tight();
    integrator.add_event_handler(switch.clone(), EventSettings::default());
    let mut ode = ExpandableOde::new(Ramp { rate });
    let end = integrator
        .integrate(&mut ode, &OdeState::new(0.0, vec![0.0]), 3.0)
        .unwrap();

    // up to 1 on [0, 1], then down by 2 on [1, 3]; the state itself is not reset
    assert_eq!(switch.borrow().fired, 1);
    assert!((end.primary()[0] + 1.0).abs() < 1e-5, "y = {}", end.primary()[0]);
    assert_eq!(end.primary_derivative[0], -1.0);
}

#[test]
fn backward_integration_finds_events() {
    let detector = ZeroCrossing::new(Action::Stop);
    let mut integrator = tight();
    integrator.add_event_handler(detector.clone(), EventSettings::default());
    let mut ode = ExpandableOde::new(Oscillator);
    let end = integrator.integrate(&mut ode, &start(), -4.0).unwrap();
    assert!((end.time() + FRAC_PI_2).abs() < 1e-6);
}

#[test]
fn handlers_persist_across_calls() {
    let counter = Rc::new(RefCell::new(StepCounter::default()));
    let mut integrator = ClassicalRungeKuttaIntegrator::new(0.25).unwrap();
    integrator.add_step_handler(counter.clone());
    let mut ode = ExpandableOde::new(Oscillator);
    integrator.integrate(&mut ode, &start(), 1.0).unwrap();
    integrator.integrate(&mut ode, &start(), 1.0).unwrap();
    assert_eq!(counter.borrow().steps, 8);
    assert_eq!(integrator.step_handlers().len(), 1);

    integrator.clear_step_handlers();
    assert!(integrator.step_handlers().is_empty());
}

#[test]
fn degenerate_interval_is_rejected() {
    let mut integrator = tight();
    let mut ode = ExpandableOde::new(Oscillator);
    let err = integrator.integrate(&mut ode, &start(), 0.0).unwrap_err();
    assert!(matches!(err, OdeError::InvalidArg { .. }));
}

#[test]
fn callback_errors_propagate() {
    #[derive(Debug, thiserror::Error)]
    #[error("boom at {0}")]
    struct Boom(f64);

    struct Failing;
    impl OrdinaryDifferentialEquation for Failing {
        fn dimension(&self) -> usize {
            1
        }
        fn compute_derivatives(&mut self, t: f64, _y: &[f64]) -> OdeResult<Vec<f64>> {
            if t > 0.5 {
                Err(OdeError::callback(Boom(t)))
            } else {
                Ok(vec![1.0])
            }
        }
    }

    let mut integrator = ClassicalRungeKuttaIntegrator::new(0.1).unwrap();
    let mut ode = ExpandableOde::new(Failing);
    let err = integrator
        .integrate(&mut ode, &OdeState::new(0.0, vec![0.0]), 1.0)
        .unwrap_err();
    assert!(err.to_string().starts_with("boom"));
}
