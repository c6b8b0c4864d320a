//! Integration test: two-body propagation.
//!
//! Closed orbit over one period, no-op propagation, reset-at-end
//! continuation and the silent pre-roll leg.

use std::cell::RefCell;
use std::rc::Rc;

use pf_core::AbsoluteDate;
use pf_ode::{Action, DormandPrinceConfig, DormandPrinceIntegrator, OdeIntegrator};
use pf_propagation::{
    DateDetector, EARTH_MU, Frame, InertialProvider, IntegratedPropagator,
    KeplerianElements, KeplerianMotion, Orbit, OrbitStepHandler, OrbitStepInterpolator,
    OrbitType, PositionAngle, PropagationResult, SpacecraftState,
};

fn epoch() -> AbsoluteDate {
    AbsoluteDate::parse_rfc3339("2024-03-01T12:00:00Z").expect("valid epoch")
}

fn initial_state() -> SpacecraftState {
    let elements = KeplerianElements::new(7.0e6, 0.01, 0.9, 0.3, 1.2, 0.5, PositionAngle::True)
        .expect("valid elements");
    let orbit =
        Orbit::from_keplerian(&elements, Frame::gcrf(), epoch(), EARTH_MU).expect("valid orbit");
    SpacecraftState::from_orbit(orbit, &InertialProvider::default(), 1000.0)
}

fn new_propagator() -> IntegratedPropagator {
    let integrator = DormandPrinceIntegrator::new(DormandPrinceConfig {
        absolute_tolerance: 1e-9,
        relative_tolerance: 1e-12,
        max_step: 300.0,
        ..Default::default()
    })
    .expect("valid integrator");
    let mut propagator = IntegratedPropagator::new(integrator, KeplerianMotion);
    propagator.set_initial_state(initial_state());
    propagator
}

fn distance(a: &SpacecraftState, b: &SpacecraftState) -> (f64, f64) {
    (
        (a.orbit().position() - b.orbit().position()).norm(),
        (a.orbit().velocity() - b.orbit().velocity()).norm(),
    )
}

#[test]
fn closed_orbit_over_one_period() {
    let initial = initial_state();
    let period = initial.orbit().keplerian_period().expect("elliptic orbit");
    let mut propagator = new_propagator();

    let end = propagator
        .propagate_to(epoch().shifted_by(period))
        .expect("propagation succeeds");

    assert_eq!(end.date(), epoch().shifted_by(period));
    let (dp, dv) = distance(&end, &initial);
    assert!(dp < 0.1, "position drift {dp} m");
    assert!(dv < 1e-4, "velocity drift {dv} m/s");
    assert_eq!(end.mass(), 1000.0);

    assert!(propagator.calls() > 0);
    assert_eq!(propagator.calls(), propagator.integrator().evaluations());
}

#[test]
fn propagating_to_the_start_date_is_a_no_op() {
    let mut propagator = new_propagator();
    let first = propagator
        .propagate_to(epoch().shifted_by(600.0))
        .expect("propagation succeeds");
    let calls = propagator.calls();

    let same = propagator
        .propagate(first.date(), first.date())
        .expect("no-op propagation succeeds");
    assert_eq!(same, first);
    assert_eq!(propagator.calls(), calls);
    assert_eq!(propagator.initial_state(), Some(&first));
}

#[test]
fn reset_at_end_continues_from_final_state() {
    let t1 = epoch().shifted_by(1800.0);
    let t2 = epoch().shifted_by(4000.0);

    let mut split = new_propagator();
    split.propagate(epoch(), t1).expect("first leg");
    assert_eq!(split.initial_state().map(SpacecraftState::date), Some(t1));
    let chained = split.propagate(t1, t2).expect("second leg");

    let direct = new_propagator().propagate(epoch(), t2).expect("single leg");
    let (dp, dv) = distance(&chained, &direct);
    assert!(dp < 1e-2, "position difference {dp} m");
    assert!(dv < 1e-5, "velocity difference {dv} m/s");
}

#[test]
fn without_reset_at_end_every_call_restarts_from_the_initial_state() {
    let t1 = epoch().shifted_by(1800.0);
    let t2 = epoch().shifted_by(4000.0);

    let mut propagator = new_propagator();
    propagator.set_reset_at_end(false);
    propagator.propagate(epoch(), t1).expect("first call");
    assert_eq!(propagator.initial_state(), Some(&initial_state()));

    // start date differs from the stored initial date: silent pre-roll t0 -> t1
    let again = propagator.propagate(t1, t2).expect("second call");
    assert_eq!(propagator.initial_state(), Some(&initial_state()));

    let direct = new_propagator().propagate(epoch(), t2).expect("single leg");
    let (dp, _) = distance(&again, &direct);
    assert!(dp < 1e-2, "position difference {dp} m");
}

#[derive(Default)]
struct StepLog {
    init: Option<AbsoluteDate>,
    steps: Vec<(AbsoluteDate, AbsoluteDate)>,
    finished: Option<AbsoluteDate>,
}

impl OrbitStepHandler for StepLog {
    fn init(&mut self, initial: &SpacecraftState, _target: AbsoluteDate) -> PropagationResult<()> {
        self.init = Some(initial.date());
        Ok(())
    }

    fn handle_step(&mut self, interpolator: &OrbitStepInterpolator) -> PropagationResult<()> {
        let previous = interpolator.previous_state().date();
        let current = interpolator.current_state().date();
        assert!(interpolator.is_forward());

        let middle = previous.shifted_by(0.5 * current.duration_from(&previous));
        let narrowed = interpolator.restrict_step(
            interpolator.previous_state().clone(),
            interpolator.interpolated_state(middle)?,
        );
        assert_eq!(narrowed.current_state().date(), middle);

        self.steps.push((previous, current));
        Ok(())
    }

    fn finish(&mut self, final_state: &SpacecraftState) -> PropagationResult<()> {
        self.finished = Some(final_state.date());
        Ok(())
    }
}

#[test]
fn pre_roll_is_silent() {
    let start = epoch().shifted_by(1000.0);
    let target = epoch().shifted_by(1200.0);

    let mut propagator = new_propagator();
    propagator.set_reset_at_end(false);
    let log = Rc::new(RefCell::new(StepLog::default()));
    propagator.add_step_handler(log.clone());
    // only reachable during the pre-roll
    let detector = Rc::new(RefCell::new(
        DateDetector::new(epoch().shifted_by(500.0)).with_action(Action::Continue),
    ));
    propagator.add_event_detector(detector.clone());

    let end = propagator.propagate(start, target).expect("propagation succeeds");
    assert_eq!(end.date(), target);

    let log = log.borrow();
    assert_eq!(log.init, Some(start));
    assert_eq!(log.finished, Some(target));
    assert_eq!(log.steps.first().map(|s| s.0), Some(start));
    assert_eq!(log.steps.last().map(|s| s.1), Some(target));
    for pair in log.steps.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    assert_eq!(detector.borrow().triggered(), None);
}

#[test]
fn element_sets_agree() {
    let target = epoch().shifted_by(3000.0);
    let reference = new_propagator().propagate_to(target).expect("cartesian");

    for (orbit_type, angle) in [
        (OrbitType::Keplerian, PositionAngle::Mean),
        (OrbitType::Keplerian, PositionAngle::True),
        (OrbitType::Equinoctial, PositionAngle::Eccentric),
        (OrbitType::Equinoctial, PositionAngle::True),
    ] {
        let mut propagator = new_propagator();
        propagator.set_orbit_type(orbit_type, angle);
        let end = propagator.propagate_to(target).expect("propagation succeeds");
        let (dp, dv) = distance(&end, &reference);
        assert!(dp < 0.1, "{orbit_type:?}/{angle:?}: position difference {dp} m");
        assert!(dv < 1e-4, "{orbit_type:?}/{angle:?}: velocity difference {dv} m/s");
    }
}

#[test]
fn backward_and_forward_again() {
    let mut propagator = new_propagator();
    let back = propagator
        .propagate_to(epoch().shifted_by(-2500.0))
        .expect("backward propagation");
    assert_eq!(back.date(), epoch().shifted_by(-2500.0));

    let forth = propagator.propagate_to(epoch()).expect("forward propagation");
    let (dp, dv) = distance(&forth, &initial_state());
    assert!(dp < 0.1, "position difference {dp} m");
    assert!(dv < 1e-4, "velocity difference {dv} m/s");
}
