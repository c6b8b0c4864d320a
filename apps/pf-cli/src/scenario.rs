//! YAML propagation scenarios and the reports produced from them.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use pf_core::{AbsoluteDate, CoreError};
use pf_ode::{
    ClassicalRungeKuttaIntegrator, DormandPrinceConfig, DormandPrinceIntegrator, OdeError,
    OdeIntegrator,
};
use pf_propagation::{
    AttitudeProvider, BoundedPropagator, EARTH_MU, EphemerisError, Frame, InertialProvider,
    IntegratedPropagator, KeplerianMotion, LvlhProvider, Orbit, OrbitType, PositionAngle,
    PropagationError, SpacecraftState, StateTransitionGenerator, state_transition_matrix,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

const STM_NAME: &str = "stm";

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Scenario parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid scenario: {0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Ode(#[from] OdeError),

    #[error(transparent)]
    Propagation(#[from] PropagationError),

    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttitudeMode {
    #[default]
    Inertial,
    Lvlh,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegratorSpec {
    DormandPrince(DormandPrinceConfig),
    RungeKutta { step: f64 },
}

impl Default for IntegratorSpec {
    fn default() -> Self {
        IntegratorSpec::DormandPrince(DormandPrinceConfig::default())
    }
}

fn default_mu() -> f64 {
    EARTH_MU
}

fn default_mass() -> f64 {
    SpacecraftState::DEFAULT_MASS
}

fn default_output_step() -> f64 {
    60.0
}

/// Initial conditions, integrator and output settings of one run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Scenario {
    pub epoch: DateTime<Utc>,
    #[serde(default = "default_mu")]
    pub mu: f64,
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// GCRF position (m).
    pub position: [f64; 3],
    /// GCRF velocity (m/s).
    pub velocity: [f64; 3],
    /// Signed propagation span (s); negative goes backward.
    pub duration: f64,
    #[serde(default = "default_output_step")]
    pub output_step: f64,
    #[serde(default)]
    pub orbit_type: OrbitType,
    #[serde(default)]
    pub position_angle: PositionAngle,
    #[serde(default)]
    pub attitude: AttitudeMode,
    #[serde(default)]
    pub stm: bool,
    #[serde(default)]
    pub integrator: IntegratorSpec,
}

impl Scenario {
    pub fn from_yaml_str(text: &str) -> CliResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> CliResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn start_date(&self) -> AbsoluteDate {
        AbsoluteDate::from_utc(&self.epoch)
    }

    pub fn end_date(&self) -> AbsoluteDate {
        self.start_date().shifted_by(self.duration)
    }

    /// Check the settings and build the initial state.
    pub fn validate(&self) -> CliResult<SpacecraftState> {
        if !self.duration.is_finite() {
            return Err(CliError::Invalid(format!("duration must be finite, got {}", self.duration)));
        }
        if !(self.output_step.is_finite() && self.output_step > 0.0) {
            return Err(CliError::Invalid(format!(
                "output_step must be positive, got {}",
                self.output_step
            )));
        }
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(CliError::Invalid(format!("mass must be positive, got {}", self.mass)));
        }
        if self.stm && self.orbit_type != OrbitType::Cartesian {
            return Err(CliError::Invalid(
                "the state transition matrix needs orbit_type: cartesian".to_string(),
            ));
        }
        let orbit = Orbit::from_cartesian(
            Vector3::from(self.position),
            Vector3::from(self.velocity),
            Frame::gcrf(),
            self.start_date(),
            self.mu,
        )?;
        let mut state = SpacecraftState::from_orbit(orbit, self.attitude_provider().as_ref(), self.mass);
        if self.stm {
            state = state.with_additional_state(STM_NAME, StateTransitionGenerator::initial_value());
        }
        Ok(state)
    }

    fn attitude_provider(&self) -> Rc<dyn AttitudeProvider> {
        match self.attitude {
            AttitudeMode::Inertial => Rc::new(InertialProvider::default()),
            AttitudeMode::Lvlh => Rc::new(LvlhProvider),
        }
    }

    pub fn build_propagator(&self) -> CliResult<IntegratedPropagator> {
        let initial = self.validate()?;
        let mut propagator = match &self.integrator {
            IntegratorSpec::DormandPrince(config) => IntegratedPropagator::new(
                DormandPrinceIntegrator::new(config.clone())?,
                KeplerianMotion,
            ),
            IntegratorSpec::RungeKutta { step } => {
                IntegratedPropagator::new(ClassicalRungeKuttaIntegrator::new(*step)?, KeplerianMotion)
            }
        };
        propagator.set_mu(self.mu);
        propagator.set_orbit_type(self.orbit_type, self.position_angle);
        propagator.set_attitude_provider(self.attitude_provider());
        if self.stm {
            propagator.add_generator(Rc::new(RefCell::new(StateTransitionGenerator::new(STM_NAME))))?;
        }
        propagator.set_initial_state(initial);
        Ok(propagator)
    }
}

/// One sampled state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StateRecord {
    pub date: String,
    pub elapsed: f64,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    pub mass: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stm_determinant: Option<f64>,
}

impl StateRecord {
    fn new(state: &SpacecraftState, start: AbsoluteDate) -> CliResult<Self> {
        let stm_determinant = if state.has_additional_state(STM_NAME) {
            Some(state_transition_matrix(state, STM_NAME)?.determinant())
        } else {
            None
        };
        Ok(Self {
            date: state.date().to_string(),
            elapsed: state.date().duration_from(&start),
            position: (*state.orbit().position()).into(),
            velocity: (*state.orbit().velocity()).into(),
            mass: state.mass(),
            stm_determinant,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub integrator: String,
    pub evaluations: usize,
    pub steps: usize,
    pub samples: Vec<StateRecord>,
    pub final_state: StateRecord,
}

/// Propagate the scenario and sample the generated ephemeris every `output_step` seconds.
pub fn run(scenario: &Scenario) -> CliResult<Report> {
    let mut propagator = scenario.build_propagator()?;
    let start = scenario.start_date();
    let generator = propagator.ephemeris_generator();
    let final_state = propagator.propagate_to(scenario.end_date())?;
    info!(
        integrator = propagator.integrator().name(),
        evaluations = propagator.calls(),
        "propagation finished"
    );

    let mut samples = Vec::new();
    let mut steps = 0;
    if let Some(ephemeris) = generator.generated_ephemeris() {
        steps = ephemeris.number_of_steps();
        let direction = scenario.duration.signum();
        let count = (scenario.duration.abs() / scenario.output_step).floor() as usize;
        for k in 0..=count {
            let date = start.shifted_by(direction * k as f64 * scenario.output_step);
            if date < ephemeris.min_date() || date > ephemeris.max_date() {
                continue;
            }
            samples.push(StateRecord::new(&ephemeris.propagate(date)?, start)?);
        }
    }

    Ok(Report {
        integrator: propagator.integrator().name().to_string(),
        evaluations: propagator.calls(),
        steps,
        samples,
        final_state: StateRecord::new(&final_state, start)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEO: &str = include_str!("../../../demos/leo.yaml");

    #[test]
    fn demo_scenario_parses() {
        let scenario = Scenario::from_yaml_str(LEO).expect("demo parses");
        assert_eq!(scenario.mass, 850.0);
        assert_eq!(scenario.mu, EARTH_MU);
        assert_eq!(scenario.attitude, AttitudeMode::Lvlh);
        assert!(scenario.stm);
        let IntegratorSpec::DormandPrince(config) = &scenario.integrator else {
            panic!("expected Dormand-Prince, got {:?}", scenario.integrator);
        };
        assert_eq!(config.max_step, 300.0);
        assert_eq!(config.safety, DormandPrinceConfig::default().safety);
    }

    #[test]
    fn defaults_apply() {
        let yaml = "epoch: 2024-03-01T00:00:00Z\nposition: [7.0e6, 0, 0]\nvelocity: [0, 7546.0, 0]\nduration: 120\n";
        let scenario = Scenario::from_yaml_str(yaml).expect("minimal scenario parses");
        assert_eq!(scenario.mass, SpacecraftState::DEFAULT_MASS);
        assert_eq!(scenario.orbit_type, OrbitType::Cartesian);
        assert_eq!(scenario.integrator, IntegratorSpec::default());
        assert!(!scenario.stm);
    }

    #[test]
    fn invalid_settings_are_reported() {
        let mut scenario = Scenario::from_yaml_str(LEO).expect("demo parses");
        scenario.output_step = 0.0;
        assert!(matches!(scenario.validate(), Err(CliError::Invalid(_))));

        let mut scenario = Scenario::from_yaml_str(LEO).expect("demo parses");
        scenario.orbit_type = OrbitType::Keplerian;
        assert!(matches!(scenario.validate(), Err(CliError::Invalid(_))));

        let mut scenario = Scenario::from_yaml_str(LEO).expect("demo parses");
        scenario.mu = -1.0;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn runge_kutta_run_samples_both_ends() {
        let yaml = "\
epoch: 2024-03-01T00:00:00Z
position: [7.0e6, 0, 0]
velocity: [0, 7546.0, 0]
duration: -600
output_step: 200
integrator:
  kind: runge_kutta
  step: 10.0
";
        let scenario = Scenario::from_yaml_str(yaml).expect("scenario parses");
        let report = run(&scenario).expect("run succeeds");
        assert_eq!(report.samples.len(), 4);
        assert_eq!(report.samples[0].elapsed, 0.0);
        assert_eq!(report.samples[3].elapsed, -600.0);
        assert_eq!(report.final_state.elapsed, -600.0);
        assert_eq!(report.final_state.stm_determinant, None);
        assert!(report.evaluations > 0);
    }

    #[test]
    fn demo_run_keeps_a_unit_stm_determinant() {
        let scenario = Scenario::from_yaml_str(LEO).expect("demo parses");
        let report = run(&scenario).expect("run succeeds");
        assert_eq!(report.samples.len(), 20);
        let det = report.final_state.stm_determinant.expect("stm propagated");
        assert!((det - 1.0).abs() < 1e-4, "det = {det}");

        let json = serde_json::to_string(&report).expect("report serializes");
        assert!(json.contains("\"final_state\""));
    }
}
