//! Conversion between spacecraft states and flat integration vectors.
//!
//! The primary block always has [`BASIC_DIMENSION`] components: six orbital
//! elements in the configured [`OrbitType`] followed by the mass. Time is
//! counted in seconds from the mapper's reference date.

use std::rc::Rc;

use nalgebra::Vector3;
use pf_core::AbsoluteDate;
use serde::{Deserialize, Serialize};

use crate::attitude::{AttitudeProvider, InertialProvider};
use crate::error::{PropagationError, PropagationResult};
use crate::frames::Frame;
use crate::orbit::{EquinoctialElements, KeplerianElements, Orbit, OrbitType, PositionAngle};
use crate::state::SpacecraftState;

/// Size of the primary block.
pub const BASIC_DIMENSION: usize = 7;

/// Mean or osculating elements. Numerical propagation only produces osculating states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationType {
    Mean,
    #[default]
    Osculating,
}

/// Immutable converter between [`SpacecraftState`] and arrays.
///
/// Changing a parameter builds a new mapper; states built by an older mapper
/// carry their own date and stay valid.
#[derive(Clone, Debug)]
pub struct StateMapper {
    reference_date: AbsoluteDate,
    mu: f64,
    orbit_type: OrbitType,
    position_angle: PositionAngle,
    attitude_provider: Rc<dyn AttitudeProvider>,
    frame: Frame,
}

impl Default for StateMapper {
    /// Mapper with an unset (NaN) gravitational parameter, filled in from the
    /// first initial state.
    fn default() -> Self {
        Self {
            reference_date: AbsoluteDate::J2000_EPOCH,
            mu: f64::NAN,
            orbit_type: OrbitType::default(),
            position_angle: PositionAngle::default(),
            attitude_provider: Rc::new(InertialProvider::default()),
            frame: Frame::default(),
        }
    }
}

impl StateMapper {
    pub fn new(
        reference_date: AbsoluteDate,
        mu: f64,
        orbit_type: OrbitType,
        position_angle: PositionAngle,
        attitude_provider: Rc<dyn AttitudeProvider>,
        frame: Frame,
    ) -> Self {
        Self {
            reference_date,
            mu,
            orbit_type,
            position_angle,
            attitude_provider,
            frame,
        }
    }

    pub fn with_reference_date(&self, reference_date: AbsoluteDate) -> Self {
        Self {
            reference_date,
            ..self.clone()
        }
    }

    pub fn with_mu(&self, mu: f64) -> Self {
        Self { mu, ..self.clone() }
    }

    pub fn with_orbit_type(&self, orbit_type: OrbitType, position_angle: PositionAngle) -> Self {
        Self {
            orbit_type,
            position_angle,
            ..self.clone()
        }
    }

    pub fn with_attitude_provider(&self, attitude_provider: Rc<dyn AttitudeProvider>) -> Self {
        Self {
            attitude_provider,
            ..self.clone()
        }
    }

    pub fn with_frame(&self, frame: Frame) -> Self {
        Self {
            frame,
            ..self.clone()
        }
    }

    pub fn reference_date(&self) -> AbsoluteDate {
        self.reference_date
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn orbit_type(&self) -> OrbitType {
        self.orbit_type
    }

    pub fn position_angle(&self) -> PositionAngle {
        self.position_angle
    }

    pub fn attitude_provider(&self) -> &Rc<dyn AttitudeProvider> {
        &self.attitude_provider
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn map_date_to_double(&self, date: AbsoluteDate) -> f64 {
        date.duration_from(&self.reference_date)
    }

    pub fn map_double_to_date(&self, t: f64) -> AbsoluteDate {
        self.reference_date.shifted_by(t)
    }

    /// Like [`map_double_to_date`](Self::map_double_to_date) but returns
    /// `date` itself when `t` is exactly its offset.
    pub fn map_double_to_date_near(&self, t: f64, date: AbsoluteDate) -> AbsoluteDate {
        if t == self.map_date_to_double(date) {
            date
        } else {
            self.map_double_to_date(t)
        }
    }

    /// Primary block of `state`, with its derivative when the orbit carries
    /// an acceleration and the elements are Cartesian.
    ///
    /// The mass rate is not part of a state and is reported as zero.
    pub fn state_to_array(
        &self,
        state: &SpacecraftState,
    ) -> PropagationResult<(Vec<f64>, Option<Vec<f64>>)> {
        let orbit = state.orbit();
        let mut primary = match self.orbit_type {
            OrbitType::Cartesian => {
                let (p, v) = (orbit.position(), orbit.velocity());
                vec![p.x, p.y, p.z, v.x, v.y, v.z]
            }
            OrbitType::Keplerian => {
                let k = orbit.keplerian()?;
                vec![
                    k.a,
                    k.e,
                    k.i,
                    k.perigee_argument,
                    k.raan,
                    k.anomaly(self.position_angle),
                ]
            }
            OrbitType::Equinoctial => {
                let q = orbit.equinoctial()?;
                vec![q.a, q.ex, q.ey, q.hx, q.hy, q.longitude(self.position_angle)]
            }
        };
        primary.push(state.mass());

        let derivative = match (self.orbit_type, orbit.acceleration()) {
            (OrbitType::Cartesian, Some(a)) => {
                let v = orbit.velocity();
                Some(vec![v.x, v.y, v.z, a.x, a.y, a.z, 0.0])
            }
            _ => None,
        };
        Ok((primary, derivative))
    }

    pub fn array_to_state(
        &self,
        t: f64,
        primary: &[f64],
        primary_dot: Option<&[f64]>,
        propagation_type: PropagationType,
    ) -> PropagationResult<SpacecraftState> {
        self.array_to_state_at(self.map_double_to_date(t), primary, primary_dot, propagation_type)
    }

    /// Inverse of [`state_to_array`](Self::state_to_array) at an explicit date.
    pub fn array_to_state_at(
        &self,
        date: AbsoluteDate,
        primary: &[f64],
        primary_dot: Option<&[f64]>,
        _propagation_type: PropagationType,
    ) -> PropagationResult<SpacecraftState> {
        if primary.len() != BASIC_DIMENSION {
            return Err(PropagationError::DimensionMismatch {
                what: "primary state",
                expected: BASIC_DIMENSION,
                actual: primary.len(),
            });
        }
        let p = primary;
        let frame = self.frame.clone();
        let orbit = match self.orbit_type {
            OrbitType::Cartesian => {
                let orbit = Orbit::from_cartesian(
                    Vector3::new(p[0], p[1], p[2]),
                    Vector3::new(p[3], p[4], p[5]),
                    frame,
                    date,
                    self.mu,
                )?;
                match primary_dot {
                    Some(d) if d.len() >= 6 => {
                        orbit.with_acceleration(Vector3::new(d[3], d[4], d[5]))
                    }
                    _ => orbit,
                }
            }
            OrbitType::Keplerian => {
                let k = KeplerianElements::new(p[0], p[1], p[2], p[3], p[4], p[5], self.position_angle)?;
                Orbit::from_keplerian(&k, frame, date, self.mu)?
            }
            OrbitType::Equinoctial => {
                let q =
                    EquinoctialElements::new(p[0], p[1], p[2], p[3], p[4], p[5], self.position_angle)?;
                Orbit::from_equinoctial(&q, frame, date, self.mu)?
            }
        };
        let attitude = self.attitude_provider.attitude(&orbit, date, &self.frame);
        Ok(SpacecraftState::new(orbit, attitude, p[6]))
    }
}
