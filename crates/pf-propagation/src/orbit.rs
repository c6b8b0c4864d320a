//! Orbits and the element sets used as integration variables.
//!
//! An [`Orbit`] is stored as Cartesian position and velocity in a
//! pseudo-inertial frame. Keplerian and equinoctial elements are computed on
//! demand; both are restricted to elliptic orbits.

use std::f64::consts::PI;

use nalgebra::Vector3;
use pf_core::{AbsoluteDate, ensure_all_finite, normalize_angle};
use serde::{Deserialize, Serialize};

use crate::error::{PropagationError, PropagationResult};
use crate::frames::Frame;

/// Earth gravitational parameter (m³/s²).
pub const EARTH_MU: f64 = 3.986_004_415e14;

/// Below this eccentricity (or sine of inclination) Keplerian angles are undefined.
const SINGULARITY_THRESHOLD: f64 = 1e-11;

/// Element set used for the orbital part of the integrated state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbitType {
    /// x, y, z, vx, vy, vz
    #[default]
    Cartesian,
    /// a, e, i, perigee argument, right ascension of ascending node, anomaly
    Keplerian,
    /// a, ex, ey, hx, hy, longitude argument
    Equinoctial,
}

/// Flavour of the anomaly (or longitude argument) in an element set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionAngle {
    Mean,
    Eccentric,
    #[default]
    True,
}

/// Classical elements of an elliptic orbit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KeplerianElements {
    pub a: f64,
    pub e: f64,
    pub i: f64,
    pub perigee_argument: f64,
    pub raan: f64,
    pub true_anomaly: f64,
}

impl KeplerianElements {
    /// Elements from an anomaly of any flavour.
    pub fn new(
        a: f64,
        e: f64,
        i: f64,
        perigee_argument: f64,
        raan: f64,
        anomaly: f64,
        angle: PositionAngle,
    ) -> PropagationResult<Self> {
        ensure_all_finite(&[a, e, i, perigee_argument, raan, anomaly], "Keplerian elements")?;
        if a <= 0.0 || !(0.0..1.0).contains(&e) {
            return Err(PropagationError::NonEllipticOrbit { a, e });
        }
        let true_anomaly = match angle {
            PositionAngle::True => anomaly,
            PositionAngle::Eccentric => eccentric_to_true(anomaly, e),
            PositionAngle::Mean => eccentric_to_true(mean_to_eccentric(anomaly, e)?, e),
        };
        Ok(Self {
            a,
            e,
            i,
            perigee_argument,
            raan,
            true_anomaly,
        })
    }

    pub fn eccentric_anomaly(&self) -> f64 {
        true_to_eccentric(self.true_anomaly, self.e)
    }

    pub fn mean_anomaly(&self) -> f64 {
        let ecc = self.eccentric_anomaly();
        ecc - self.e * ecc.sin()
    }

    pub fn anomaly(&self, angle: PositionAngle) -> f64 {
        match angle {
            PositionAngle::True => self.true_anomaly,
            PositionAngle::Eccentric => self.eccentric_anomaly(),
            PositionAngle::Mean => self.mean_anomaly(),
        }
    }
}

/// Non-singular elements for circular and equatorial orbits.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EquinoctialElements {
    pub a: f64,
    /// e cos(ω + Ω)
    pub ex: f64,
    /// e sin(ω + Ω)
    pub ey: f64,
    /// tan(i/2) cos(Ω)
    pub hx: f64,
    /// tan(i/2) sin(Ω)
    pub hy: f64,
    /// ν + ω + Ω
    pub true_longitude: f64,
}

impl EquinoctialElements {
    pub fn new(
        a: f64,
        ex: f64,
        ey: f64,
        hx: f64,
        hy: f64,
        longitude: f64,
        angle: PositionAngle,
    ) -> PropagationResult<Self> {
        ensure_all_finite(&[a, ex, ey, hx, hy, longitude], "equinoctial elements")?;
        let e = ex.hypot(ey);
        if a <= 0.0 || e >= 1.0 {
            return Err(PropagationError::NonEllipticOrbit { a, e });
        }
        let true_longitude = match angle {
            PositionAngle::True => longitude,
            PositionAngle::Eccentric => eccentric_to_true_longitude(longitude, ex, ey),
            PositionAngle::Mean => {
                eccentric_to_true_longitude(mean_to_eccentric_longitude(longitude, ex, ey)?, ex, ey)
            }
        };
        Ok(Self {
            a,
            ex,
            ey,
            hx,
            hy,
            true_longitude,
        })
    }

    pub fn eccentric_longitude(&self) -> f64 {
        true_to_eccentric_longitude(self.true_longitude, self.ex, self.ey)
    }

    pub fn mean_longitude(&self) -> f64 {
        let le = self.eccentric_longitude();
        le - self.ex * le.sin() + self.ey * le.cos()
    }

    /// Longitude argument of the requested flavour, in `(-pi, pi]` for the
    /// eccentric and mean flavours.
    pub fn longitude(&self, angle: PositionAngle) -> f64 {
        match angle {
            PositionAngle::True => self.true_longitude,
            PositionAngle::Eccentric => normalize_angle(self.eccentric_longitude()),
            PositionAngle::Mean => normalize_angle(self.mean_longitude()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Orbit {
    position: Vector3<f64>,
    velocity: Vector3<f64>,
    /// Known acceleration, kept when the orbit comes out of an integrator.
    acceleration: Option<Vector3<f64>>,
    frame: Frame,
    date: AbsoluteDate,
    mu: f64,
}

impl Orbit {
    pub fn from_cartesian(
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        frame: Frame,
        date: AbsoluteDate,
        mu: f64,
    ) -> PropagationResult<Self> {
        if !frame.is_pseudo_inertial() {
            return Err(PropagationError::NonInertialFrame {
                frame: frame.name().to_string(),
            });
        }
        if !(mu.is_finite() && mu > 0.0) {
            return Err(PropagationError::InvalidGravitationalParameter { mu });
        }
        ensure_all_finite(position.as_slice(), "position")?;
        ensure_all_finite(velocity.as_slice(), "velocity")?;
        Ok(Self {
            position,
            velocity,
            acceleration: None,
            frame,
            date,
            mu,
        })
    }

    pub fn from_keplerian(
        elements: &KeplerianElements,
        frame: Frame,
        date: AbsoluteDate,
        mu: f64,
    ) -> PropagationResult<Self> {
        let KeplerianElements {
            a,
            e,
            i,
            perigee_argument: pa,
            raan,
            true_anomaly: v,
        } = *elements;
        let (s_raan, c_raan) = raan.sin_cos();
        let (s_pa, c_pa) = pa.sin_cos();
        let (s_i, c_i) = i.sin_cos();
        let p_axis = Vector3::new(
            c_raan * c_pa - s_raan * s_pa * c_i,
            s_raan * c_pa + c_raan * s_pa * c_i,
            s_pa * s_i,
        );
        let q_axis = Vector3::new(
            -c_raan * s_pa - s_raan * c_pa * c_i,
            -s_raan * s_pa + c_raan * c_pa * c_i,
            c_pa * s_i,
        );

        let p = a * (1.0 - e * e);
        let (s_v, c_v) = v.sin_cos();
        let r = p / (1.0 + e * c_v);
        let speed = (mu / p).sqrt();
        let position = p_axis * (r * c_v) + q_axis * (r * s_v);
        let velocity = p_axis * (-speed * s_v) + q_axis * (speed * (e + c_v));
        Self::from_cartesian(position, velocity, frame, date, mu)
    }

    pub fn from_equinoctial(
        elements: &EquinoctialElements,
        frame: Frame,
        date: AbsoluteDate,
        mu: f64,
    ) -> PropagationResult<Self> {
        let EquinoctialElements {
            a, ex, ey, hx, hy, ..
        } = *elements;
        let (f, g) = equinoctial_axes(hx, hy);

        let le = elements.eccentric_longitude();
        let (s_le, c_le) = le.sin_cos();
        let beta = 1.0 / (1.0 + (1.0 - ex * ex - ey * ey).sqrt());
        let ex_c_ey_s = ex * c_le + ey * s_le;

        let x = a * ((1.0 - beta * ey * ey) * c_le + beta * ex * ey * s_le - ex);
        let y = a * ((1.0 - beta * ex * ex) * s_le + beta * ex * ey * c_le - ey);
        let factor = (mu / a).sqrt() / (1.0 - ex_c_ey_s);
        let x_dot = factor * (-s_le + beta * ey * ex_c_ey_s);
        let y_dot = factor * (c_le - beta * ex * ex_c_ey_s);

        Self::from_cartesian(f * x + g * y, f * x_dot + g * y_dot, frame, date, mu)
    }

    /// Same orbit with a known acceleration attached.
    pub fn with_acceleration(mut self, acceleration: Vector3<f64>) -> Self {
        self.acceleration = Some(acceleration);
        self
    }

    pub fn position(&self) -> &Vector3<f64> {
        &self.position
    }

    pub fn velocity(&self) -> &Vector3<f64> {
        &self.velocity
    }

    pub fn acceleration(&self) -> Option<&Vector3<f64>> {
        self.acceleration.as_ref()
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn date(&self) -> AbsoluteDate {
        self.date
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Semi-major axis from the vis-viva energy (negative for hyperbolic orbits).
    pub fn semi_major_axis(&self) -> f64 {
        let r = self.position.norm();
        1.0 / (2.0 / r - self.velocity.norm_squared() / self.mu)
    }

    pub fn keplerian_mean_motion(&self) -> f64 {
        (self.mu / self.semi_major_axis().abs().powi(3)).sqrt()
    }

    pub fn keplerian_period(&self) -> PropagationResult<f64> {
        let a = self.semi_major_axis();
        if a <= 0.0 {
            return Err(PropagationError::NonEllipticOrbit {
                a,
                e: self.eccentricity_vector().norm(),
            });
        }
        Ok(2.0 * PI / self.keplerian_mean_motion())
    }

    fn eccentricity_vector(&self) -> Vector3<f64> {
        let r = self.position.norm();
        let v2 = self.velocity.norm_squared();
        let rv = self.position.dot(&self.velocity);
        (self.position * (v2 - self.mu / r) - self.velocity * rv) / self.mu
    }

    fn elliptic_shape(&self) -> PropagationResult<(f64, Vector3<f64>)> {
        let a = self.semi_major_axis();
        let e_vec = self.eccentricity_vector();
        let e = e_vec.norm();
        if a <= 0.0 || e >= 1.0 {
            return Err(PropagationError::NonEllipticOrbit { a, e });
        }
        Ok((a, e_vec))
    }

    pub fn keplerian(&self) -> PropagationResult<KeplerianElements> {
        let (a, e_vec) = self.elliptic_shape()?;
        let e = e_vec.norm();
        if e < SINGULARITY_THRESHOLD {
            return Err(PropagationError::SingularElements {
                representation: "Keplerian",
                what: "circular orbit",
            });
        }
        let h = self.position.cross(&self.velocity);
        let h_norm = h.norm();
        let h_xy = h.x.hypot(h.y);
        if h_xy < SINGULARITY_THRESHOLD * h_norm {
            return Err(PropagationError::SingularElements {
                representation: "Keplerian",
                what: "equatorial orbit",
            });
        }

        let h_hat = h / h_norm;
        let i = h_xy.atan2(h.z);
        let raan = h.x.atan2(-h.y);
        let node = Vector3::new(raan.cos(), raan.sin(), 0.0);
        let perigee_argument = e_vec.dot(&h_hat.cross(&node)).atan2(e_vec.dot(&node));
        let e_hat = e_vec / e;
        let true_anomaly = self
            .position
            .dot(&h_hat.cross(&e_hat))
            .atan2(self.position.dot(&e_hat));

        Ok(KeplerianElements {
            a,
            e,
            i,
            perigee_argument,
            raan,
            true_anomaly,
        })
    }

    pub fn equinoctial(&self) -> PropagationResult<EquinoctialElements> {
        let (a, e_vec) = self.elliptic_shape()?;
        let h = self.position.cross(&self.velocity);
        let h_norm = h.norm();
        let denominator = h_norm + h.z;
        if denominator <= SINGULARITY_THRESHOLD * h_norm {
            return Err(PropagationError::SingularElements {
                representation: "equinoctial",
                what: "retrograde equatorial orbit",
            });
        }
        let hx = -h.y / denominator;
        let hy = h.x / denominator;
        let (f, g) = equinoctial_axes(hx, hy);
        Ok(EquinoctialElements {
            a,
            ex: e_vec.dot(&f),
            ey: e_vec.dot(&g),
            hx,
            hy,
            true_longitude: self.position.dot(&g).atan2(self.position.dot(&f)),
        })
    }
}

/// In-plane axes of the equinoctial frame.
fn equinoctial_axes(hx: f64, hy: f64) -> (Vector3<f64>, Vector3<f64>) {
    let hx2 = hx * hx;
    let hy2 = hy * hy;
    let k = 1.0 / (1.0 + hx2 + hy2);
    let f = Vector3::new((1.0 + hx2 - hy2) * k, 2.0 * hx * hy * k, -2.0 * hy * k);
    let g = Vector3::new(2.0 * hx * hy * k, (1.0 - hx2 + hy2) * k, 2.0 * hx * k);
    (f, g)
}

fn true_to_eccentric(v: f64, e: f64) -> f64 {
    let beta = (1.0 - e * e).sqrt();
    (beta * v.sin()).atan2(e + v.cos())
}

fn eccentric_to_true(ecc: f64, e: f64) -> f64 {
    let beta = (1.0 - e * e).sqrt();
    (beta * ecc.sin()).atan2(ecc.cos() - e)
}

/// Solve Kepler's equation `M = E - e sin E` by Newton iteration.
pub fn mean_to_eccentric(mean: f64, e: f64) -> PropagationResult<f64> {
    let reduced = normalize_angle(mean);
    let mut ecc = if e < 0.8 { reduced } else { PI.copysign(reduced) };
    for _ in 0..50 {
        let f = ecc - e * ecc.sin() - reduced;
        let step = f / (1.0 - e * ecc.cos());
        ecc -= step;
        if step.abs() <= 1e-14 {
            return Ok(ecc + (mean - reduced));
        }
    }
    Err(PropagationError::KeplerNotConverged { mean_anomaly: mean })
}

fn true_to_eccentric_longitude(lv: f64, ex: f64, ey: f64) -> f64 {
    let epsilon = (1.0 - ex * ex - ey * ey).sqrt();
    let (s, c) = lv.sin_cos();
    let num = ey * c - ex * s;
    let den = epsilon + 1.0 + ex * c + ey * s;
    lv + 2.0 * (num / den).atan()
}

fn eccentric_to_true_longitude(le: f64, ex: f64, ey: f64) -> f64 {
    let epsilon = (1.0 - ex * ex - ey * ey).sqrt();
    let (s, c) = le.sin_cos();
    let num = ex * s - ey * c;
    let den = epsilon + 1.0 - ex * c - ey * s;
    le + 2.0 * (num / den).atan()
}

/// Generalized Kepler equation `lM = lE - ex sin lE + ey cos lE`.
fn mean_to_eccentric_longitude(lm: f64, ex: f64, ey: f64) -> PropagationResult<f64> {
    let mut le = lm;
    for _ in 0..50 {
        let (s, c) = le.sin_cos();
        let f = le - ex * s + ey * c - lm;
        let step = f / (1.0 - ex * c - ey * s);
        le -= step;
        if step.abs() <= 1e-14 {
            return Ok(le);
        }
    }
    Err(PropagationError::KeplerNotConverged { mean_anomaly: lm })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_core::{Tolerances, nearly_equal};

    const TOL: Tolerances = Tolerances::new(1e-9, 1e-12);

    fn leo() -> Orbit {
        let elements = KeplerianElements::new(7.0e6, 0.01, 0.9, 0.3, 1.2, 0.5, PositionAngle::True)
            .unwrap();
        Orbit::from_keplerian(&elements, Frame::gcrf(), AbsoluteDate::J2000_EPOCH, EARTH_MU)
            .unwrap()
    }

    #[test]
    fn keplerian_round_trip() {
        let k = leo().keplerian().unwrap();
        assert!(nearly_equal(k.a, 7.0e6, TOL));
        assert!(nearly_equal(k.e, 0.01, TOL));
        assert!(nearly_equal(k.i, 0.9, TOL));
        assert!(nearly_equal(k.perigee_argument, 0.3, TOL));
        assert!(nearly_equal(k.raan, 1.2, TOL));
        assert!(nearly_equal(k.true_anomaly, 0.5, TOL));
    }

    #[test]
    fn equinoctial_matches_keplerian() {
        let orbit = leo();
        let q = orbit.equinoctial().unwrap();
        assert!(nearly_equal(q.ex, 0.01 * 1.5f64.cos(), TOL));
        assert!(nearly_equal(q.ey, 0.01 * 1.5f64.sin(), TOL));
        assert!(nearly_equal(q.hx, 0.45f64.tan() * 1.2f64.cos(), TOL));
        assert!(nearly_equal(q.true_longitude, 2.0, TOL));

        let back =
            Orbit::from_equinoctial(&q, Frame::gcrf(), orbit.date(), orbit.mu()).unwrap();
        assert!((back.position() - orbit.position()).norm() < 1e-6);
        assert!((back.velocity() - orbit.velocity()).norm() < 1e-9);
    }

    #[test]
    fn anomaly_flavours_are_consistent() {
        for angle in [PositionAngle::Mean, PositionAngle::Eccentric] {
            let base =
                KeplerianElements::new(2.4e7, 0.7, 0.3, 0.0, 0.0, 2.0, PositionAngle::True)
                    .unwrap();
            let value = base.anomaly(angle);
            let rebuilt = KeplerianElements::new(2.4e7, 0.7, 0.3, 0.0, 0.0, value, angle).unwrap();
            assert!(nearly_equal(rebuilt.true_anomaly, 2.0, TOL), "{angle:?}");
        }
    }

    #[test]
    fn kepler_equation_keeps_revolutions() {
        let ecc = mean_to_eccentric(4.0 * PI + 0.3, 0.2).unwrap();
        assert!((ecc - 0.2 * ecc.sin() - (4.0 * PI + 0.3)).abs() < 1e-12);
    }

    #[test]
    fn singular_cases_are_reported() {
        let date = AbsoluteDate::J2000_EPOCH;
        let circular_equatorial = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, (EARTH_MU / 7.0e6).sqrt(), 0.0),
            Frame::gcrf(),
            date,
            EARTH_MU,
        )
        .unwrap();
        assert!(matches!(
            circular_equatorial.keplerian(),
            Err(PropagationError::SingularElements { .. })
        ));
        assert!(circular_equatorial.equinoctial().is_ok());

        let retrograde = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, -7.0e3, 0.0),
            Frame::gcrf(),
            date,
            EARTH_MU,
        )
        .unwrap();
        assert!(matches!(
            retrograde.equinoctial(),
            Err(PropagationError::SingularElements { .. })
        ));

        let hyperbolic = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, 2.0e4, 1.0e3),
            Frame::gcrf(),
            date,
            EARTH_MU,
        )
        .unwrap();
        assert!(matches!(
            hyperbolic.keplerian(),
            Err(PropagationError::NonEllipticOrbit { .. })
        ));
    }

    #[test]
    fn rotating_frame_is_rejected() {
        let err = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, 7.5e3, 0.0),
            Frame::itrf(),
            AbsoluteDate::J2000_EPOCH,
            EARTH_MU,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ITRF"));
    }
}
