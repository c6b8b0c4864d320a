//! Attitude laws.
//!
//! Attitude is derived from the orbit on demand and never integrated.

use std::fmt;

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use pf_core::AbsoluteDate;

use crate::frames::Frame;
use crate::orbit::Orbit;

/// Orientation of the spacecraft body frame with respect to a reference frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Attitude {
    date: AbsoluteDate,
    frame: Frame,
    /// Rotation from the reference frame to the body frame.
    rotation: UnitQuaternion<f64>,
    /// Angular velocity of the body frame, expressed in the body frame (rad/s).
    spin: Vector3<f64>,
}

impl Attitude {
    pub fn new(
        date: AbsoluteDate,
        frame: Frame,
        rotation: UnitQuaternion<f64>,
        spin: Vector3<f64>,
    ) -> Self {
        Self {
            date,
            frame,
            rotation,
            spin,
        }
    }

    pub fn date(&self) -> AbsoluteDate {
        self.date
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn rotation(&self) -> &UnitQuaternion<f64> {
        &self.rotation
    }

    pub fn spin(&self) -> &Vector3<f64> {
        &self.spin
    }
}

pub trait AttitudeProvider: fmt::Debug {
    fn attitude(&self, orbit: &Orbit, date: AbsoluteDate, frame: &Frame) -> Attitude;
}

/// Fixed orientation with respect to the reference frame.
#[derive(Clone, Debug, PartialEq)]
pub struct InertialProvider {
    rotation: UnitQuaternion<f64>,
}

impl InertialProvider {
    pub fn new(rotation: UnitQuaternion<f64>) -> Self {
        Self { rotation }
    }
}

impl Default for InertialProvider {
    fn default() -> Self {
        Self::new(UnitQuaternion::identity())
    }
}

impl AttitudeProvider for InertialProvider {
    fn attitude(&self, _orbit: &Orbit, date: AbsoluteDate, frame: &Frame) -> Attitude {
        Attitude::new(date, frame.clone(), self.rotation, Vector3::zeros())
    }
}

/// Local vertical, local horizontal pointing.
///
/// Body +Z toward the central body, +Y opposite the orbital momentum, +X
/// completing the triad (along the velocity for circular orbits).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LvlhProvider;

impl AttitudeProvider for LvlhProvider {
    fn attitude(&self, orbit: &Orbit, date: AbsoluteDate, frame: &Frame) -> Attitude {
        let position = orbit.position();
        let momentum = position.cross(orbit.velocity());
        let (Some(z), Some(y)) = (
            (-position).try_normalize(f64::EPSILON),
            (-momentum).try_normalize(f64::EPSILON),
        ) else {
            // radial trajectory: no orbital plane to align with
            return InertialProvider::default().attitude(orbit, date, frame);
        };
        let x = y.cross(&z);

        let matrix = Matrix3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]);
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(matrix));
        let orbital_rate = momentum / position.norm_squared();
        Attitude::new(date, frame.clone(), rotation, rotation * orbital_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::EARTH_MU;

    #[test]
    fn lvlh_points_to_nadir() {
        let orbit = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, 7.5e3, 0.0),
            Frame::gcrf(),
            AbsoluteDate::J2000_EPOCH,
            EARTH_MU,
        )
        .unwrap();
        let attitude = LvlhProvider.attitude(&orbit, orbit.date(), orbit.frame());
        // inertial -X (nadir) maps to body +Z
        let nadir = attitude.rotation() * Vector3::new(-1.0, 0.0, 0.0);
        assert!((nadir - Vector3::z()).norm() < 1e-12);
        let along_track = attitude.rotation() * Vector3::y();
        assert!((along_track - Vector3::x()).norm() < 1e-12);
        assert!((attitude.spin().norm() - 7.5e3 / 7.0e6).abs() < 1e-15);
    }

    #[test]
    fn inertial_is_constant() {
        let orbit = Orbit::from_cartesian(
            Vector3::new(7.0e6, 0.0, 0.0),
            Vector3::new(0.0, 7.5e3, 0.0),
            Frame::gcrf(),
            AbsoluteDate::J2000_EPOCH,
            EARTH_MU,
        )
        .unwrap();
        let attitude = InertialProvider::default().attitude(&orbit, orbit.date(), orbit.frame());
        assert_eq!(attitude.rotation(), &UnitQuaternion::identity());
        assert_eq!(attitude.frame(), &Frame::gcrf());
    }
}
