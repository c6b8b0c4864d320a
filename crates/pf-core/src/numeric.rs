use crate::CoreError;

/// Floating point type used throughout the propagation stack.
pub type Real = f64;

/// Absolute and relative tolerance pair used for float comparisons.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Tolerances {
    pub const fn new(abs: Real, rel: Real) -> Self {
        Self { abs, rel }
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-12,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// Component-wise [`nearly_equal`] on two slices of equal length.
pub fn all_nearly_equal(a: &[Real], b: &[Real], tol: Tolerances) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| nearly_equal(*x, *y, tol))
}

pub fn ensure_finite(v: Real, what: &'static str) -> Result<Real, CoreError> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(CoreError::NonFinite { what, value: v })
    }
}

/// Check every component of a vector, reporting the first offender.
pub fn ensure_all_finite(values: &[Real], what: &'static str) -> Result<(), CoreError> {
    match values.iter().find(|v| !v.is_finite()) {
        Some(v) => Err(CoreError::NonFinite { what, value: *v }),
        None => Ok(()),
    }
}

/// Bring an angle into `(-pi, pi]`. Angles already in range are returned unchanged.
pub fn normalize_angle(angle: Real) -> Real {
    use std::f64::consts::{PI, TAU};
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = angle - TAU * ((angle + PI) / TAU).floor();
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances::new(1e-12, 1e-9);
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn slices_must_match_in_length() {
        let tol = Tolerances::default();
        assert!(all_nearly_equal(&[1.0, 2.0], &[1.0, 2.0], tol));
        assert!(!all_nearly_equal(&[1.0, 2.0], &[1.0], tol));
    }

    #[test]
    fn ensure_finite_detects_nan() {
        let err = ensure_finite(Real::NAN, "test").unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("Non-finite"));
        assert!(ensure_all_finite(&[1.0, Real::INFINITY], "vec").is_err());
    }

    #[test]
    fn angle_normalization() {
        use std::f64::consts::PI;
        assert_eq!(normalize_angle(1.25), 1.25);
        assert_eq!(normalize_angle(PI), PI);
        assert!((normalize_angle(-PI) - PI).abs() < 1e-15);
        assert!((normalize_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((normalize_angle(-7.0) - (-7.0 + 2.0 * PI)).abs() < 1e-12);
    }
}
