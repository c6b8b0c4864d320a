//! Reference frames.
//!
//! Only the identity and the inertial character of a frame are modelled;
//! transforms between frames are outside this crate.

use std::borrow::Cow;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Frame {
    name: Cow<'static, str>,
    pseudo_inertial: bool,
}

impl Frame {
    pub fn new(name: impl Into<Cow<'static, str>>, pseudo_inertial: bool) -> Self {
        Self {
            name: name.into(),
            pseudo_inertial,
        }
    }

    /// Geocentric Celestial Reference Frame.
    pub fn gcrf() -> Self {
        Self::new("GCRF", true)
    }

    /// Mean equator and equinox of J2000.0.
    pub fn eme2000() -> Self {
        Self::new("EME2000", true)
    }

    /// International Terrestrial Reference Frame (rotating with the Earth).
    pub fn itrf() -> Self {
        Self::new("ITRF", false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether Newton's laws hold in this frame without fictitious forces.
    pub fn is_pseudo_inertial(&self) -> bool {
        self.pseudo_inertial
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::gcrf()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
