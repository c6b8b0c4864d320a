//! Absolute dates on a uniform time scale.
//!
//! A date is stored as whole seconds since the J2000.0 epoch plus a fractional
//! part in `[0, 1)`. Keeping the two apart preserves sub-microsecond resolution
//! over centuries, which a single `f64` count of seconds cannot.
//!
//! Leap seconds are not modelled: conversions to and from UTC treat the civil
//! calendar as uniform.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{CoreError, CoreResult};

/// Unix timestamp of 2000-01-01T12:00:00Z.
const J2000_UNIX_SECONDS: i64 = 946_728_000;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbsoluteDate {
    /// Whole seconds since J2000.0.
    seconds: i64,
    /// Fraction of second, always in `[0, 1)`.
    offset: f64,
}

impl AbsoluteDate {
    pub const J2000_EPOCH: AbsoluteDate = AbsoluteDate {
        seconds: 0,
        offset: 0.0,
    };

    fn normalized(seconds: i64, offset: f64) -> Self {
        let whole = offset.floor();
        let mut seconds = seconds + whole as i64;
        let mut offset = offset - whole;
        // rounding in `offset - whole` can land exactly on 1.0
        if offset >= 1.0 {
            seconds += 1;
            offset -= 1.0;
        }
        Self { seconds, offset }
    }

    /// Date located `seconds` after J2000.0.
    pub fn from_j2000_seconds(seconds: f64) -> CoreResult<Self> {
        crate::ensure_finite(seconds, "seconds since J2000")?;
        Ok(Self::J2000_EPOCH.shifted_by(seconds))
    }

    /// Date shifted by `dt` seconds. `dt` is expected to be finite.
    pub fn shifted_by(&self, dt: f64) -> Self {
        if dt == 0.0 {
            return *self;
        }
        let whole = dt.trunc();
        Self::normalized(self.seconds + whole as i64, self.offset + (dt - whole))
    }

    /// Signed duration `self - other` in seconds.
    pub fn duration_from(&self, other: &AbsoluteDate) -> f64 {
        (self.seconds - other.seconds) as f64 + (self.offset - other.offset)
    }

    /// Seconds elapsed since J2000.0.
    pub fn j2000_seconds(&self) -> f64 {
        self.duration_from(&Self::J2000_EPOCH)
    }

    pub fn from_utc(date: &DateTime<Utc>) -> Self {
        Self::normalized(
            date.timestamp() - J2000_UNIX_SECONDS,
            f64::from(date.timestamp_subsec_nanos()) * 1e-9,
        )
    }

    pub fn to_utc(&self) -> CoreResult<DateTime<Utc>> {
        let mut seconds = self.seconds + J2000_UNIX_SECONDS;
        let mut nanos = (self.offset * 1e9).round() as u32;
        if nanos >= 1_000_000_000 {
            seconds += 1;
            nanos -= 1_000_000_000;
        }
        DateTime::from_timestamp(seconds, nanos).ok_or(CoreError::DateOutOfRange {
            seconds: self.seconds,
        })
    }

    /// Parse an RFC 3339 timestamp such as `2024-03-01T12:00:00.5Z`.
    pub fn parse_rfc3339(text: &str) -> CoreResult<Self> {
        let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| CoreError::InvalidDate {
            text: text.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_utc(&parsed.with_timezone(&Utc)))
    }
}

impl fmt::Display for AbsoluteDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_utc() {
            Ok(utc) => write!(f, "{}", utc.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Err(_) => write!(f, "J2000{:+}s", self.j2000_seconds()),
        }
    }
}
