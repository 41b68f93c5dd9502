//! Fixed-point timestamps at centisecond precision.
//!
//! Every offset and duration in the shuffle pipeline is a [`Timestamp`]. Durations
//! are always the exact difference of two timestamps, so hundreds of segments can
//! be cut and re-joined without accumulating rounding drift.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::ShuffleError;

const CENTIS_PER_SECOND: u64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub const fn from_centis(centis: u64) -> Self {
        Self(centis)
    }

    #[cfg(test)]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * CENTIS_PER_SECOND)
    }

    /// Round a floating point second count to the nearest centisecond.
    /// Values that do not fit in `u64` centiseconds are rejected.
    pub fn from_secs_f64(secs: f64) -> Result<Self, ShuffleError> {
        let centis = (secs * CENTIS_PER_SECOND as f64).round();
        if !centis.is_finite() || secs < 0.0 || centis >= u64::MAX as f64 {
            return Err(ShuffleError::InvalidTimestamp(secs.to_string()));
        }
        Ok(Self(centis as u64))
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / CENTIS_PER_SECOND as f64
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: Timestamp) -> Timestamp {
        Timestamp(self.0.saturating_sub(other.0))
    }
}

impl Add for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl AddAssign for Timestamp {
    fn add_assign(&mut self, rhs: Timestamp) {
        self.0 += rhs.0;
    }
}

/// Callers must know `self >= rhs`; use [`Timestamp::saturating_sub`] otherwise.
impl Sub for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Timestamp) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.0 / CENTIS_PER_SECOND,
            self.0 % CENTIS_PER_SECOND
        )
    }
}

impl FromStr for Timestamp {
    type Err = ShuffleError;

    /// Parses decimal seconds (`7`, `12.5`, `1.625`). Digits past the
    /// second decimal place are rounded half-up.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || ShuffleError::InvalidTimestamp(value.to_string());
        let trimmed = value.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole_secs: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };

        let mut digits = fraction.bytes().map(|b| u64::from(b - b'0'));
        let tenths = digits.next().unwrap_or(0);
        let hundredths = digits.next().unwrap_or(0);
        let round_up = digits.next().is_some_and(|d| d >= 5);

        let centis = whole_secs
            .checked_mul(CENTIS_PER_SECOND)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + u64::from(round_up)))
            .ok_or_else(invalid)?;
        Ok(Timestamp(centis))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Timestamp::from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
