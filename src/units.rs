//! Scalar quantity wrappers for durations and distances.
//!
//! Both types are immutable: arithmetic returns new values. `decrease`
//! saturates at zero instead of failing, matching how capacity and slack
//! computations consume these quantities.

use serde::{Deserialize, Serialize};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3_600;

const METERS_PER_KILOMETER: f64 = 1_000.0;
const METERS_PER_MILE: f64 = 1_609.344;

/// A length of time, stored as whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Duration {
    seconds: u64,
}

impl Duration {
    pub const ZERO: Duration = Duration { seconds: 0 };

    pub const fn from_seconds(seconds: u64) -> Self {
        Self { seconds }
    }

    pub const fn from_minutes(minutes: u64) -> Self {
        Self {
            seconds: minutes * SECONDS_PER_MINUTE,
        }
    }

    pub const fn from_hours(hours: u64) -> Self {
        Self {
            seconds: hours * SECONDS_PER_HOUR,
        }
    }

    pub fn as_seconds(&self) -> u64 {
        self.seconds
    }

    /// Whole minutes, truncated.
    pub fn as_minutes(&self) -> u64 {
        self.seconds / SECONDS_PER_MINUTE
    }

    pub fn as_minutes_f64(&self) -> f64 {
        self.seconds as f64 / SECONDS_PER_MINUTE as f64
    }

    pub fn as_hours_f64(&self) -> f64 {
        self.seconds as f64 / SECONDS_PER_HOUR as f64
    }

    pub fn increase(&self, other: Duration) -> Duration {
        Duration::from_seconds(self.seconds + other.seconds)
    }

    /// Saturating subtraction: never goes below zero.
    pub fn decrease(&self, other: Duration) -> Duration {
        Duration::from_seconds(self.seconds.saturating_sub(other.seconds))
    }

    /// Multiplies by `factor`, rounding to whole seconds. Negative factors
    /// collapse to zero.
    pub fn scaled(&self, factor: f64) -> Duration {
        Duration::from_seconds((self.seconds as f64 * factor.max(0.0)).round() as u64)
    }

    pub fn is_zero(&self) -> bool {
        self.seconds == 0
    }
}

/// A distance, stored as meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Distance {
    meters: f64,
}

impl Distance {
    pub const ZERO: Distance = Distance { meters: 0.0 };

    pub fn from_meters(meters: f64) -> Self {
        Self { meters }
    }

    pub fn from_kilometers(kilometers: f64) -> Self {
        Self {
            meters: kilometers * METERS_PER_KILOMETER,
        }
    }

    pub fn from_miles(miles: f64) -> Self {
        Self {
            meters: miles * METERS_PER_MILE,
        }
    }

    pub fn as_meters(&self) -> f64 {
        self.meters
    }

    pub fn as_kilometers(&self) -> f64 {
        self.meters / METERS_PER_KILOMETER
    }

    pub fn as_miles(&self) -> f64 {
        self.meters / METERS_PER_MILE
    }

    pub fn increase(&self, other: Distance) -> Distance {
        Distance::from_meters(self.meters + other.meters)
    }

    /// Floors at zero rather than going negative.
    pub fn decrease(&self, other: Distance) -> Distance {
        Distance::from_meters((self.meters - other.meters).max(0.0))
    }

    pub fn is_zero(&self) -> bool {
        self.meters == 0.0
    }
}
