//! Time windows over absolute timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::units::Duration;

/// Raised when a window would end before it starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("time window start {start_at} is after end {end_at}")]
pub struct InvalidTimeWindow {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// A `[start_at, end_at)` interval. Zero-length windows are allowed and mark
/// instants such as a route's departure point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeWindow {
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    ) -> Result<Self, InvalidTimeWindow> {
        if start_at > end_at {
            return Err(InvalidTimeWindow { start_at, end_at });
        }
        Ok(Self { start_at, end_at })
    }

    /// A window covering a single instant.
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self {
            start_at: at,
            end_at: at,
        }
    }

    pub fn start_at(&self) -> DateTime<Utc> {
        self.start_at
    }

    pub fn end_at(&self) -> DateTime<Utc> {
        self.end_at
    }

    /// Overlap of two windows using half-open semantics: windows that merely
    /// touch at a boundary do not intersect.
    pub fn intersection(&self, other: &TimeWindow) -> Option<TimeWindow> {
        let start_at = self.start_at.max(other.start_at);
        let end_at = self.end_at.min(other.end_at);
        if start_at >= end_at {
            return None;
        }
        Some(Self { start_at, end_at })
    }

    /// Whether an instant falls inside the half-open interval.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start_at && at < self.end_at
    }

    pub fn duration(&self) -> Duration {
        let seconds = (self.end_at - self.start_at).num_seconds().max(0) as u64;
        Duration::from_seconds(seconds)
    }

    pub fn minutes(&self) -> u64 {
        self.duration().as_minutes()
    }

    pub fn seconds(&self) -> u64 {
        self.duration().as_seconds()
    }
}
