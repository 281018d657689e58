//! Scores, weights, and the metrics that carry them.
//!
//! A [`Metric`] binds one scoring dimension ([`MetricKey`]) to the raw value
//! measured for a route, the weight its calculator carries in the overall
//! score, and the normalized [`Score`] derived from the value.

use serde::{Deserialize, Serialize};

/// A normalized quality score in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Score(f64);

impl Score {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// A calculator's share of the total route score, clamped to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Weight(f64);

impl Weight {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// The closed set of scoring dimensions.
///
/// `OptimizationScore` is synthetic: calculators never produce it. The score
/// service writes it after the weighted metrics are in, and the combined
/// score computation leaves it out.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum MetricKey {
    TotalWeightedServices,
    TotalWorkingHours,
    AverageTimeBetweenServices,
    AverageMilesBetweenServices,
    AverageWeightedServicesPerHour,
    TotalDriveTime,
    TotalDriveMiles,
    OptimizationScore,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::TotalWeightedServices => "total_weighted_services",
            MetricKey::TotalWorkingHours => "total_working_hours",
            MetricKey::AverageTimeBetweenServices => "average_time_between_services",
            MetricKey::AverageMilesBetweenServices => "average_miles_between_services",
            MetricKey::AverageWeightedServicesPerHour => "average_weighted_services_per_hour",
            MetricKey::TotalDriveTime => "total_drive_time",
            MetricKey::TotalDriveMiles => "total_drive_miles",
            MetricKey::OptimizationScore => "optimization_score",
        }
    }
}

/// One measured, weighted, scored dimension of route quality.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    key: MetricKey,
    value: f64,
    weight: Weight,
    score: Score,
}

impl Metric {
    /// Builds a metric, rounding the score to two decimals so repeated runs
    /// over the same route produce identical persisted values.
    pub fn new(key: MetricKey, value: f64, weight: Weight, score: Score) -> Self {
        let rounded = (score.value() * 100.0).round() / 100.0;
        Self {
            key,
            value,
            weight,
            score: Score::new(rounded),
        }
    }

    pub fn key(&self) -> MetricKey {
        self.key
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn score(&self) -> Score {
        self.score
    }

    /// Score multiplied by the carried weight.
    pub fn weighted_score(&self) -> f64 {
        self.score.value() * self.weight.value()
    }

    /// The weighted score this metric would contribute at a perfect 1.0.
    pub fn max_weighted_score(&self) -> f64 {
        self.weight.value()
    }
}
