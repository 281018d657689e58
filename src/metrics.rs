//! Metric calculators and the score calculation service.
//!
//! Each calculator measures one dimension of route quality and produces a
//! [`Metric`] whose score sits in `0..=1`. The service runs every
//! calculator over every route and attaches the results, refusing to
//! score anything when the configured weights together exceed the
//! allowed total.

use thiserror::Error;

use crate::route::Route;
use crate::score::{Metric, MetricKey, Score, Weight};
use crate::state::OptimizationState;
use crate::stats::{RouteStats, RouteStatisticsService};

/// Weights across all calculators may not exceed this total.
pub const MAX_TOTAL_WEIGHT: f64 = 1.0;

const WEIGHT_EPSILON: f64 = 1e-9;

#[derive(Debug, Error)]
#[error("total weight of metrics {total} exceeds the allowed maximum {max}")]
pub struct InvalidTotalWeightOfMetrics {
    pub total: f64,
    pub max: f64,
}

/// One scoring dimension.
pub trait MetricCalculator: Send + Sync {
    fn key(&self) -> MetricKey;

    fn weight(&self) -> Weight;

    fn calculate(&self, route: &Route, stats: &RouteStats) -> Metric;
}

/// Score that grows linearly toward a target value and saturates there.
fn target_score(value: f64, target: f64) -> Score {
    Score::new((value / target).clamp(0.0, 1.0))
}

/// Score that starts perfect and degrades linearly toward a worst value.
fn inverted_score(value: f64, worst: f64) -> Score {
    Score::new(1.0 - (value / worst).clamp(0.0, 1.0))
}

/// Rewards routes that deliver many weighted services.
pub struct TotalWeightedServicesCalculator;

impl TotalWeightedServicesCalculator {
    const TARGET: f64 = 14.0;
}

impl MetricCalculator for TotalWeightedServicesCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::TotalWeightedServices
    }

    fn weight(&self) -> Weight {
        Weight::new(0.20)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let value = stats.weighted_services;
        Metric::new(self.key(), value, self.weight(), target_score(value, Self::TARGET))
    }
}

/// Rewards full working days.
pub struct TotalWorkingHoursCalculator;

impl TotalWorkingHoursCalculator {
    const TARGET_HOURS: f64 = 10.0;
}

impl MetricCalculator for TotalWorkingHoursCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::TotalWorkingHours
    }

    fn weight(&self) -> Weight {
        Weight::new(0.15)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let value = stats.working_time.as_hours_f64();
        Metric::new(
            self.key(),
            value,
            self.weight(),
            target_score(value, Self::TARGET_HOURS),
        )
    }
}

/// Penalizes long gaps between consecutive services.
pub struct AverageTimeBetweenServicesCalculator;

impl AverageTimeBetweenServicesCalculator {
    const WORST_MINUTES: f64 = 60.0;
}

impl MetricCalculator for AverageTimeBetweenServicesCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::AverageTimeBetweenServices
    }

    fn weight(&self) -> Weight {
        Weight::new(0.15)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let value = stats.average_time_between_services.as_minutes_f64();
        Metric::new(
            self.key(),
            value,
            self.weight(),
            inverted_score(value, Self::WORST_MINUTES),
        )
    }
}

/// Penalizes long hops between consecutive services.
pub struct AverageMilesBetweenServicesCalculator;

impl AverageMilesBetweenServicesCalculator {
    const WORST_MILES: f64 = 10.0;
}

impl MetricCalculator for AverageMilesBetweenServicesCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::AverageMilesBetweenServices
    }

    fn weight(&self) -> Weight {
        Weight::new(0.10)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let value = stats.average_distance_between_services.as_miles();
        Metric::new(
            self.key(),
            value,
            self.weight(),
            inverted_score(value, Self::WORST_MILES),
        )
    }
}

/// Rewards a steady service pace over the working day.
pub struct AverageWeightedServicesPerHourCalculator;

impl AverageWeightedServicesPerHourCalculator {
    const TARGET_PER_HOUR: f64 = 1.5;
}

impl MetricCalculator for AverageWeightedServicesPerHourCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::AverageWeightedServicesPerHour
    }

    fn weight(&self) -> Weight {
        Weight::new(0.15)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let hours = stats.working_time.as_hours_f64();
        let value = if hours > 0.0 {
            stats.weighted_services / hours
        } else {
            0.0
        };
        Metric::new(
            self.key(),
            value,
            self.weight(),
            target_score(value, Self::TARGET_PER_HOUR),
        )
    }
}

/// Penalizes time spent behind the wheel.
pub struct TotalDriveTimeCalculator;

impl TotalDriveTimeCalculator {
    const WORST_HOURS: f64 = 3.0;
}

impl MetricCalculator for TotalDriveTimeCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::TotalDriveTime
    }

    fn weight(&self) -> Weight {
        Weight::new(0.15)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let value = stats.drive_time.as_hours_f64();
        Metric::new(
            self.key(),
            value,
            self.weight(),
            inverted_score(value, Self::WORST_HOURS),
        )
    }
}

/// Penalizes miles driven between services.
pub struct TotalDriveMilesCalculator;

impl TotalDriveMilesCalculator {
    const WORST_MILES: f64 = 60.0;
}

impl MetricCalculator for TotalDriveMilesCalculator {
    fn key(&self) -> MetricKey {
        MetricKey::TotalDriveMiles
    }

    fn weight(&self) -> Weight {
        Weight::new(0.10)
    }

    fn calculate(&self, _route: &Route, stats: &RouteStats) -> Metric {
        let value = stats.drive_distance.as_miles();
        Metric::new(
            self.key(),
            value,
            self.weight(),
            inverted_score(value, Self::WORST_MILES),
        )
    }
}

/// Runs every registered calculator over every route in a state.
pub struct RouteOptimizationScoreCalculationService {
    calculators: Vec<Box<dyn MetricCalculator>>,
    route_statistics: RouteStatisticsService,
}

impl RouteOptimizationScoreCalculationService {
    /// The production calculator set; weights sum to exactly 1.0.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(TotalWeightedServicesCalculator),
            Box::new(TotalWorkingHoursCalculator),
            Box::new(AverageTimeBetweenServicesCalculator),
            Box::new(AverageMilesBetweenServicesCalculator),
            Box::new(AverageWeightedServicesPerHourCalculator),
            Box::new(TotalDriveTimeCalculator),
            Box::new(TotalDriveMilesCalculator),
        ])
    }

    pub fn new(calculators: Vec<Box<dyn MetricCalculator>>) -> Self {
        Self {
            calculators,
            route_statistics: RouteStatisticsService::new(),
        }
    }

    /// Attaches every calculator's metric plus the combined score to each
    /// route. Fails before touching any route when the configured weights
    /// exceed [`MAX_TOTAL_WEIGHT`], so no route is ever partially scored.
    pub fn calculate(&self, state: &mut OptimizationState) -> Result<(), InvalidTotalWeightOfMetrics> {
        self.verify_total_weight()?;
        for route in state.routes_mut() {
            let stats = self.route_statistics.stats(route);
            for calculator in &self.calculators {
                let metric = calculator.calculate(route, &stats);
                route.set_metric(metric);
            }
            let score = route.optimization_score();
            route.set_metric(Metric::new(
                MetricKey::OptimizationScore,
                score.value(),
                Weight::new(1.0),
                score,
            ));
        }
        Ok(())
    }

    fn verify_total_weight(&self) -> Result<(), InvalidTotalWeightOfMetrics> {
        let total: f64 = self
            .calculators
            .iter()
            .map(|calculator| calculator.weight().value())
            .sum();
        if total > MAX_TOTAL_WEIGHT + WEIGHT_EPSILON {
            return Err(InvalidTotalWeightOfMetrics {
                total,
                max: MAX_TOTAL_WEIGHT,
            });
        }
        Ok(())
    }
}

impl Default for RouteOptimizationScoreCalculationService {
    fn default() -> Self {
        Self::standard()
    }
}
