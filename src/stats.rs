//! Statistics derived from routes and whole optimization states.
//!
//! Everything here is computed from the event sequences alone, with no
//! external calls, so the same route always yields the same numbers.

use serde::{Deserialize, Serialize};

use crate::route::Route;
use crate::state::OptimizationState;
use crate::time_window::TimeWindow;
use crate::units::{Distance, Duration};
use crate::work_event::{AppointmentCategory, WorkEvent, WorkEventKind};

/// Aggregates for a single route.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouteStats {
    pub total_appointments: usize,
    pub initial_appointments: usize,
    pub regular_appointments: usize,
    pub reservice_appointments: usize,
    /// Appointments weighted by category.
    pub weighted_services: f64,
    /// Time on site across all appointments.
    pub service_time: Duration,
    /// Span from the first windowed event to the last.
    pub working_time: Duration,
    pub break_time: Duration,
    /// Driving between services. Commute legs to the first appointment
    /// and home from the last are excluded.
    pub drive_time: Duration,
    pub drive_distance: Distance,
    pub average_time_between_services: Duration,
    pub average_distance_between_services: Distance,
}

/// Computes [`RouteStats`] from a route's event sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteStatisticsService;

impl RouteStatisticsService {
    pub fn new() -> Self {
        Self
    }

    pub fn stats(&self, route: &Route) -> RouteStats {
        let mut stats = RouteStats::default();

        for appointment in route.appointments() {
            stats.total_appointments += 1;
            match appointment.category {
                AppointmentCategory::Initial => stats.initial_appointments += 1,
                AppointmentCategory::Regular => stats.regular_appointments += 1,
                AppointmentCategory::Reservice => stats.reservice_appointments += 1,
            }
            stats.weighted_services += appointment.category.service_weight();
            stats.service_time = stats.service_time.increase(appointment.on_site_duration());
        }

        stats.working_time = working_span(route.events());
        stats.break_time = route
            .events()
            .iter()
            .filter(|event| event.is_break())
            .filter_map(WorkEvent::window)
            .fold(Duration::ZERO, |total, window| total.increase(window.duration()));

        let (drive_time, drive_distance, legs) = drive_between_services(route.events());
        stats.drive_time = drive_time;
        stats.drive_distance = drive_distance;
        if legs > 0 {
            stats.average_distance_between_services =
                Distance::from_meters(drive_distance.as_meters() / legs as f64);
        }

        stats.average_time_between_services = average_gap_between_services(route.events());
        stats
    }
}

/// Span covered by the route's windowed events.
fn working_span(events: &[WorkEvent]) -> Duration {
    let windows: Vec<&TimeWindow> = events.iter().filter_map(WorkEvent::window).collect();
    let Some(start) = windows.iter().map(|window| window.start_at()).min() else {
        return Duration::ZERO;
    };
    let Some(end) = windows.iter().map(|window| window.end_at()).max() else {
        return Duration::ZERO;
    };
    Duration::from_seconds((end - start).num_seconds().max(0) as u64)
}

/// Travel legs strictly between the first and last appointment. Returns
/// summed time, summed distance, and the number of legs counted.
fn drive_between_services(events: &[WorkEvent]) -> (Duration, Distance, usize) {
    let Some(first) = events.iter().position(WorkEvent::is_appointment) else {
        return (Duration::ZERO, Distance::ZERO, 0);
    };
    let Some(last) = events.iter().rposition(WorkEvent::is_appointment) else {
        return (Duration::ZERO, Distance::ZERO, 0);
    };

    let mut time = Duration::ZERO;
    let mut total_distance = Distance::ZERO;
    let mut legs = 0;
    for event in &events[first..=last] {
        if let WorkEventKind::Travel { distance, .. } = event.kind() {
            if let Some(window) = event.window() {
                time = time.increase(window.duration());
            }
            total_distance = total_distance.increase(*distance);
            legs += 1;
        }
    }
    (time, total_distance, legs)
}

/// Mean gap between consecutive windowed appointments.
fn average_gap_between_services(events: &[WorkEvent]) -> Duration {
    let windows: Vec<&TimeWindow> = events
        .iter()
        .filter(|event| event.is_appointment())
        .filter_map(WorkEvent::window)
        .collect();
    if windows.len() < 2 {
        return Duration::ZERO;
    }
    let total_gap: i64 = windows
        .windows(2)
        .map(|pair| (pair[1].start_at() - pair[0].end_at()).num_seconds().max(0))
        .sum();
    Duration::from_seconds(total_gap as u64 / (windows.len() as u64 - 1))
}

/// Aggregates across every route in a state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OptimizationStateStats {
    pub route_count: usize,
    pub assigned_appointments: usize,
    pub unassigned_appointments: usize,
    pub total_appointments: usize,
    pub weighted_services: f64,
    pub total_service_time: Duration,
    pub total_working_time: Duration,
    pub total_break_time: Duration,
    pub total_drive_time: Duration,
    pub total_drive_distance: Distance,
    /// Weighted services delivered per working hour; zero when no one
    /// worked.
    pub services_per_hour: f64,
    pub average_daily_working_hours: f64,
}

/// Sums [`RouteStats`] across a whole optimization state.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizationStateStatisticsService {
    route_statistics: RouteStatisticsService,
}

impl OptimizationStateStatisticsService {
    pub fn new() -> Self {
        Self {
            route_statistics: RouteStatisticsService::new(),
        }
    }

    pub fn stats(&self, state: &OptimizationState) -> OptimizationStateStats {
        let mut stats = OptimizationStateStats {
            route_count: state.routes().len(),
            unassigned_appointments: state.unassigned_appointment_count(),
            ..OptimizationStateStats::default()
        };

        for route in state.routes() {
            let route_stats = self.route_statistics.stats(route);
            stats.assigned_appointments += route_stats.total_appointments;
            stats.weighted_services += route_stats.weighted_services;
            stats.total_service_time = stats.total_service_time.increase(route_stats.service_time);
            stats.total_working_time = stats.total_working_time.increase(route_stats.working_time);
            stats.total_break_time = stats.total_break_time.increase(route_stats.break_time);
            stats.total_drive_time = stats.total_drive_time.increase(route_stats.drive_time);
            stats.total_drive_distance =
                stats.total_drive_distance.increase(route_stats.drive_distance);
        }
        stats.total_appointments = stats.assigned_appointments + stats.unassigned_appointments;

        let working_hours = stats.total_working_time.as_hours_f64();
        if working_hours > 0.0 {
            stats.services_per_hour = stats.weighted_services / working_hours;
        }
        if stats.route_count > 0 {
            stats.average_daily_working_hours = working_hours / stats.route_count as f64;
        }
        stats
    }
}
