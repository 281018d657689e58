//! Cleanup rules applied after the final engine pass.
//!
//! These share the [`OptimizationRule`] contract so disabling and result
//! recording work the same way as for planning rules, but they run once,
//! right before score calculation. They must be idempotent and must not
//! move appointments between routes or the unassigned pool.

use crate::geo::Coordinate;
use crate::haversine::straight_line_distance;
use crate::rules::{OptimizationRule, ReservedInsideSalesRule, RuleExecutionResult};
use crate::state::OptimizationState;
use crate::time_window::TimeWindow;
use crate::work_event::{WorkEvent, WorkEventId, WorkEventKind};

/// Fills in straight-line distances on travel legs the engine produced
/// without one, so reporting never shows a zero-mile drive.
pub struct RecomputeTravelDistancesRule;

impl OptimizationRule for RecomputeTravelDistancesRule {
    fn id(&self) -> &'static str {
        "recompute_travel_distances"
    }

    fn name(&self) -> &'static str {
        "Recompute travel distances"
    }

    fn description(&self) -> &'static str {
        "Fills zero-distance travel legs with straight-line estimates"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut triggered = false;
        let mut applied = false;
        for route in state.routes_mut() {
            let fills: Vec<(WorkEventId, Coordinate, Coordinate)> = route
                .events()
                .iter()
                .filter_map(|event| match event.kind() {
                    WorkEventKind::Travel {
                        from: Some(from),
                        to: Some(to),
                        distance,
                    } if distance.is_zero() => Some((event.id(), *from, *to)),
                    _ => None,
                })
                .collect();
            triggered |= !fills.is_empty();
            for (id, from, to) in fills {
                if let Some(event) = route.event_mut(id) {
                    applied |= event.set_travel_distance(straight_line_distance(from, to));
                }
            }
        }
        RuleExecutionResult::record(self, triggered, applied)
    }
}

/// Guarantees the inside-sales reservation survived the run. Routes with
/// configured slots but no matching block get one at the end of the day,
/// mirroring the pre-optimization reservation.
pub struct ForceIncludeInsideSalesRule;

impl OptimizationRule for ForceIncludeInsideSalesRule {
    fn id(&self) -> &'static str {
        "force_include_inside_sales"
    }

    fn name(&self) -> &'static str {
        "Force include inside sales"
    }

    fn description(&self) -> &'static str {
        "Restores missing inside-sales reservations at the end of the day"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut triggered = false;
        let mut applied = false;
        for route in state.routes_mut() {
            let slots = route.config().inside_sales_slots;
            if slots == 0 {
                continue;
            }
            triggered = true;
            if has_reserved_block(route.events(), ReservedInsideSalesRule::DESCRIPTION) {
                continue;
            }
            let Some(hours) = route.working_hours() else {
                continue;
            };
            let span =
                chrono::Duration::minutes(ReservedInsideSalesRule::MINUTES_PER_SLOT * slots as i64);
            if let Ok(window) = TimeWindow::new(hours.end_at() - span, hours.end_at()) {
                route.add_event(WorkEvent::reserved_time(
                    Some(ReservedInsideSalesRule::DESCRIPTION.to_string()),
                    Some(window),
                ));
                applied = true;
            }
        }
        RuleExecutionResult::record(self, triggered, applied)
    }
}

/// Blocks out end-of-day paperwork time on routes configured with
/// summary slots, stacked just before any inside-sales reservation.
pub struct RouteSummaryRule;

impl RouteSummaryRule {
    pub const DESCRIPTION: &'static str = "Route summary";
}

impl OptimizationRule for RouteSummaryRule {
    fn id(&self) -> &'static str {
        "route_summary"
    }

    fn name(&self) -> &'static str {
        "Route summary"
    }

    fn description(&self) -> &'static str {
        "Reserves end-of-day time for route summary work"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut triggered = false;
        let mut applied = false;
        for route in state.routes_mut() {
            let summary_slots = route.config().summary_slots;
            if summary_slots == 0 {
                continue;
            }
            triggered = true;
            if has_reserved_block(route.events(), Self::DESCRIPTION) {
                continue;
            }
            let Some(hours) = route.working_hours() else {
                continue;
            };
            let inside_sales_span = chrono::Duration::minutes(
                ReservedInsideSalesRule::MINUTES_PER_SLOT
                    * route.config().inside_sales_slots as i64,
            );
            let summary_span = chrono::Duration::minutes(
                ReservedInsideSalesRule::MINUTES_PER_SLOT * summary_slots as i64,
            );
            let block_end = hours.end_at() - inside_sales_span;
            if let Ok(window) = TimeWindow::new(block_end - summary_span, block_end) {
                route.add_event(WorkEvent::reserved_time(
                    Some(Self::DESCRIPTION.to_string()),
                    Some(window),
                ));
                applied = true;
            }
        }
        RuleExecutionResult::record(self, triggered, applied)
    }
}

/// Clamps every route's working window to the optimization day. Working
/// hours extended by relaxation rules can spill past the day bounds;
/// published schedules must not.
pub struct StaticTimeWindowsRule;

impl OptimizationRule for StaticTimeWindowsRule {
    fn id(&self) -> &'static str {
        "static_time_windows"
    }

    fn name(&self) -> &'static str {
        "Static time windows"
    }

    fn description(&self) -> &'static str {
        "Clamps route working hours to the optimization window"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let bounds = state.time_window();
        let mut triggered = false;
        let mut applied = false;
        for route in state.routes_mut() {
            let Some(hours) = route.working_hours() else {
                continue;
            };
            let Some(clamped) = hours.intersection(&bounds) else {
                continue;
            };
            if clamped != hours {
                triggered = true;
                route.set_time_window(clamped);
                applied = true;
            }
        }
        RuleExecutionResult::record(self, triggered, applied)
    }
}

/// Writes duration predictions onto every appointment: the booked
/// on-site time as the floor, widened 15% at the top under severe
/// weather.
pub struct EstimateAppointmentDurationsRule;

impl EstimateAppointmentDurationsRule {
    const SEVERE_WEATHER_FACTOR: f64 = 1.15;
}

impl OptimizationRule for EstimateAppointmentDurationsRule {
    fn id(&self) -> &'static str {
        "estimate_appointment_durations"
    }

    fn name(&self) -> &'static str {
        "Estimate appointment durations"
    }

    fn description(&self) -> &'static str {
        "Predicts per-appointment duration ranges from booked time and weather"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let severe = state.weather().is_some_and(|weather| weather.is_severe());
        let mut triggered = false;
        let mut applied = false;

        let estimate = |event: &mut WorkEvent, triggered: &mut bool, applied: &mut bool| {
            let Some(appointment) = event.as_appointment_mut() else {
                return;
            };
            *triggered = true;
            let on_site = appointment.on_site_duration();
            let ceiling = if severe {
                on_site.scaled(Self::SEVERE_WEATHER_FACTOR)
            } else {
                on_site
            };
            if appointment.min_predicted_duration != Some(on_site)
                || appointment.max_predicted_duration != Some(ceiling)
            {
                appointment.min_predicted_duration = Some(on_site);
                appointment.max_predicted_duration = Some(ceiling);
                *applied = true;
            }
        };

        for route in state.routes_mut() {
            let ids: Vec<WorkEventId> = route
                .events()
                .iter()
                .filter(|event| event.is_appointment())
                .map(WorkEvent::id)
                .collect();
            for id in ids {
                if let Some(event) = route.event_mut(id) {
                    estimate(event, &mut triggered, &mut applied);
                }
            }
        }
        let mut pool = state.take_unassigned_appointments();
        for event in &mut pool {
            estimate(event, &mut triggered, &mut applied);
        }
        state.set_unassigned_appointments(pool);

        RuleExecutionResult::record(self, triggered, applied)
    }
}

fn has_reserved_block(events: &[WorkEvent], description: &str) -> bool {
    events.iter().any(|event| match event.kind() {
        WorkEventKind::ReservedTime {
            description: Some(existing),
        } => existing == description,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::route::{Route, RouteConfig, RouteId};
    use crate::service_pro::{ServicePro, ServiceProId};
    use crate::state::{Office, OfficeId, OptimizationStateId};
    use crate::units::{Distance, Duration};
    use crate::weather::{WeatherCondition, WeatherInfo};
    use crate::work_event::{Appointment, AppointmentId, CustomerId, WorkEventType};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, hour, minute, 0).unwrap()
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    fn route_with_hours(config: RouteConfig) -> Route {
        let pro = Arc::new(
            ServicePro::new(ServiceProId(1), "Dana")
                .with_skills([crate::service_pro::Skill::new("pest-general")]),
        );
        let mut route = Route::new(
            RouteId(1),
            OfficeId(1),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            pro,
        )
        .with_config(config);
        route.set_time_window(window(at(8, 0), at(17, 0)));
        route
    }

    fn state_with_route(route: Route) -> OptimizationState {
        let mut state = OptimizationState::new(
            OptimizationStateId(1),
            "insertion",
            Office::new(OfficeId(1), "North Branch"),
            window(at(8, 0), at(17, 0)),
        );
        state.add_route(route);
        state
    }

    #[test]
    fn fills_zero_distance_travel_legs() {
        let mut route = route_with_hours(RouteConfig::default());
        route.add_event(WorkEvent::travel(
            Some(Coordinate::new(36.0, -115.0)),
            Some(Coordinate::new(37.0, -115.0)),
            Distance::ZERO,
            Some(window(at(9, 0), at(9, 30))),
        ));
        let mut state = state_with_route(route);

        let result = RecomputeTravelDistancesRule.process(&mut state);

        assert!(result.triggered);
        assert!(result.applied);
        let travel = state.routes()[0]
            .events_of_type(WorkEventType::Travel)
            .next()
            .unwrap();
        let WorkEventKind::Travel { distance, .. } = travel.kind() else {
            panic!("expected travel leg");
        };
        // one degree of latitude is roughly 111 km
        assert!(distance.as_kilometers() > 110.0 && distance.as_kilometers() < 112.5);
    }

    #[test]
    fn restores_missing_inside_sales_block() {
        let route = route_with_hours(RouteConfig::new(2, 0, 0));
        let mut state = state_with_route(route);

        let result = ForceIncludeInsideSalesRule.process(&mut state);

        assert!(result.applied);
        let block = state.routes()[0]
            .events_of_type(WorkEventType::ReservedTime)
            .next()
            .unwrap();
        assert_eq!(block.window().unwrap().start_at(), at(16, 0));
        assert_eq!(block.window().unwrap().end_at(), at(17, 0));
    }

    #[test]
    fn leaves_existing_inside_sales_block_alone() {
        let mut route = route_with_hours(RouteConfig::new(2, 0, 0));
        route.add_event(WorkEvent::reserved_time(
            Some(ReservedInsideSalesRule::DESCRIPTION.to_string()),
            Some(window(at(16, 0), at(17, 0))),
        ));
        let mut state = state_with_route(route);

        let result = ForceIncludeInsideSalesRule.process(&mut state);

        assert!(result.triggered);
        assert!(!result.applied);
        assert_eq!(
            state.routes()[0]
                .events_of_type(WorkEventType::ReservedTime)
                .count(),
            1
        );
    }

    #[test]
    fn summary_block_stacks_before_inside_sales() {
        let mut route = route_with_hours(RouteConfig::new(2, 1, 0));
        route.add_event(WorkEvent::reserved_time(
            Some(ReservedInsideSalesRule::DESCRIPTION.to_string()),
            Some(window(at(16, 0), at(17, 0))),
        ));
        let mut state = state_with_route(route);

        let result = RouteSummaryRule.process(&mut state);

        assert!(result.applied);
        let summary = state.routes()[0]
            .events()
            .iter()
            .find(|event| {
                matches!(
                    event.kind(),
                    WorkEventKind::ReservedTime { description: Some(d) }
                        if d == RouteSummaryRule::DESCRIPTION
                )
            })
            .unwrap();
        assert_eq!(summary.window().unwrap().start_at(), at(15, 30));
        assert_eq!(summary.window().unwrap().end_at(), at(16, 0));
    }

    #[test]
    fn clamps_route_hours_to_the_day() {
        let mut route = route_with_hours(RouteConfig::default());
        route.set_time_window(window(at(7, 0), at(19, 0)));
        let mut state = state_with_route(route);

        let result = StaticTimeWindowsRule.process(&mut state);

        assert!(result.applied);
        let hours = state.routes()[0].working_hours().unwrap();
        assert_eq!(hours.start_at(), at(8, 0));
        assert_eq!(hours.end_at(), at(17, 0));
    }

    #[test]
    fn hours_inside_the_day_are_untouched() {
        let route = route_with_hours(RouteConfig::default());
        let mut state = state_with_route(route);

        let result = StaticTimeWindowsRule.process(&mut state);

        assert!(!result.triggered);
        assert!(!result.applied);
    }

    #[test]
    fn predicts_durations_from_booked_time() {
        let mut route = route_with_hours(RouteConfig::default());
        route.add_event(WorkEvent::appointment(
            Appointment::new(
                AppointmentId(1),
                CustomerId(1),
                Coordinate::new(36.1, -115.1),
                Duration::from_minutes(30),
            ),
            Some(window(at(9, 0), at(9, 30))),
        ));
        let mut state = state_with_route(route);

        let result = EstimateAppointmentDurationsRule.process(&mut state);

        assert!(result.applied);
        let appointment = state.routes()[0].appointments().next().unwrap();
        assert_eq!(
            appointment.min_predicted_duration,
            Some(Duration::from_minutes(30))
        );
        assert_eq!(
            appointment.max_predicted_duration,
            Some(Duration::from_minutes(30))
        );
    }

    #[test]
    fn severe_weather_widens_the_ceiling() {
        let route = route_with_hours(RouteConfig::default());
        let mut state = state_with_route(route);
        state.set_weather(Some(WeatherInfo::new(WeatherCondition::Storm, 18.0, 95.0)));
        state.set_unassigned_appointments(vec![WorkEvent::appointment(
            Appointment::new(
                AppointmentId(1),
                CustomerId(1),
                Coordinate::new(36.1, -115.1),
                Duration::from_minutes(30),
            ),
            None,
        )]);

        let result = EstimateAppointmentDurationsRule.process(&mut state);

        assert!(result.applied);
        let appointment = state.unassigned_appointments()[0].as_appointment().unwrap();
        assert_eq!(
            appointment.min_predicted_duration,
            Some(Duration::from_minutes(30))
        );
        // 30 minutes widened by 15%
        assert_eq!(
            appointment.max_predicted_duration,
            Some(Duration::from_seconds(2_070))
        );
    }
}
