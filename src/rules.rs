//! Business rules applied to an optimization state before and between
//! engine calls.
//!
//! Rules mutate the state in place and report what they did through a
//! [`RuleExecutionResult`]. Identity is a stable string id independent of
//! the type name, so serialized `disabled_rules` configuration survives
//! refactors. Plan rules run before the planning pass, general rules
//! before every optimize pass, additional rules are relaxations applied
//! cumulatively while appointments remain unassigned, and post rules
//! (see `post_rules`) clean up after the final engine pass.

use serde::{Deserialize, Serialize};

use crate::service_pro::Skill;
use crate::state::OptimizationState;
use crate::time_window::TimeWindow;
use crate::units::Duration;
use crate::work_event::{WorkEvent, WorkEventType};

/// A pluggable transformation over the optimization state.
pub trait OptimizationRule: Send + Sync {
    /// Stable identifier used in `disabled_rules` configuration.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Runs the rule. `triggered` in the result means the rule's
    /// conditions were present; `applied` means the state was changed.
    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult;
}

/// Immutable record of one rule invocation, appended to the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleExecutionResult {
    pub rule_id: String,
    pub name: String,
    pub description: String,
    pub triggered: bool,
    pub applied: bool,
}

impl RuleExecutionResult {
    pub fn new(
        rule_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        triggered: bool,
        applied: bool,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            description: description.into(),
            triggered,
            applied,
        }
    }

    pub fn record<R: OptimizationRule + ?Sized>(rule: &R, triggered: bool, applied: bool) -> Self {
        Self::new(rule.id(), rule.name(), rule.description(), triggered, applied)
    }

    /// The record written when a rule is disabled and never invoked.
    pub fn skipped<R: OptimizationRule + ?Sized>(rule: &R) -> Self {
        Self::record(rule, false, false)
    }
}

/// The ordered rule rosters one optimization run works through.
pub struct RulesRegister {
    general_plan_rules: Vec<Box<dyn OptimizationRule>>,
    general_optimization_rules: Vec<Box<dyn OptimizationRule>>,
    additional_optimization_rules: Vec<Box<dyn OptimizationRule>>,
    post_optimization_rules: Vec<Box<dyn OptimizationRule>>,
}

impl RulesRegister {
    /// The production roster, in application order.
    pub fn standard() -> Self {
        Self {
            general_plan_rules: vec![
                Box::new(ClearUnlockedAppointmentsRule),
                Box::new(PrioritizeUnassignedRule),
            ],
            general_optimization_rules: vec![
                Box::new(EnsureRouteLocationsRule),
                Box::new(AddLunchBreaksRule),
                Box::new(ReservedInsideSalesRule),
            ],
            additional_optimization_rules: vec![
                Box::new(IncreaseTravelSpeedRule),
                Box::new(ExtendWorkingHoursRule),
                Box::new(RelaxPreferredProRule),
            ],
            post_optimization_rules: vec![
                Box::new(crate::post_rules::RecomputeTravelDistancesRule),
                Box::new(crate::post_rules::ForceIncludeInsideSalesRule),
                Box::new(crate::post_rules::RouteSummaryRule),
                Box::new(crate::post_rules::StaticTimeWindowsRule),
                Box::new(crate::post_rules::EstimateAppointmentDurationsRule),
            ],
        }
    }

    pub fn empty() -> Self {
        Self {
            general_plan_rules: Vec::new(),
            general_optimization_rules: Vec::new(),
            additional_optimization_rules: Vec::new(),
            post_optimization_rules: Vec::new(),
        }
    }

    pub fn general_plan_rules(&self) -> &[Box<dyn OptimizationRule>] {
        &self.general_plan_rules
    }

    pub fn general_optimization_rules(&self) -> &[Box<dyn OptimizationRule>] {
        &self.general_optimization_rules
    }

    pub fn additional_optimization_rules(&self) -> &[Box<dyn OptimizationRule>] {
        &self.additional_optimization_rules
    }

    pub fn post_optimization_rules(&self) -> &[Box<dyn OptimizationRule>] {
        &self.post_optimization_rules
    }

    pub fn add_general_plan_rule(&mut self, rule: Box<dyn OptimizationRule>) {
        self.general_plan_rules.push(rule);
    }

    pub fn add_general_optimization_rule(&mut self, rule: Box<dyn OptimizationRule>) {
        self.general_optimization_rules.push(rule);
    }

    pub fn add_additional_optimization_rule(&mut self, rule: Box<dyn OptimizationRule>) {
        self.additional_optimization_rules.push(rule);
    }

    pub fn add_post_optimization_rule(&mut self, rule: Box<dyn OptimizationRule>) {
        self.post_optimization_rules.push(rule);
    }
}

impl Default for RulesRegister {
    fn default() -> Self {
        Self::standard()
    }
}

// ==== plan rules ====

/// Pulls every unlocked appointment off its route back into the
/// unassigned pool so planning starts from a clean slate. Locked
/// appointments keep their spot.
pub struct ClearUnlockedAppointmentsRule;

impl OptimizationRule for ClearUnlockedAppointmentsRule {
    fn id(&self) -> &'static str {
        "clear_unlocked_appointments"
    }

    fn name(&self) -> &'static str {
        "Clear unlocked appointments"
    }

    fn description(&self) -> &'static str {
        "Returns unlocked appointments to the unassigned pool before planning"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut released = Vec::new();
        for route in state.routes_mut() {
            released.extend(route.remove_events_where(|event| {
                event
                    .as_appointment()
                    .map(|appointment| !appointment.locked)
                    .unwrap_or(false)
            }));
        }
        let triggered = !released.is_empty();
        if triggered {
            tracing::debug!(count = released.len(), "released appointments for replanning");
            let mut pool = state.take_unassigned_appointments();
            pool.extend(released);
            state.set_unassigned_appointments(pool);
        }
        RuleExecutionResult::record(self, triggered, triggered)
    }
}

/// Boosts the priority of appointments already waiting in the unassigned
/// pool, so the engine places leftovers from earlier runs first.
pub struct PrioritizeUnassignedRule;

impl PrioritizeUnassignedRule {
    const PRIORITY_BOOST: i32 = 10;
}

impl OptimizationRule for PrioritizeUnassignedRule {
    fn id(&self) -> &'static str {
        "prioritize_unassigned"
    }

    fn name(&self) -> &'static str {
        "Prioritize unassigned appointments"
    }

    fn description(&self) -> &'static str {
        "Raises priority of appointments left over from previous runs"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut pool = state.take_unassigned_appointments();
        let triggered = !pool.is_empty();
        for event in &mut pool {
            if let Some(appointment) = event.as_appointment_mut() {
                appointment.priority += Self::PRIORITY_BOOST;
            }
        }
        state.set_unassigned_appointments(pool);
        RuleExecutionResult::record(self, triggered, triggered)
    }
}

// ==== general optimization rules ====

/// Makes sure every route has start and end location events, synthesizing
/// them from the pro's home when missing.
pub struct EnsureRouteLocationsRule;

impl OptimizationRule for EnsureRouteLocationsRule {
    fn id(&self) -> &'static str {
        "ensure_route_locations"
    }

    fn name(&self) -> &'static str {
        "Ensure route locations"
    }

    fn description(&self) -> &'static str {
        "Synthesizes missing start and end location events"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut synthesized = false;
        for route in state.routes_mut() {
            let before = route.events().len();
            route.start_location();
            route.end_location();
            synthesized |= route.events().len() != before;
        }
        RuleExecutionResult::record(self, synthesized, synthesized)
    }
}

/// Gives every long route a lunch break in the middle of the day.
pub struct AddLunchBreaksRule;

impl AddLunchBreaksRule {
    /// Working days at or above this length get a lunch.
    const WORKING_HOURS_THRESHOLD: Duration = Duration::from_hours(6);
    const LUNCH_MINUTES: i64 = 30;
}

impl OptimizationRule for AddLunchBreaksRule {
    fn id(&self) -> &'static str {
        "add_lunch_breaks"
    }

    fn name(&self) -> &'static str {
        "Add lunch breaks"
    }

    fn description(&self) -> &'static str {
        "Schedules a midday lunch on routes with six or more working hours"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut added = false;
        for route in state.routes_mut() {
            let Some(hours) = route.working_hours() else {
                continue;
            };
            if hours.duration() < Self::WORKING_HOURS_THRESHOLD {
                continue;
            }
            if route.has_event_of_type(WorkEventType::Lunch) {
                continue;
            }
            let midday = hours.start_at() + chrono::Duration::seconds(hours.seconds() as i64 / 2);
            let half = chrono::Duration::minutes(Self::LUNCH_MINUTES / 2);
            if let Ok(window) = TimeWindow::new(midday - half, midday + half) {
                route.add_event(WorkEvent::lunch(Some(window)));
                added = true;
            }
        }
        RuleExecutionResult::record(self, added, added)
    }
}

/// Blocks out reserved inside-sales slots at the end of the working day
/// so the engine cannot schedule over them.
pub struct ReservedInsideSalesRule;

impl ReservedInsideSalesRule {
    pub const MINUTES_PER_SLOT: i64 = 30;
    pub const DESCRIPTION: &'static str = "Inside sales reservation";
}

impl OptimizationRule for ReservedInsideSalesRule {
    fn id(&self) -> &'static str {
        "reserved_inside_sales"
    }

    fn name(&self) -> &'static str {
        "Reserve inside sales slots"
    }

    fn description(&self) -> &'static str {
        "Adds reserved time covering inside-sales slots"
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
            if route.has_event_of_type(WorkEventType::ReservedTime) {
                continue;
            }
            let Some(hours) = route.working_hours() else {
                continue;
            };
            let span = chrono::Duration::minutes(Self::MINUTES_PER_SLOT * slots as i64);
            if let Ok(window) = TimeWindow::new(hours.end_at() - span, hours.end_at()) {
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

// ==== additional (relaxation) rules ====

/// Assumes faster driving, shrinking travel estimates so more
/// appointments fit.
pub struct IncreaseTravelSpeedRule;

impl IncreaseTravelSpeedRule {
    const SPEED_STEP: f64 = 1.25;
}

impl OptimizationRule for IncreaseTravelSpeedRule {
    fn id(&self) -> &'static str {
        "increase_travel_speed"
    }

    fn name(&self) -> &'static str {
        "Increase travel speed"
    }

    fn description(&self) -> &'static str {
        "Raises the assumed travel speed to fit more appointments"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        if !state.has_unassigned_appointments() {
            return RuleExecutionResult::record(self, false, false);
        }
        let factor = state.params().travel_speed_factor * Self::SPEED_STEP;
        state.params_mut().travel_speed_factor = factor;
        tracing::debug!(travel_speed_factor = factor, "travel speed raised");
        RuleExecutionResult::record(self, true, true)
    }
}

/// Stretches every route's working window a little further into the
/// evening.
pub struct ExtendWorkingHoursRule;

impl ExtendWorkingHoursRule {
    const EXTENSION_MINUTES: i64 = 30;
}

impl OptimizationRule for ExtendWorkingHoursRule {
    fn id(&self) -> &'static str {
        "extend_working_hours"
    }

    fn name(&self) -> &'static str {
        "Extend working hours"
    }

    fn description(&self) -> &'static str {
        "Extends route working windows by thirty minutes"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        if !state.has_unassigned_appointments() {
            return RuleExecutionResult::record(self, false, false);
        }
        let mut extended = false;
        for route in state.routes_mut() {
            let Some(hours) = route.working_hours() else {
                continue;
            };
            let end = hours.end_at() + chrono::Duration::minutes(Self::EXTENSION_MINUTES);
            if let Ok(window) = TimeWindow::new(hours.start_at(), end) {
                route.set_time_window(window);
                extended = true;
            }
        }
        RuleExecutionResult::record(self, extended, extended)
    }
}

/// Drops preferred-pro pins from unassigned appointments: being served by
/// someone beats not being served at all.
pub struct RelaxPreferredProRule;

impl OptimizationRule for RelaxPreferredProRule {
    fn id(&self) -> &'static str {
        "relax_preferred_pro"
    }

    fn name(&self) -> &'static str {
        "Relax preferred pro"
    }

    fn description(&self) -> &'static str {
        "Removes preferred-pro requirements from unassigned appointments"
    }

    fn process(&self, state: &mut OptimizationState) -> RuleExecutionResult {
        let mut pool = state.take_unassigned_appointments();
        let mut relaxed = false;
        for event in &mut pool {
            let Some(appointment) = event.as_appointment_mut() else {
                continue;
            };
            if appointment.preferred_pro_id.is_none()
                && !appointment.skills.iter().any(Skill::is_personal)
            {
                continue;
            }
            appointment.preferred_pro_id = None;
            appointment.skills.retain(|skill| !skill.is_personal());
            relaxed = true;
        }
        state.set_unassigned_appointments(pool);
        RuleExecutionResult::record(self, relaxed, relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;
    use crate::route::{Route, RouteConfig, RouteId};
    use crate::service_pro::{ServicePro, ServiceProId};
    use crate::state::{Office, OfficeId, OptimizationState, OptimizationStateId};
    use crate::work_event::{Appointment, AppointmentId, CustomerId};
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Arc;

    fn window(start_h: u32, end_h: u32) -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 6, 3, start_h, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 3, end_h, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn state() -> OptimizationState {
        OptimizationState::new(
            OptimizationStateId(1),
            "insertion",
            Office::new(OfficeId(1), "Las Vegas"),
            window(8, 17),
        )
    }

    fn route_with_hours(id: i64, hours: Option<TimeWindow>) -> Route {
        let mut pro = ServicePro::new(ServiceProId(id), format!("Pro {id}"));
        if let Some(hours) = hours {
            pro = pro.with_working_hours(hours);
        }
        Route::new(
            RouteId(id),
            OfficeId(1),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            Arc::new(pro),
        )
    }

    fn appointment(id: i64) -> Appointment {
        Appointment::new(
            AppointmentId(id),
            CustomerId(id),
            Coordinate::new(36.0, -115.0),
            Duration::from_minutes(30),
        )
    }

    // ==== plan rules ====

    #[test]
    fn clear_unlocked_keeps_locked_appointments() {
        let mut state = state();
        let mut route = route_with_hours(1, None);
        route.add_event(WorkEvent::appointment(appointment(1), None));
        route.add_event(WorkEvent::appointment(appointment(2).locked(), None));
        state.add_route(route);

        state.apply_rule(&ClearUnlockedAppointmentsRule);

        assert_eq!(state.routes()[0].appointment_count(), 1);
        assert_eq!(state.unassigned_appointment_count(), 1);
        assert!(state.rule_results()[0].applied);
    }

    #[test]
    fn clear_unlocked_without_appointments_does_not_trigger() {
        let mut state = state();
        state.add_route(route_with_hours(1, None));

        state.apply_rule(&ClearUnlockedAppointmentsRule);

        assert!(!state.rule_results()[0].triggered);
    }

    #[test]
    fn prioritize_unassigned_boosts_priority() {
        let mut state = state();
        state.set_unassigned_appointments(vec![WorkEvent::appointment(
            appointment(1).with_priority(5),
            None,
        )]);

        state.apply_rule(&PrioritizeUnassignedRule);

        let boosted = state.unassigned_appointments()[0].as_appointment().unwrap();
        assert_eq!(boosted.priority, 15);
    }

    // ==== general rules ====

    #[test]
    fn ensure_route_locations_synthesizes_missing_events() {
        let mut state = state();
        let pro = ServicePro::new(ServiceProId(1), "Dana")
            .with_home(Coordinate::new(36.2, -115.2))
            .with_working_hours(window(8, 17));
        state.add_route(Route::new(
            RouteId(1),
            OfficeId(1),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            Arc::new(pro),
        ));

        state.apply_rule(&EnsureRouteLocationsRule);

        let route = &state.routes()[0];
        assert!(route.has_event_of_type(WorkEventType::StartLocation));
        assert!(route.has_event_of_type(WorkEventType::EndLocation));
        assert!(state.rule_results()[0].applied);
    }

    #[test]
    fn lunch_added_on_six_hour_days() {
        let mut state = state();
        state.add_route(route_with_hours(1, Some(window(8, 17))));

        state.apply_rule(&AddLunchBreaksRule);

        let route = &state.routes()[0];
        let lunch = route.events_of_type(WorkEventType::Lunch).next().unwrap();
        let lunch_window = lunch.window().unwrap();
        assert_eq!(lunch_window.minutes(), 30);
        assert_eq!(
            lunch_window.start_at(),
            Utc.with_ymd_and_hms(2024, 6, 3, 12, 15, 0).unwrap()
        );
    }

    #[test]
    fn lunch_skipped_on_short_days() {
        let mut state = state();
        state.add_route(route_with_hours(1, Some(window(8, 12))));

        state.apply_rule(&AddLunchBreaksRule);

        assert!(!state.routes()[0].has_event_of_type(WorkEventType::Lunch));
        assert!(!state.rule_results()[0].triggered);
    }

    #[test]
    fn lunch_not_duplicated() {
        let mut state = state();
        let mut route = route_with_hours(1, Some(window(8, 17)));
        route.add_event(WorkEvent::lunch(None));
        state.add_route(route);

        state.apply_rule(&AddLunchBreaksRule);

        let lunches = state.routes()[0]
            .events_of_type(WorkEventType::Lunch)
            .count();
        assert_eq!(lunches, 1);
    }

    #[test]
    fn inside_sales_slots_reserved_at_end_of_day() {
        let mut state = state();
        let route = route_with_hours(1, Some(window(8, 17))).with_config(RouteConfig::new(2, 0, 0));
        state.add_route(route);

        state.apply_rule(&ReservedInsideSalesRule);

        let route = &state.routes()[0];
        let reserved = route
            .events_of_type(WorkEventType::ReservedTime)
            .next()
            .unwrap();
        let reserved_window = reserved.window().unwrap();
        assert_eq!(reserved_window.minutes(), 60);
        assert_eq!(reserved_window.end_at(), window(8, 17).end_at());
    }

    // ==== additional rules ====

    #[test]
    fn travel_speed_compounds_per_firing() {
        let mut state = state();
        state.set_unassigned_appointments(vec![WorkEvent::appointment(appointment(1), None)]);

        state.apply_rule(&IncreaseTravelSpeedRule);
        state.apply_rule(&IncreaseTravelSpeedRule);

        assert!((state.params().travel_speed_factor - 1.5625).abs() < 1e-9);
    }

    #[test]
    fn travel_speed_untouched_when_nothing_is_unassigned() {
        let mut state = state();
        state.apply_rule(&IncreaseTravelSpeedRule);
        assert!((state.params().travel_speed_factor - 1.0).abs() < 1e-9);
        assert!(!state.rule_results()[0].triggered);
    }

    #[test]
    fn working_hours_extended_by_thirty_minutes() {
        let mut state = state();
        state.add_route(route_with_hours(1, Some(window(8, 17))));
        state.set_unassigned_appointments(vec![WorkEvent::appointment(appointment(1), None)]);

        state.apply_rule(&ExtendWorkingHoursRule);

        let hours = state.routes()[0].working_hours().unwrap();
        assert_eq!(
            hours.end_at(),
            Utc.with_ymd_and_hms(2024, 6, 3, 17, 30, 0).unwrap()
        );
    }

    #[test]
    fn relax_preferred_pro_clears_pins_from_the_pool() {
        let mut state = state();
        let pinned = appointment(1)
            .with_preferred_pro(ServiceProId(9))
            .with_skills(vec![Skill::new("termite"), Skill::personal(ServiceProId(9))]);
        state.set_unassigned_appointments(vec![WorkEvent::appointment(pinned, None)]);

        state.apply_rule(&RelaxPreferredProRule);

        let relaxed = state.unassigned_appointments()[0].as_appointment().unwrap();
        assert!(relaxed.preferred_pro_id.is_none());
        assert_eq!(relaxed.skills, vec![Skill::new("termite")]);
    }

    #[test]
    fn standard_register_order() {
        let register = RulesRegister::standard();
        let plan_ids: Vec<&str> = register.general_plan_rules().iter().map(|r| r.id()).collect();
        assert_eq!(plan_ids, ["clear_unlocked_appointments", "prioritize_unassigned"]);

        let additional_ids: Vec<&str> = register
            .additional_optimization_rules()
            .iter()
            .map(|r| r.id())
            .collect();
        assert_eq!(
            additional_ids,
            ["increase_travel_speed", "extend_working_hours", "relax_preferred_pro"]
        );

        let post_ids: Vec<&str> = register
            .post_optimization_rules()
            .iter()
            .map(|r| r.id())
            .collect();
        assert_eq!(
            post_ids,
            [
                "recompute_travel_distances",
                "force_include_inside_sales",
                "route_summary",
                "static_time_windows",
                "estimate_appointment_durations"
            ]
        );
    }
}
