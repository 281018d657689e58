//! The aggregate root for one optimization run: every route, every
//! unassigned appointment, and the record of what the rules did.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::route::{Route, RouteId};
use crate::rules::{OptimizationRule, RuleExecutionResult};
use crate::score::{MetricKey, Score};
use crate::time_window::TimeWindow;
use crate::weather::WeatherInfo;
use crate::work_event::WorkEvent;

/// Source-system office id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OfficeId(pub i64);

impl OfficeId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OfficeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The branch whose routes are being planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub id: OfficeId,
    pub name: String,
    pub location: Option<Coordinate>,
}

impl Office {
    pub fn new(id: OfficeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: None,
        }
    }

    pub fn with_location(mut self, location: Coordinate) -> Self {
        self.location = Some(location);
        self
    }
}

/// Identity of one persisted optimization snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OptimizationStateId(pub i64);

impl OptimizationStateId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OptimizationStateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage the state last completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OptimizationStatus {
    /// Fresh from source data, untouched.
    #[default]
    Pre,
    /// Planning rules and the engine's plan pass have run.
    Plan,
    /// Fully optimized, scored, and post-processed.
    Post,
}

impl OptimizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationStatus::Pre => "pre",
            OptimizationStatus::Plan => "plan",
            OptimizationStatus::Post => "post",
        }
    }
}

/// Run-level switches and knobs, carried with the state so every rule and
/// engine sees the same configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationParams {
    /// What-if run: results are scored but never persisted to source.
    pub simulation_run: bool,
    /// Persist the planned stage as its own snapshot.
    pub build_planned_optimization: bool,
    /// Final run of the day; relaxation rules may act more aggressively.
    pub last_optimization_run: bool,
    /// Stable string ids of rules to skip this run.
    pub disabled_rules: Vec<String>,
    /// Assumed driving-speed multiplier. Travel durations are divided by
    /// it, so relaxation rules raise it to squeeze more work into a day.
    pub travel_speed_factor: f64,
}

impl Default for OptimizationParams {
    fn default() -> Self {
        Self {
            simulation_run: false,
            build_planned_optimization: false,
            last_optimization_run: false,
            disabled_rules: Vec::new(),
            travel_speed_factor: 1.0,
        }
    }
}

impl OptimizationParams {
    pub fn is_rule_disabled(&self, rule_id: &str) -> bool {
        self.disabled_rules.iter().any(|id| id == rule_id)
    }
}

/// One optimization run's complete working state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationState {
    id: OptimizationStateId,
    /// Identifier of the routing engine this run is bound to.
    engine: String,
    status: OptimizationStatus,
    created_at: DateTime<Utc>,
    office: Office,
    /// The span of the day being planned.
    time_window: TimeWindow,
    params: OptimizationParams,
    routes: Vec<Route>,
    /// Appointment events waiting for a route, sorted by expected start.
    unassigned_appointments: Vec<WorkEvent>,
    rule_results: Vec<RuleExecutionResult>,
    /// Lineage: the snapshot this one was derived from.
    previous_state_id: Option<OptimizationStateId>,
    traffic_consideration: Option<bool>,
    weather: Option<WeatherInfo>,
}

impl OptimizationState {
    pub fn new(
        id: OptimizationStateId,
        engine: impl Into<String>,
        office: Office,
        time_window: TimeWindow,
    ) -> Self {
        Self {
            id,
            engine: engine.into(),
            status: OptimizationStatus::default(),
            created_at: Utc::now(),
            office,
            time_window,
            params: OptimizationParams::default(),
            routes: Vec::new(),
            unassigned_appointments: Vec::new(),
            rule_results: Vec::new(),
            previous_state_id: None,
            traffic_consideration: None,
            weather: None,
        }
    }

    pub fn with_params(mut self, params: OptimizationParams) -> Self {
        self.params = params;
        self
    }

    pub fn id(&self) -> OptimizationStateId {
        self.id
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    pub fn status(&self) -> OptimizationStatus {
        self.status
    }

    pub fn set_status(&mut self, status: OptimizationStatus) {
        self.status = status;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn office(&self) -> &Office {
        &self.office
    }

    pub fn time_window(&self) -> TimeWindow {
        self.time_window
    }

    pub fn params(&self) -> &OptimizationParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut OptimizationParams {
        &mut self.params
    }

    pub fn previous_state_id(&self) -> Option<OptimizationStateId> {
        self.previous_state_id
    }

    pub fn set_previous_state_id(&mut self, id: Option<OptimizationStateId>) {
        self.previous_state_id = id;
    }

    pub fn traffic_consideration(&self) -> Option<bool> {
        self.traffic_consideration
    }

    pub fn set_traffic_consideration(&mut self, traffic: Option<bool>) {
        self.traffic_consideration = traffic;
    }

    pub fn weather(&self) -> Option<&WeatherInfo> {
        self.weather.as_ref()
    }

    pub fn set_weather(&mut self, weather: Option<WeatherInfo>) {
        self.weather = weather;
    }

    // ==== routes ====

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn routes_mut(&mut self) -> &mut [Route] {
        &mut self.routes
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.iter().find(|route| route.id() == id)
    }

    pub fn route_mut(&mut self, id: RouteId) -> Option<&mut Route> {
        self.routes.iter_mut().find(|route| route.id() == id)
    }

    pub fn add_route(&mut self, route: Route) {
        self.routes.push(route);
    }

    pub fn set_routes(&mut self, routes: Vec<Route>) {
        self.routes = routes;
    }

    /// Replaces the stored route with this one's id by removing the old
    /// entry and appending the new, so the route moves to the back of the
    /// collection. Unknown ids are appended as new routes.
    pub fn update_route(&mut self, route: Route) {
        self.routes.retain(|existing| existing.id() != route.id());
        self.routes.push(route);
    }

    // ==== unassigned appointments ====

    pub fn unassigned_appointments(&self) -> &[WorkEvent] {
        &self.unassigned_appointments
    }

    /// Replaces the pool, re-sorting by expected start time. Events in the
    /// pool belong to no route.
    pub fn set_unassigned_appointments(&mut self, mut events: Vec<WorkEvent>) {
        for event in &mut events {
            event.set_route_id(None);
        }
        events.sort_by_key(|event| event.window().map(|window| window.start_at()));
        self.unassigned_appointments = events;
    }

    pub fn add_unassigned_appointment(&mut self, mut event: WorkEvent) {
        event.set_route_id(None);
        self.unassigned_appointments.push(event);
        self.unassigned_appointments
            .sort_by_key(|event| event.window().map(|window| window.start_at()));
    }

    /// Empties the pool, handing the events to the caller. Engines take
    /// the pool this way before re-assigning.
    pub fn take_unassigned_appointments(&mut self) -> Vec<WorkEvent> {
        std::mem::take(&mut self.unassigned_appointments)
    }

    pub fn has_unassigned_appointments(&self) -> bool {
        !self.unassigned_appointments.is_empty()
    }

    pub fn unassigned_appointment_count(&self) -> usize {
        self.unassigned_appointments.len()
    }

    pub fn assigned_appointment_count(&self) -> usize {
        self.routes.iter().map(Route::appointment_count).sum()
    }

    // ==== derived values ====

    /// Arithmetic center of every appointment in the run, assigned or
    /// not; `None` when the run has no appointments at all. Callers such
    /// as weather lookup treat `None` as "skip".
    pub fn area_central_point(&self) -> Option<Coordinate> {
        let mut locations: Vec<Coordinate> = Vec::new();
        for route in &self.routes {
            locations.extend(route.appointments().map(|appointment| appointment.location));
        }
        locations.extend(
            self.unassigned_appointments
                .iter()
                .filter_map(WorkEvent::as_appointment)
                .map(|appointment| appointment.location),
        );
        Coordinate::centroid(&locations)
    }

    /// Per-key score averages across routes that actually carry work.
    ///
    /// Only routes with at least one appointment qualify, and the first
    /// qualifying route decides which keys are averaged. Empty when no
    /// route qualifies or that first route has no metrics yet.
    pub fn average_scores(&self) -> BTreeMap<MetricKey, Score> {
        let mut averages = BTreeMap::new();
        let qualifying: Vec<&Route> = self
            .routes
            .iter()
            .filter(|route| route.appointment_count() > 0)
            .collect();
        let Some(first) = qualifying.first() else {
            return averages;
        };
        if first.metrics().is_empty() {
            return averages;
        }

        let count = qualifying.len() as f64;
        for key in first.metrics().keys().copied() {
            if key == MetricKey::OptimizationScore {
                continue;
            }
            let total: f64 = qualifying
                .iter()
                .map(|route| {
                    route
                        .metric(key)
                        .map(|metric| metric.score().value())
                        .unwrap_or(0.0)
                })
                .sum();
            averages.insert(key, Score::new(total / count));
        }

        let overall: f64 = qualifying
            .iter()
            .map(|route| route.optimization_score().value())
            .sum();
        averages.insert(MetricKey::OptimizationScore, Score::new(overall / count));
        averages
    }

    // ==== rules ====

    pub fn rule_results(&self) -> &[RuleExecutionResult] {
        &self.rule_results
    }

    /// Runs one rule against this state, or records a skip if the rule is
    /// disabled by id in the params.
    pub fn apply_rule(&mut self, rule: &dyn OptimizationRule) {
        if self.params.is_rule_disabled(rule.id()) {
            tracing::debug!(rule = rule.id(), "rule disabled, skipping");
            self.rule_results.push(RuleExecutionResult::skipped(rule));
            return;
        }
        let result = rule.process(self);
        tracing::debug!(
            rule = rule.id(),
            triggered = result.triggered,
            applied = result.applied,
            "rule processed"
        );
        self.rule_results.push(result);
    }
}
