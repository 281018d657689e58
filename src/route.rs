//! A single pro's planned day: an ordered event list plus scoring state.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::polyline::Polyline;
use crate::score::{Metric, MetricKey, Score};
use crate::service_pro::ServicePro;
use crate::state::OfficeId;
use crate::time_window::TimeWindow;
use crate::work_event::{Appointment, WorkEvent, WorkEventId, WorkEventType};

/// Source-system route id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteId(pub i64);

impl RouteId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for RouteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the source system sized this route for the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RouteType {
    #[default]
    Regular,
    Extended,
    Short,
}

/// Slots held back from service capacity: same-day inside sales bookings,
/// end-of-day summary time, and scheduled breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RouteConfig {
    pub inside_sales_slots: u32,
    pub summary_slots: u32,
    pub break_slots: u32,
}

impl RouteConfig {
    pub fn new(inside_sales_slots: u32, summary_slots: u32, break_slots: u32) -> Self {
        Self {
            inside_sales_slots,
            summary_slots,
            break_slots,
        }
    }

    pub fn reserved_slots(&self) -> u32 {
        self.inside_sales_slots + self.summary_slots + self.break_slots
    }
}

/// One service pro's route for one day.
///
/// The event list is kept sorted at all times: ascending by window end,
/// then window start, with windowless events first. Events with equal
/// keys keep their insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    id: RouteId,
    office_id: OfficeId,
    date: NaiveDate,
    pro: Arc<ServicePro>,
    route_type: RouteType,
    /// Appointment slots the source system planned for this day, before
    /// reservations come off.
    actual_capacity_count: u32,
    config: RouteConfig,
    /// The route's own working window, seeded from the pro's hours.
    /// Relaxation rules may widen it without touching the shared pro.
    working_hours: Option<TimeWindow>,
    events: Vec<WorkEvent>,
    metrics: BTreeMap<MetricKey, Metric>,
    geometry: Option<Polyline>,
    /// Dispatcher override for the day's capacity.
    capacity_override: Option<u32>,
}

impl Route {
    pub fn new(id: RouteId, office_id: OfficeId, date: NaiveDate, pro: Arc<ServicePro>) -> Self {
        let working_hours = pro.working_hours;
        Self {
            id,
            office_id,
            date,
            pro,
            route_type: RouteType::default(),
            actual_capacity_count: 0,
            config: RouteConfig::default(),
            working_hours,
            events: Vec::new(),
            metrics: BTreeMap::new(),
            geometry: None,
            capacity_override: None,
        }
    }

    pub fn with_route_type(mut self, route_type: RouteType) -> Self {
        self.route_type = route_type;
        self
    }

    pub fn with_actual_capacity(mut self, count: u32) -> Self {
        self.actual_capacity_count = count;
        self
    }

    pub fn with_config(mut self, config: RouteConfig) -> Self {
        self.config = config;
        self
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn office_id(&self) -> OfficeId {
        self.office_id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn pro(&self) -> &Arc<ServicePro> {
        &self.pro
    }

    pub fn route_type(&self) -> RouteType {
        self.route_type
    }

    pub fn config(&self) -> RouteConfig {
        self.config
    }

    pub fn working_hours(&self) -> Option<TimeWindow> {
        self.working_hours
    }

    /// Moves the route's working window and pins the start and end
    /// location events to its edges, keeping their coordinates.
    pub fn set_time_window(&mut self, window: TimeWindow) {
        self.working_hours = Some(window);
        for event in &mut self.events {
            match event.event_type() {
                WorkEventType::StartLocation => {
                    event.set_window(Some(TimeWindow::instant(window.start_at())));
                }
                WorkEventType::EndLocation => {
                    event.set_window(Some(TimeWindow::instant(window.end_at())));
                }
                _ => {}
            }
        }
        self.sort_events();
    }

    // ==== events ====

    pub fn events(&self) -> &[WorkEvent] {
        &self.events
    }

    pub fn event(&self, id: WorkEventId) -> Option<&WorkEvent> {
        self.events.iter().find(|event| event.id() == id)
    }

    pub fn event_mut(&mut self, id: WorkEventId) -> Option<&mut WorkEvent> {
        self.events.iter_mut().find(|event| event.id() == id)
    }

    pub fn events_of_type(&self, event_type: WorkEventType) -> impl Iterator<Item = &WorkEvent> {
        self.events
            .iter()
            .filter(move |event| event.event_type() == event_type)
    }

    pub fn has_event_of_type(&self, event_type: WorkEventType) -> bool {
        self.events_of_type(event_type).next().is_some()
    }

    pub fn appointments(&self) -> impl Iterator<Item = &Appointment> {
        self.events.iter().filter_map(WorkEvent::as_appointment)
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments().count()
    }

    /// Adds an event, claims it for this route and restores ordering.
    ///
    /// Structural duplicates (say, a second start location) are accepted
    /// as-is; rules that care detect and repair them afterwards.
    pub fn add_event(&mut self, mut event: WorkEvent) {
        event.set_route_id(Some(self.id));
        self.events.push(event);
        self.sort_events();
    }

    pub fn add_events(&mut self, events: impl IntoIterator<Item = WorkEvent>) {
        for mut event in events {
            event.set_route_id(Some(self.id));
            self.events.push(event);
        }
        self.sort_events();
    }

    /// Removes the event with this identity and releases its route claim.
    pub fn remove_event(&mut self, id: WorkEventId) -> Option<WorkEvent> {
        let index = self.events.iter().position(|event| event.id() == id)?;
        let mut event = self.events.remove(index);
        event.set_route_id(None);
        Some(event)
    }

    /// Drains every event matching `predicate`, preserving the order of
    /// what remains. Removed events lose their route claim.
    pub fn remove_events_where<F>(&mut self, mut predicate: F) -> Vec<WorkEvent>
    where
        F: FnMut(&WorkEvent) -> bool,
    {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.events.len());
        for mut event in self.events.drain(..) {
            if predicate(&event) {
                event.set_route_id(None);
                removed.push(event);
            } else {
                kept.push(event);
            }
        }
        self.events = kept;
        removed
    }

    /// Replaces the stored event carrying `event`'s identity, or adds it
    /// if no such event exists. The event re-enters ordering at its new
    /// window's position, behind any equal keys already present.
    pub fn update_event(&mut self, event: WorkEvent) {
        self.remove_event(event.id());
        self.add_event(event);
    }

    /// The first appointment after the given event in route order.
    pub fn next_appointment(&self, after: WorkEventId) -> Option<&WorkEvent> {
        let index = self.events.iter().position(|event| event.id() == after)?;
        self.events[index + 1..].iter().find(|event| event.is_appointment())
    }

    /// The last appointment before the given event in route order.
    pub fn previous_appointment(&self, before: WorkEventId) -> Option<&WorkEvent> {
        let index = self.events.iter().position(|event| event.id() == before)?;
        self.events[..index].iter().rev().find(|event| event.is_appointment())
    }

    /// Fills the gap a travel or waiting event represents with an extra
    /// work block spanning the surrounding appointments' locations.
    ///
    /// No-op (returning `false`) when the event is missing, is some other
    /// kind, or has no appointment on either side.
    pub fn add_extra_work_for(&mut self, event_id: WorkEventId) -> bool {
        let Some(event) = self.event(event_id) else {
            return false;
        };
        if !matches!(
            event.event_type(),
            WorkEventType::Travel | WorkEventType::Waiting
        ) {
            return false;
        }
        let window = event.window().copied();
        let Some(from) = self
            .previous_appointment(event_id)
            .and_then(WorkEvent::as_appointment)
            .map(|appointment| appointment.location)
        else {
            return false;
        };
        let Some(to) = self
            .next_appointment(event_id)
            .and_then(WorkEvent::as_appointment)
            .map(|appointment| appointment.location)
        else {
            return false;
        };
        self.add_event(WorkEvent::extra_work(from, to, window));
        true
    }

    fn sort_events(&mut self) {
        self.events.sort_by_key(|event| event.sort_key());
    }

    // ==== locations ====

    /// The route's start location event, created from the pro's start
    /// location on first read if the route has none yet.
    pub fn start_location(&mut self) -> Option<&WorkEvent> {
        if !self.has_event_of_type(WorkEventType::StartLocation) {
            let home = self.pro.start_location?;
            let window = self.working_hours.map(|w| TimeWindow::instant(w.start_at()));
            self.add_event(WorkEvent::start_location(home, window));
        }
        self.events_of_type(WorkEventType::StartLocation).next()
    }

    /// The route's end location event, created the same way from the end
    /// of the working window.
    pub fn end_location(&mut self) -> Option<&WorkEvent> {
        if !self.has_event_of_type(WorkEventType::EndLocation) {
            let home = self.pro.end_location?;
            let window = self.working_hours.map(|w| TimeWindow::instant(w.end_at()));
            self.add_event(WorkEvent::end_location(home, window));
        }
        self.events_of_type(WorkEventType::EndLocation).next()
    }

    /// Geographic center of the route's appointments, if it has any.
    pub fn centroid(&self) -> Option<Coordinate> {
        let locations: Vec<Coordinate> =
            self.appointments().map(|appointment| appointment.location).collect();
        Coordinate::centroid(&locations)
    }

    // ==== capacity ====

    pub fn actual_capacity_count(&self) -> u32 {
        self.actual_capacity_count
    }

    pub fn capacity_override(&self) -> Option<u32> {
        self.capacity_override
    }

    pub fn set_capacity_override(&mut self, capacity: Option<u32>) {
        self.capacity_override = capacity;
    }

    /// Appointments this route can serve today: the day's capacity minus
    /// reserved slots, floored at zero. A pro with no non-personal skills
    /// cannot serve general customers, so their route holds nothing.
    pub fn max_capacity(&self) -> u32 {
        if !self.pro.has_service_skills() {
            return 0;
        }
        let actual = self.capacity_override.unwrap_or(self.actual_capacity_count);
        actual.saturating_sub(self.config.reserved_slots())
    }

    pub fn remaining_capacity(&self) -> u32 {
        self.max_capacity().saturating_sub(self.appointment_count() as u32)
    }

    pub fn has_capacity(&self) -> bool {
        self.remaining_capacity() > 0
    }

    // ==== metrics ====

    pub fn metrics(&self) -> &BTreeMap<MetricKey, Metric> {
        &self.metrics
    }

    pub fn metric(&self, key: MetricKey) -> Option<&Metric> {
        self.metrics.get(&key)
    }

    /// Attaches a metric, replacing any previous one under the same key.
    pub fn set_metric(&mut self, metric: Metric) {
        self.metrics.insert(metric.key(), metric);
    }

    pub fn clear_metrics(&mut self) {
        self.metrics.clear();
    }

    /// Combined score: achieved weighted score over the best possible one.
    /// A route with no metrics scores zero. The stored combined metric
    /// itself is left out so it never feeds back into the ratio.
    pub fn optimization_score(&self) -> Score {
        let scorable: Vec<&Metric> = self
            .metrics
            .values()
            .filter(|metric| metric.key() != MetricKey::OptimizationScore)
            .collect();
        let possible: f64 = scorable.iter().map(|metric| metric.max_weighted_score()).sum();
        if possible == 0.0 {
            return Score::zero();
        }
        let achieved: f64 = scorable.iter().map(|metric| metric.weighted_score()).sum();
        Score::new(achieved / possible)
    }

    // ==== geometry ====

    pub fn geometry(&self) -> Option<&Polyline> {
        self.geometry.as_ref()
    }

    pub fn set_geometry(&mut self, geometry: Option<Polyline>) {
        self.geometry = geometry;
    }
}
