//! Lightweight scheduling of pending services into existing routes.
//!
//! This is the booking-side counterpart to the optimization pipeline:
//! no travel matrix, no rule stack, just priority-ordered placement of
//! requested services into whichever compatible route gains the least
//! straight-line travel. The resulting appointment events carry the
//! customer's preferences and rescheduling lineage so a later
//! optimization run can refine the day.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::haversine::straight_line_distance;
use crate::route::RouteId;
use crate::service_pro::{ServicePro, ServiceProId, Skill};
use crate::state::Office;
use crate::time_window::TimeWindow;
use crate::units::Duration;
use crate::work_event::{Appointment, AppointmentId, CustomerId, WorkEvent};

/// Identity of a service request awaiting placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PendingServiceId(pub i64);

impl PendingServiceId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PendingServiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A requested service with the customer's placement preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingService {
    pub id: PendingServiceId,
    pub customer_id: CustomerId,
    pub location: Coordinate,
    pub duration: Duration,
    pub priority: i32,
    pub skills: Vec<Skill>,
    pub preferred_window_start: Option<DateTime<Utc>>,
    pub preferred_window_end: Option<DateTime<Utc>>,
    pub preferred_pro_id: Option<ServiceProId>,
    pub preferred_day: Option<NaiveDate>,
    /// Rescheduling lineage: the appointment this request replaces.
    pub previous_appointment_id: Option<AppointmentId>,
    /// Rescheduling lineage: the appointment already booked after it.
    pub next_appointment_id: Option<AppointmentId>,
}

impl PendingService {
    pub fn new(
        id: PendingServiceId,
        customer_id: CustomerId,
        location: Coordinate,
        duration: Duration,
    ) -> Self {
        Self {
            id,
            customer_id,
            location,
            duration,
            priority: 0,
            skills: Vec::new(),
            preferred_window_start: None,
            preferred_window_end: None,
            preferred_pro_id: None,
            preferred_day: None,
            previous_appointment_id: None,
            next_appointment_id: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_skills(mut self, skills: Vec<Skill>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_preferred_window(mut self, window: TimeWindow) -> Self {
        self.preferred_window_start = Some(window.start_at());
        self.preferred_window_end = Some(window.end_at());
        self
    }

    pub fn with_preferred_pro(mut self, pro_id: ServiceProId) -> Self {
        self.preferred_pro_id = Some(pro_id);
        self
    }

    pub fn with_preferred_day(mut self, day: NaiveDate) -> Self {
        self.preferred_day = Some(day);
        self
    }

    pub fn with_lineage(
        mut self,
        previous: Option<AppointmentId>,
        next: Option<AppointmentId>,
    ) -> Self {
        self.previous_appointment_id = previous;
        self.next_appointment_id = next;
        self
    }

    /// The requested arrival window, when both edges were given.
    pub fn preferred_window(&self) -> Option<TimeWindow> {
        let start = self.preferred_window_start?;
        let end = self.preferred_window_end?;
        TimeWindow::new(start, end).ok()
    }

    /// Appointment payload this request becomes once placed. The pending
    /// id doubles as the appointment id; lineage and preferences carry
    /// over.
    fn to_appointment(&self) -> Appointment {
        let mut appointment = Appointment::new(
            AppointmentId(self.id.value()),
            self.customer_id,
            self.location,
            self.duration,
        )
        .with_priority(self.priority)
        .with_skills(self.skills.clone())
        .with_lineage(self.previous_appointment_id, self.next_appointment_id);
        if let Some(pro_id) = self.preferred_pro_id {
            appointment = appointment.with_preferred_pro(pro_id);
        }
        appointment
    }
}

/// A bookable route on some day, owning its appointment events in
/// window order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledRoute {
    id: RouteId,
    date: NaiveDate,
    pro: Arc<ServicePro>,
    capacity: u32,
    appointments: Vec<WorkEvent>,
}

impl ScheduledRoute {
    pub fn new(id: RouteId, date: NaiveDate, pro: Arc<ServicePro>, capacity: u32) -> Self {
        Self {
            id,
            date,
            pro,
            capacity,
            appointments: Vec::new(),
        }
    }

    pub fn id(&self) -> RouteId {
        self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn pro(&self) -> &Arc<ServicePro> {
        &self.pro
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn appointments(&self) -> &[WorkEvent] {
        &self.appointments
    }

    pub fn has_capacity(&self) -> bool {
        (self.appointments.len() as u32) < self.capacity
    }

    /// Inserts in window order; events with equal keys keep insertion
    /// order, windowless events sort first.
    pub fn add_appointment(&mut self, mut event: WorkEvent) {
        event.set_route_id(Some(self.id));
        let key = event.sort_key();
        let position = self
            .appointments
            .partition_point(|existing| existing.sort_key() <= key);
        self.appointments.insert(position, event);
    }

    fn stop_locations(&self) -> Vec<Coordinate> {
        self.appointments
            .iter()
            .filter_map(|event| event.as_appointment().map(|a| a.location))
            .collect()
    }
}

/// Everything the scheduler works on for one office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    pub office: Office,
    pub routes: Vec<ScheduledRoute>,
    pub pending: Vec<PendingService>,
}

impl SchedulingState {
    pub fn new(office: Office) -> Self {
        Self {
            office,
            routes: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn route(&self, id: RouteId) -> Option<&ScheduledRoute> {
        self.routes.iter().find(|route| route.id() == id)
    }
}

/// What one scheduling sweep did. Unplaced services stay in the state's
/// pending list for a later attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulingOutcome {
    pub placed: Vec<PendingServiceId>,
    pub unplaced: Vec<PendingServiceId>,
}

/// Priority-ordered placement of pending services into existing routes.
#[derive(Debug, Default)]
pub struct SchedulingService;

impl SchedulingService {
    pub fn new() -> Self {
        Self
    }

    /// Places as many pending services as constraints allow.
    ///
    /// Higher priority goes first. A route qualifies when it matches the
    /// preferred day and pro, its pro holds the required skills, and it
    /// has capacity left; among qualifying routes the one gaining the
    /// least straight-line travel wins.
    pub fn schedule(&self, state: &mut SchedulingState) -> SchedulingOutcome {
        let mut pending = std::mem::take(&mut state.pending);
        pending.sort_by_key(|service| -(service.priority as i64));

        let mut outcome = SchedulingOutcome::default();
        for service in pending {
            match cheapest_route(&state.routes, &service) {
                Some(index) => {
                    let window = service.preferred_window();
                    let event = WorkEvent::appointment(service.to_appointment(), window);
                    state.routes[index].add_appointment(event);
                    outcome.placed.push(service.id);
                }
                None => {
                    tracing::debug!(service_id = %service.id, "no qualifying route");
                    outcome.unplaced.push(service.id);
                    state.pending.push(service);
                }
            }
        }
        outcome
    }
}

fn qualifies(route: &ScheduledRoute, service: &PendingService) -> bool {
    if let Some(day) = service.preferred_day {
        if route.date() != day {
            return false;
        }
    }
    if let Some(pro_id) = service.preferred_pro_id {
        if route.pro().id != pro_id {
            return false;
        }
    }
    route.pro().has_skills(&service.skills) && route.has_capacity()
}

/// Index of the qualifying route with the smallest added travel.
fn cheapest_route(routes: &[ScheduledRoute], service: &PendingService) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, route) in routes.iter().enumerate() {
        if !qualifies(route, service) {
            continue;
        }
        let cost = added_travel_meters(&route.stop_locations(), service.location);
        if best.map_or(true, |(_, current)| cost < current) {
            best = Some((index, cost));
        }
    }
    best.map(|(index, _)| index)
}

/// Cheapest detour over every insertion position in the stop sequence.
fn added_travel_meters(stops: &[Coordinate], location: Coordinate) -> f64 {
    if stops.is_empty() {
        return 0.0;
    }
    let leg = |a: Coordinate, b: Coordinate| straight_line_distance(a, b).as_meters();
    let mut cheapest = f64::INFINITY;
    for position in 0..=stops.len() {
        let cost = match (position.checked_sub(1).map(|i| stops[i]), stops.get(position)) {
            (Some(prev), Some(next)) => leg(prev, location) + leg(location, *next) - leg(prev, *next),
            (Some(prev), None) => leg(prev, location),
            (None, Some(next)) => leg(location, *next),
            (None, None) => 0.0,
        };
        if cost < cheapest {
            cheapest = cost;
        }
    }
    cheapest
}
