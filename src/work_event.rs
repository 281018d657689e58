//! Work events: the timed units of activity making up a route.
//!
//! Every event shares a common capability set (synthetic identity, optional
//! time window, optional back-reference to the owning route) with a closed
//! set of variant payloads in [`WorkEventKind`]. Dispatch happens on the
//! explicit [`WorkEventType`] tag, never on downcasting.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::route::RouteId;
use crate::service_pro::{ServiceProId, Skill};
use crate::time_window::TimeWindow;
use crate::units::{Distance, Duration};

static NEXT_WORK_EVENT_ID: AtomicU64 = AtomicU64::new(1);

/// Synthetic identity assigned at construction.
///
/// Routes look events up by this id ("this exact event", not "an equal
/// event"), so two appointments with identical payloads remain
/// distinguishable. Clones keep their id: a cloned route addresses its
/// events the same way the original does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkEventId(u64);

impl WorkEventId {
    fn next() -> Self {
        Self(NEXT_WORK_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Source-system appointment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppointmentId(pub i64);

impl AppointmentId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source-system customer id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub i64);

impl CustomerId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Appointment category; weights feed the "weighted services" statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AppointmentCategory {
    /// First visit for a new customer; longest and most valuable.
    Initial,
    /// Follow-up visit to redo unsatisfactory work.
    Reservice,
    #[default]
    Regular,
}

impl AppointmentCategory {
    /// Contribution of one appointment of this category to weighted-service
    /// counts.
    pub fn service_weight(&self) -> f64 {
        match self {
            AppointmentCategory::Initial => 1.5,
            AppointmentCategory::Regular => 1.0,
            AppointmentCategory::Reservice => 0.5,
        }
    }
}

/// Customer appointment payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub customer_id: CustomerId,
    pub location: Coordinate,
    pub priority: i32,
    pub category: AppointmentCategory,
    pub service_duration: Duration,
    pub setup_duration: Duration,
    pub min_predicted_duration: Option<Duration>,
    pub max_predicted_duration: Option<Duration>,
    /// Locked appointments keep their route and scheduled time through
    /// re-planning.
    pub locked: bool,
    pub preferred_pro_id: Option<ServiceProId>,
    pub notify_customer: bool,
    pub skills: Vec<Skill>,
    pub description: Option<String>,
    /// Rescheduling lineage: the appointment this one replaces.
    pub previous_appointment_id: Option<AppointmentId>,
    /// Rescheduling lineage: the appointment that replaces this one.
    pub next_appointment_id: Option<AppointmentId>,
}

impl Appointment {
    pub fn new(
        id: AppointmentId,
        customer_id: CustomerId,
        location: Coordinate,
        service_duration: Duration,
    ) -> Self {
        Self {
            id,
            customer_id,
            location,
            priority: 0,
            category: AppointmentCategory::Regular,
            service_duration,
            setup_duration: Duration::ZERO,
            min_predicted_duration: None,
            max_predicted_duration: None,
            locked: false,
            preferred_pro_id: None,
            notify_customer: false,
            skills: Vec::new(),
            description: None,
            previous_appointment_id: None,
            next_appointment_id: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_category(mut self, category: AppointmentCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_setup_duration(mut self, setup_duration: Duration) -> Self {
        self.setup_duration = setup_duration;
        self
    }

    pub fn with_skills(mut self, skills: Vec<Skill>) -> Self {
        self.skills = skills;
        self
    }

    pub fn with_preferred_pro(mut self, pro_id: ServiceProId) -> Self {
        self.preferred_pro_id = Some(pro_id);
        self
    }

    pub fn locked(mut self) -> Self {
        self.locked = true;
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

    /// Service plus setup: the time the pro is actually on site.
    pub fn on_site_duration(&self) -> Duration {
        self.service_duration.increase(self.setup_duration)
    }
}

/// Variant payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorkEventKind {
    StartLocation { location: Coordinate },
    EndLocation { location: Coordinate },
    Appointment(Appointment),
    Meeting {
        subject: String,
        location: Option<Coordinate>,
    },
    Travel {
        from: Option<Coordinate>,
        to: Option<Coordinate>,
        distance: Distance,
    },
    Lunch,
    WorkBreak,
    ReservedTime { description: Option<String> },
    ExtraWork { from: Coordinate, to: Coordinate },
    Waiting,
}

/// Fieldless tag for dispatch, formatting, and subset queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkEventType {
    StartLocation,
    EndLocation,
    Appointment,
    Meeting,
    Travel,
    Lunch,
    WorkBreak,
    ReservedTime,
    ExtraWork,
    Waiting,
}

/// One timed unit of route activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkEvent {
    id: WorkEventId,
    route_id: Option<RouteId>,
    window: Option<TimeWindow>,
    kind: WorkEventKind,
}

impl WorkEvent {
    fn new(window: Option<TimeWindow>, kind: WorkEventKind) -> Self {
        Self {
            id: WorkEventId::next(),
            route_id: None,
            window,
            kind,
        }
    }

    pub fn start_location(location: Coordinate, window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::StartLocation { location })
    }

    pub fn end_location(location: Coordinate, window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::EndLocation { location })
    }

    pub fn appointment(appointment: Appointment, window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::Appointment(appointment))
    }

    pub fn meeting(
        subject: impl Into<String>,
        location: Option<Coordinate>,
        window: Option<TimeWindow>,
    ) -> Self {
        Self::new(
            window,
            WorkEventKind::Meeting {
                subject: subject.into(),
                location,
            },
        )
    }

    pub fn travel(
        from: Option<Coordinate>,
        to: Option<Coordinate>,
        distance: Distance,
        window: Option<TimeWindow>,
    ) -> Self {
        Self::new(window, WorkEventKind::Travel { from, to, distance })
    }

    pub fn lunch(window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::Lunch)
    }

    pub fn work_break(window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::WorkBreak)
    }

    pub fn reserved_time(description: Option<String>, window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::ReservedTime { description })
    }

    pub fn extra_work(from: Coordinate, to: Coordinate, window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::ExtraWork { from, to })
    }

    pub fn waiting(window: Option<TimeWindow>) -> Self {
        Self::new(window, WorkEventKind::Waiting)
    }

    pub fn id(&self) -> WorkEventId {
        self.id
    }

    /// Back-reference to the owning route; a plain id, not ownership.
    pub fn route_id(&self) -> Option<RouteId> {
        self.route_id
    }

    pub(crate) fn set_route_id(&mut self, route_id: Option<RouteId>) {
        self.route_id = route_id;
    }

    pub fn window(&self) -> Option<&TimeWindow> {
        self.window.as_ref()
    }

    pub fn set_window(&mut self, window: Option<TimeWindow>) {
        self.window = window;
    }

    /// Updates the distance on a travel leg. Returns false for other
    /// event kinds.
    pub fn set_travel_distance(&mut self, new_distance: Distance) -> bool {
        if let WorkEventKind::Travel { distance, .. } = &mut self.kind {
            *distance = new_distance;
            true
        } else {
            false
        }
    }

    pub fn kind(&self) -> &WorkEventKind {
        &self.kind
    }

    pub fn event_type(&self) -> WorkEventType {
        match &self.kind {
            WorkEventKind::StartLocation { .. } => WorkEventType::StartLocation,
            WorkEventKind::EndLocation { .. } => WorkEventType::EndLocation,
            WorkEventKind::Appointment(_) => WorkEventType::Appointment,
            WorkEventKind::Meeting { .. } => WorkEventType::Meeting,
            WorkEventKind::Travel { .. } => WorkEventType::Travel,
            WorkEventKind::Lunch => WorkEventType::Lunch,
            WorkEventKind::WorkBreak => WorkEventType::WorkBreak,
            WorkEventKind::ReservedTime { .. } => WorkEventType::ReservedTime,
            WorkEventKind::ExtraWork { .. } => WorkEventType::ExtraWork,
            WorkEventKind::Waiting => WorkEventType::Waiting,
        }
    }

    /// The coordinate this event happens at (destination, for movement
    /// events), if it has one.
    pub fn location(&self) -> Option<Coordinate> {
        match &self.kind {
            WorkEventKind::StartLocation { location } => Some(*location),
            WorkEventKind::EndLocation { location } => Some(*location),
            WorkEventKind::Appointment(appointment) => Some(appointment.location),
            WorkEventKind::Meeting { location, .. } => *location,
            WorkEventKind::Travel { to, .. } => *to,
            WorkEventKind::ExtraWork { to, .. } => Some(*to),
            WorkEventKind::Lunch
            | WorkEventKind::WorkBreak
            | WorkEventKind::ReservedTime { .. }
            | WorkEventKind::Waiting => None,
        }
    }

    pub fn as_appointment(&self) -> Option<&Appointment> {
        match &self.kind {
            WorkEventKind::Appointment(appointment) => Some(appointment),
            _ => None,
        }
    }

    pub fn as_appointment_mut(&mut self) -> Option<&mut Appointment> {
        match &mut self.kind {
            WorkEventKind::Appointment(appointment) => Some(appointment),
            _ => None,
        }
    }

    pub fn is_appointment(&self) -> bool {
        matches!(self.kind, WorkEventKind::Appointment(_))
    }

    pub fn is_break(&self) -> bool {
        matches!(self.kind, WorkEventKind::Lunch | WorkEventKind::WorkBreak)
    }

    /// Ordering key: `(end, start)` ascending, events without a window first
    /// and stable among themselves.
    pub(crate) fn sort_key(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match &self.window {
            Some(window) => (Some(window.end_at()), Some(window.start_at())),
            None => (None, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_event_gets_a_distinct_id() {
        let a = WorkEvent::lunch(None);
        let b = WorkEvent::lunch(None);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn clones_keep_their_identity() {
        let event = WorkEvent::waiting(None);
        let copy = event.clone();
        assert_eq!(event.id(), copy.id());
    }

    #[test]
    fn appointment_accessors() {
        let appointment = Appointment::new(
            AppointmentId(7),
            CustomerId(12),
            Coordinate::new(36.1, -115.1),
            Duration::from_minutes(30),
        );
        let event = WorkEvent::appointment(appointment, None);

        assert_eq!(event.event_type(), WorkEventType::Appointment);
        assert!(event.is_appointment());
        assert_eq!(event.as_appointment().unwrap().id, AppointmentId(7));
        assert_eq!(
            event.location(),
            Some(Coordinate::new(36.1, -115.1))
        );
    }

    #[test]
    fn on_site_duration_includes_setup() {
        let appointment = Appointment::new(
            AppointmentId(1),
            CustomerId(1),
            Coordinate::new(0.0, 0.0),
            Duration::from_minutes(25),
        )
        .with_setup_duration(Duration::from_minutes(5));

        assert_eq!(appointment.on_site_duration(), Duration::from_minutes(30));
    }

    #[test]
    fn breaks_are_flagged() {
        assert!(WorkEvent::lunch(None).is_break());
        assert!(WorkEvent::work_break(None).is_break());
        assert!(!WorkEvent::waiting(None).is_break());
    }
}
