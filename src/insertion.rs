//! Greedy best-insertion routing engine.
//!
//! Appointments are placed one at a time, hardest-constrained first.
//! Each candidate is tried at every position of every compatible route
//! and lands where it adds the least travel; a route schedule is
//! recomputed from scratch for every trial, so committed windows,
//! reserved blocks, and working hours are honored by construction. The
//! optimize pass additionally runs a bounded relocate sweep that moves
//! already placed appointments to cheaper positions.
//!
//! Appointments that fit nowhere go back to the unassigned pool with
//! the reason logged; they are never dropped.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};

use crate::engine::{EngineError, RouteOptimizationService};
use crate::geo::Coordinate;
use crate::haversine::HaversineMatrix;
use crate::polyline::Polyline;
use crate::route::{Route, RouteId};
use crate::service_pro::{ServicePro, Skill};
use crate::state::OptimizationState;
use crate::time_window::TimeWindow;
use crate::traits::{TravelMatrix, TravelMatrixProvider};
use crate::work_event::{WorkEvent, WorkEventType};

#[derive(Debug, Clone)]
pub struct InsertionOptions {
    /// Relocate sweeps per optimize run. Each sweep only accepts strict
    /// travel improvements, so the loop terminates well before this in
    /// practice.
    pub improvement_passes: usize,
}

impl Default for InsertionOptions {
    fn default() -> Self {
        Self {
            improvement_passes: 2,
        }
    }
}

/// The stock engine: greedy best insertion plus a relocate sweep.
pub struct InsertionEngine {
    matrix_provider: Arc<dyn TravelMatrixProvider>,
    options: InsertionOptions,
}

impl InsertionEngine {
    pub const ID: &'static str = "insertion";

    pub fn new(matrix_provider: Arc<dyn TravelMatrixProvider>) -> Self {
        Self {
            matrix_provider,
            options: InsertionOptions::default(),
        }
    }

    /// Engine over straight-line travel estimates.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(HaversineMatrix::default()))
    }

    pub fn with_options(mut self, options: InsertionOptions) -> Self {
        self.options = options;
        self
    }

    fn run(&self, mut state: OptimizationState, pass: Pass) -> Result<OptimizationState, EngineError> {
        if state.assigned_appointment_count() == 0 && !state.has_unassigned_appointments() {
            return Ok(state);
        }
        let speed_factor = effective_speed_factor(state.params().travel_speed_factor);
        let fallback_anchor = state.area_central_point().or(state.office().location);

        // Collect every coordinate before asking for the matrix; indices
        // into `points` stay valid for the rest of the run.
        let mut points = PointIndex::default();
        let mut anchors: HashMap<RouteId, (usize, usize)> = HashMap::new();
        for route in state.routes() {
            if route.working_hours().is_none() {
                continue;
            }
            let Some(start) = route.pro().start_location.or(fallback_anchor) else {
                return Err(EngineError::Failed(format!(
                    "route {} has no start location and no fallback anchor",
                    route.id()
                )));
            };
            let end = route.pro().end_location.unwrap_or(start);
            anchors.insert(route.id(), (points.intern(start), points.intern(end)));
            for appointment in route.appointments() {
                points.intern(appointment.location);
            }
        }
        for event in state.unassigned_appointments() {
            if let Some(appointment) = event.as_appointment() {
                points.intern(appointment.location);
            }
        }
        if points.points().is_empty() {
            return Ok(state);
        }

        let matrix = self.matrix_provider.matrix_for(points.points());
        if matrix.is_empty() {
            return Err(EngineError::Failed(
                "travel matrix provider returned no entries".to_string(),
            ));
        }

        // Build one draft per plannable route. Routes whose fixed part
        // cannot be scheduled are left exactly as they came in.
        let mut drafts: Vec<RouteDraft> = Vec::new();
        let mut pool: Vec<WorkEvent> = state.take_unassigned_appointments();
        for route in state.routes() {
            let Some(hours) = route.working_hours() else {
                tracing::debug!(route_id = %route.id(), "route skipped, no working hours");
                continue;
            };
            let Some(&(start_point, end_point)) = anchors.get(&route.id()) else {
                continue;
            };
            let mut draft = RouteDraft {
                route_id: route.id(),
                pro: Arc::clone(route.pro()),
                start_point,
                end_point,
                day_start: hours.start_at().timestamp(),
                day_end: hours.end_at().timestamp(),
                busy: busy_blocks(route),
                capacity: route.max_capacity() as usize,
                stops: Vec::new(),
                cached_travel: 0,
            };
            let mut pooled = Vec::new();
            for event in route.events().iter().filter(|event| event.is_appointment()) {
                let Some(appointment) = event.as_appointment() else {
                    continue;
                };
                let seeded = appointment.locked || pass == Pass::Optimize;
                if seeded {
                    let committed = if appointment.locked {
                        event.window().map(window_seconds)
                    } else {
                        None
                    };
                    draft.stops.push(Stop {
                        point: points.intern(appointment.location),
                        on_site: appointment.on_site_duration().as_seconds() as i64,
                        committed,
                        locked: appointment.locked,
                        event: event.clone(),
                    });
                } else {
                    pooled.push(event.clone());
                }
            }
            match compute_schedule(&draft, &matrix, speed_factor) {
                Some(schedule) => {
                    draft.cached_travel = schedule.travel_seconds;
                    drafts.push(draft);
                    pool.append(&mut pooled);
                }
                None => {
                    tracing::debug!(
                        route_id = %route.id(),
                        "existing schedule infeasible, route left untouched"
                    );
                }
            }
        }

        pool.sort_by_key(pool_order_key);

        let mut leftovers: Vec<WorkEvent> = Vec::new();
        for event in pool {
            let stop = match Stop::from_event(event, &mut points) {
                Ok(stop) => stop,
                Err(event) => {
                    leftovers.push(event);
                    continue;
                }
            };
            match best_insertion(&stop, &mut drafts, &matrix, speed_factor) {
                Some((draft_index, position, _)) => {
                    apply_insertion(&mut drafts[draft_index], position, stop, &matrix, speed_factor);
                }
                None => {
                    let reason = unplaced_reason(&stop, &drafts);
                    if let Some(appointment) = stop.event.as_appointment() {
                        tracing::debug!(
                            appointment_id = %appointment.id,
                            reason,
                            "appointment left unassigned"
                        );
                    }
                    leftovers.push(stop.event);
                }
            }
        }

        if pass == Pass::Optimize {
            relocate_sweep(&mut drafts, &matrix, speed_factor, self.options.improvement_passes);
        }

        materialize(&mut state, drafts, &points, &matrix, speed_factor);
        state.set_unassigned_appointments(leftovers);
        Ok(state)
    }
}

impl RouteOptimizationService for InsertionEngine {
    fn id(&self) -> &str {
        Self::ID
    }

    fn plan(&self, state: OptimizationState) -> Result<OptimizationState, EngineError> {
        self.run(state, Pass::Plan)
    }

    fn optimize(&self, state: OptimizationState) -> Result<OptimizationState, EngineError> {
        self.run(state, Pass::Optimize)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// Seed routes: locked appointments stay pinned, everything else is
    /// pulled back into the pool and placed fresh.
    Plan,
    /// Keep current assignments, place the remaining pool, then try to
    /// relocate placed stops to cheaper positions.
    Optimize,
}

/// One appointment as the scheduler sees it.
#[derive(Clone)]
struct Stop {
    event: WorkEvent,
    point: usize,
    /// Service plus setup, in seconds.
    on_site: i64,
    /// Hard window the on-site time must fall inside.
    committed: Option<(i64, i64)>,
    locked: bool,
}

impl Stop {
    fn from_event(event: WorkEvent, points: &mut PointIndex) -> Result<Self, WorkEvent> {
        let info = event.as_appointment().map(|appointment| {
            (
                appointment.location,
                appointment.on_site_duration().as_seconds() as i64,
                appointment.locked,
            )
        });
        match info {
            Some((location, on_site, locked)) => {
                let point = points.intern(location);
                let committed = event.window().map(window_seconds);
                Ok(Self {
                    event,
                    point,
                    on_site,
                    committed,
                    locked,
                })
            }
            None => Err(event),
        }
    }

    fn required_skills(&self) -> &[Skill] {
        self.event
            .as_appointment()
            .map(|appointment| appointment.skills.as_slice())
            .unwrap_or(&[])
    }
}

/// Mutable working copy of one route during a run.
struct RouteDraft {
    route_id: RouteId,
    pro: Arc<ServicePro>,
    start_point: usize,
    end_point: usize,
    day_start: i64,
    day_end: i64,
    /// Sorted, merged fixed blocks (meetings, lunch, breaks, reserved).
    busy: Vec<(i64, i64)>,
    capacity: usize,
    stops: Vec<Stop>,
    cached_travel: i64,
}

impl RouteDraft {
    fn accepts(&self, stop: &Stop) -> bool {
        self.stops.len() < self.capacity && self.pro.has_skills(stop.required_skills())
    }
}

/// Feasible timing for a draft's current stop sequence.
struct RouteSchedule {
    /// Service start/end per stop, unix seconds.
    times: Vec<(i64, i64)>,
    /// All travel legs including the return to the end anchor.
    travel_seconds: i64,
}

/// Coordinates deduplicated to matrix indices.
#[derive(Default)]
struct PointIndex {
    points: Vec<Coordinate>,
    index: HashMap<String, usize>,
}

impl PointIndex {
    fn intern(&mut self, point: Coordinate) -> usize {
        let key = point_key(point);
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }
        let next = self.points.len();
        self.points.push(point);
        self.index.insert(key, next);
        next
    }

    fn coordinate(&self, index: usize) -> Coordinate {
        self.points
            .get(index)
            .copied()
            .unwrap_or(Coordinate::new(0.0, 0.0))
    }

    fn points(&self) -> &[Coordinate] {
        &self.points
    }
}

fn point_key(point: Coordinate) -> String {
    format!("{:.6},{:.6}", point.latitude, point.longitude)
}

fn window_seconds(window: &TimeWindow) -> (i64, i64) {
    (window.start_at().timestamp(), window.end_at().timestamp())
}

fn effective_speed_factor(factor: f64) -> f64 {
    if factor > 0.0 { factor } else { 1.0 }
}

fn travel_seconds(matrix: &TravelMatrix, from: usize, to: usize, speed_factor: f64) -> i64 {
    if from == to {
        return 0;
    }
    let base = matrix.duration(from, to).as_seconds() as f64;
    (base / speed_factor).round() as i64
}

/// Pool ordering: higher priority first, then tighter committed windows,
/// then earlier windows. Windowless appointments go last.
fn pool_order_key(event: &WorkEvent) -> (i64, i64, i64) {
    let priority = event
        .as_appointment()
        .map(|appointment| appointment.priority as i64)
        .unwrap_or(0);
    let (length, start) = event
        .window()
        .map(|window| {
            (
                window.end_at().timestamp() - window.start_at().timestamp(),
                window.start_at().timestamp(),
            )
        })
        .unwrap_or((i64::MAX, i64::MAX));
    (-priority, length, start)
}

fn busy_blocks(route: &Route) -> Vec<(i64, i64)> {
    let mut blocks: Vec<(i64, i64)> = route
        .events()
        .iter()
        .filter(|event| {
            matches!(
                event.event_type(),
                WorkEventType::Meeting
                    | WorkEventType::Lunch
                    | WorkEventType::WorkBreak
                    | WorkEventType::ReservedTime
                    | WorkEventType::ExtraWork
            )
        })
        .filter_map(|event| event.window().map(window_seconds))
        .filter(|(start, end)| end > start)
        .collect();
    blocks.sort_unstable();
    let mut merged: Vec<(i64, i64)> = Vec::with_capacity(blocks.len());
    for (start, end) in blocks {
        match merged.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Pushes a service start past every fixed block it would overlap.
/// Blocks are sorted and disjoint, so one forward pass settles it.
fn clear_busy_blocks(mut start: i64, on_site: i64, busy: &[(i64, i64)]) -> i64 {
    for &(block_start, block_end) in busy {
        if start < block_end && start + on_site > block_start {
            start = block_end;
        }
    }
    start
}

/// Walks the stop sequence and times every service, or `None` when the
/// sequence cannot fit the day.
///
/// Arrival is previous departure plus travel; service starts at arrival
/// pushed past committed-window starts and fixed blocks, and must end
/// inside its committed window and the working hours. The return leg to
/// the end anchor must fit as well.
fn compute_schedule(
    draft: &RouteDraft,
    matrix: &TravelMatrix,
    speed_factor: f64,
) -> Option<RouteSchedule> {
    let mut at = draft.day_start;
    let mut previous = draft.start_point;
    let mut travel_total = 0i64;
    let mut times = Vec::with_capacity(draft.stops.len());
    for stop in &draft.stops {
        let leg = travel_seconds(matrix, previous, stop.point, speed_factor);
        travel_total += leg;
        let mut start = at + leg;
        if let Some((window_start, _)) = stop.committed {
            start = start.max(window_start);
        }
        start = clear_busy_blocks(start, stop.on_site, &draft.busy);
        let end = start + stop.on_site;
        if let Some((_, window_end)) = stop.committed {
            if end > window_end {
                return None;
            }
        }
        if end > draft.day_end {
            return None;
        }
        times.push((start, end));
        at = end;
        previous = stop.point;
    }
    let return_leg = travel_seconds(matrix, previous, draft.end_point, speed_factor);
    travel_total += return_leg;
    if at + return_leg > draft.day_end {
        return None;
    }
    Some(RouteSchedule {
        times,
        travel_seconds: travel_total,
    })
}

/// Cheapest feasible `(draft, position, added travel)` for a stop.
/// Strict comparison keeps the earliest candidate on ties.
fn best_insertion(
    stop: &Stop,
    drafts: &mut [RouteDraft],
    matrix: &TravelMatrix,
    speed_factor: f64,
) -> Option<(usize, usize, i64)> {
    let mut best: Option<(usize, usize, i64)> = None;
    for (draft_index, draft) in drafts.iter_mut().enumerate() {
        if !draft.accepts(stop) {
            continue;
        }
        let base = draft.cached_travel;
        for position in 0..=draft.stops.len() {
            draft.stops.insert(position, stop.clone());
            if let Some(schedule) = compute_schedule(draft, matrix, speed_factor) {
                let added = schedule.travel_seconds - base;
                if best.map_or(true, |(_, _, cost)| added < cost) {
                    best = Some((draft_index, position, added));
                }
            }
            draft.stops.remove(position);
        }
    }
    best
}

fn apply_insertion(
    draft: &mut RouteDraft,
    position: usize,
    stop: Stop,
    matrix: &TravelMatrix,
    speed_factor: f64,
) {
    draft.stops.insert(position, stop);
    if let Some(schedule) = compute_schedule(draft, matrix, speed_factor) {
        draft.cached_travel = schedule.travel_seconds;
    }
}

fn unplaced_reason(stop: &Stop, drafts: &[RouteDraft]) -> &'static str {
    let skills = stop.required_skills();
    let mut any_skilled = false;
    let mut any_room = false;
    for draft in drafts {
        if draft.pro.has_skills(skills) {
            any_skilled = true;
            if draft.stops.len() < draft.capacity {
                any_room = true;
            }
        }
    }
    if !any_skilled {
        "no route with required skills"
    } else if !any_room {
        "no remaining capacity"
    } else {
        "no feasible time window"
    }
}

/// Moves placed, non-locked stops to strictly cheaper positions until a
/// sweep finds nothing or the pass cap is hit.
fn relocate_sweep(
    drafts: &mut Vec<RouteDraft>,
    matrix: &TravelMatrix,
    speed_factor: f64,
    passes: usize,
) {
    for _ in 0..passes {
        let mut improved = false;
        for source_index in 0..drafts.len() {
            let mut stop_index = 0;
            while stop_index < drafts[source_index].stops.len() {
                if drafts[source_index].stops[stop_index].locked {
                    stop_index += 1;
                    continue;
                }
                let stop = drafts[source_index].stops.remove(stop_index);
                let Some(without) = compute_schedule(&drafts[source_index], matrix, speed_factor)
                else {
                    drafts[source_index].stops.insert(stop_index, stop);
                    stop_index += 1;
                    continue;
                };
                let total_before: i64 = drafts.iter().map(|draft| draft.cached_travel).sum();
                let cached: Vec<i64> = drafts.iter().map(|draft| draft.cached_travel).collect();
                let mut best: Option<(usize, usize, i64)> = None;
                for (target_index, draft) in drafts.iter_mut().enumerate() {
                    if target_index != source_index && !draft.accepts(&stop) {
                        continue;
                    }
                    let others = if target_index == source_index {
                        total_before - cached[source_index]
                    } else {
                        total_before - cached[source_index] + without.travel_seconds
                            - cached[target_index]
                    };
                    for position in 0..=draft.stops.len() {
                        draft.stops.insert(position, stop.clone());
                        if let Some(schedule) = compute_schedule(draft, matrix, speed_factor) {
                            let total = others + schedule.travel_seconds;
                            if best.map_or(true, |(_, _, cost)| total < cost) {
                                best = Some((target_index, position, total));
                            }
                        }
                        draft.stops.remove(position);
                    }
                }
                match best {
                    Some((target_index, position, total)) if total < total_before => {
                        drafts[source_index].cached_travel = without.travel_seconds;
                        apply_insertion(
                            &mut drafts[target_index],
                            position,
                            stop,
                            matrix,
                            speed_factor,
                        );
                        improved = true;
                        // Do not advance: the next stop shifted into this slot.
                    }
                    _ => {
                        drafts[source_index].stops.insert(stop_index, stop);
                        stop_index += 1;
                    }
                }
            }
        }
        if !improved {
            break;
        }
    }
}

fn window_from(start: i64, end: i64) -> Option<TimeWindow> {
    let start = Utc.timestamp_opt(start, 0).single()?;
    let end = Utc.timestamp_opt(end, 0).single()?;
    TimeWindow::new(start, end).ok()
}

/// Writes drafts back onto their routes: appointment events keep their
/// identity but get their scheduled windows, travel and waiting events
/// are regenerated, and the route geometry is rebuilt stop by stop.
fn materialize(
    state: &mut OptimizationState,
    drafts: Vec<RouteDraft>,
    points: &PointIndex,
    matrix: &TravelMatrix,
    speed_factor: f64,
) {
    for draft in drafts {
        let schedule = compute_schedule(&draft, matrix, speed_factor);
        let Some(route) = state.route_mut(draft.route_id) else {
            continue;
        };
        let Some(schedule) = schedule else {
            tracing::debug!(route_id = %draft.route_id, "draft lost feasibility, route left untouched");
            continue;
        };
        route.remove_events_where(|event| {
            event.is_appointment()
                || matches!(
                    event.event_type(),
                    WorkEventType::Travel | WorkEventType::Waiting
                )
        });
        if draft.stops.is_empty() {
            route.set_geometry(None);
            continue;
        }
        let mut geometry = vec![points.coordinate(draft.start_point)];
        let mut previous = draft.start_point;
        let mut previous_end = draft.day_start;
        for (stop, &(start, end)) in draft.stops.iter().zip(&schedule.times) {
            let leg = travel_seconds(matrix, previous, stop.point, speed_factor);
            if leg > 0 {
                route.add_event(WorkEvent::travel(
                    Some(points.coordinate(previous)),
                    Some(points.coordinate(stop.point)),
                    matrix.distance(previous, stop.point),
                    window_from(previous_end, previous_end + leg),
                ));
            }
            let arrival = previous_end + leg;
            if start > arrival {
                route.add_event(WorkEvent::waiting(window_from(arrival, start)));
            }
            let mut event = stop.event.clone();
            event.set_window(window_from(start, end));
            route.add_event(event);
            geometry.push(points.coordinate(stop.point));
            previous = stop.point;
            previous_end = end;
        }
        let return_leg = travel_seconds(matrix, previous, draft.end_point, speed_factor);
        if return_leg > 0 {
            route.add_event(WorkEvent::travel(
                Some(points.coordinate(previous)),
                Some(points.coordinate(draft.end_point)),
                matrix.distance(previous, draft.end_point),
                window_from(previous_end, previous_end + return_leg),
            ));
        }
        geometry.push(points.coordinate(draft.end_point));
        route.set_geometry(Some(Polyline::new(geometry)));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, Utc};

    use super::*;
    use crate::route::Route;
    use crate::service_pro::ServiceProId;
    use crate::state::{Office, OfficeId, OptimizationState, OptimizationStateId};
    use crate::units::{Distance, Duration};
    use crate::work_event::{Appointment, AppointmentId, CustomerId};

    // ==== fixtures =====================================================

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, hour, minute, 0).unwrap()
    }

    fn window(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeWindow {
        TimeWindow::new(start, end).unwrap()
    }

    fn pro(id: i64, home: Coordinate) -> Arc<ServicePro> {
        Arc::new(
            ServicePro::new(ServiceProId(id), format!("Pro {id}"))
                .with_home(home)
                .with_skills([Skill::new("pest-general")]),
        )
    }

    fn route_for(id: i64, pro: Arc<ServicePro>, hours: TimeWindow) -> Route {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let mut route = Route::new(RouteId(id), OfficeId(1), date, pro).with_actual_capacity(22);
        route.set_time_window(hours);
        route
    }

    fn appointment(id: i64, location: Coordinate) -> Appointment {
        Appointment::new(
            AppointmentId(id),
            CustomerId(id),
            location,
            Duration::from_minutes(30),
        )
    }

    fn state_with(routes: Vec<Route>, pool: Vec<WorkEvent>) -> OptimizationState {
        let office = Office::new(OfficeId(1), "North Branch")
            .with_location(Coordinate::new(36.0, -115.0));
        let mut state = OptimizationState::new(
            OptimizationStateId(1),
            InsertionEngine::ID,
            office,
            window(at(0, 0), at(23, 59)),
        );
        for route in routes {
            state.add_route(route);
        }
        state.set_unassigned_appointments(pool);
        state
    }

    /// Ten minutes and one mile between any two distinct points.
    struct UniformMatrix;

    impl TravelMatrixProvider for UniformMatrix {
        fn matrix_for(&self, points: &[Coordinate]) -> TravelMatrix {
            let n = points.len();
            let durations = (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| {
                            if i == j {
                                Duration::ZERO
                            } else {
                                Duration::from_minutes(10)
                            }
                        })
                        .collect()
                })
                .collect();
            let distances = (0..n)
                .map(|i| {
                    (0..n)
                        .map(|j| {
                            if i == j {
                                Distance::ZERO
                            } else {
                                Distance::from_miles(1.0)
                            }
                        })
                        .collect()
                })
                .collect();
            TravelMatrix::new(durations, distances)
        }
    }

    struct NoMatrix;

    impl TravelMatrixProvider for NoMatrix {
        fn matrix_for(&self, _points: &[Coordinate]) -> TravelMatrix {
            TravelMatrix::empty()
        }
    }

    /// One minute inside a latitude zone, an hour across zones.
    struct ZoneMatrix;

    impl TravelMatrixProvider for ZoneMatrix {
        fn matrix_for(&self, points: &[Coordinate]) -> TravelMatrix {
            let leg = |a: &Coordinate, b: &Coordinate| {
                if (a.latitude - b.latitude).abs() < 1e-9
                    && (a.longitude - b.longitude).abs() < 1e-9
                {
                    0u64
                } else if (a.latitude < 36.5) == (b.latitude < 36.5) {
                    60
                } else {
                    3_600
                }
            };
            let durations = points
                .iter()
                .map(|a| {
                    points
                        .iter()
                        .map(|b| Duration::from_seconds(leg(a, b)))
                        .collect()
                })
                .collect();
            let distances = points
                .iter()
                .map(|a| {
                    points
                        .iter()
                        .map(|b| Distance::from_meters(leg(a, b) as f64 * 10.0))
                        .collect()
                })
                .collect();
            TravelMatrix::new(durations, distances)
        }
    }

    fn engine(provider: impl TravelMatrixProvider + 'static) -> InsertionEngine {
        InsertionEngine::new(Arc::new(provider))
    }

    // ==== plan =========================================================

    #[test]
    fn plan_places_pool_appointments_with_travel_legs() {
        let route = route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        let pool = vec![
            WorkEvent::appointment(appointment(1, Coordinate::new(36.1, -115.1)), None),
            WorkEvent::appointment(appointment(2, Coordinate::new(36.2, -115.2)), None),
            WorkEvent::appointment(appointment(3, Coordinate::new(36.3, -115.3)), None),
        ];
        let state = engine(UniformMatrix).plan(state_with(vec![route], pool)).unwrap();

        assert!(!state.has_unassigned_appointments());
        let route = &state.routes()[0];
        assert_eq!(route.appointment_count(), 3);
        assert_eq!(route.events_of_type(WorkEventType::Travel).count(), 4);
        let first = route
            .events()
            .iter()
            .find(|event| event.is_appointment())
            .unwrap();
        assert_eq!(first.window().unwrap().start_at(), at(8, 10));
        // start anchor, three stops, end anchor
        assert_eq!(route.geometry().unwrap().points().len(), 5);
    }

    #[test]
    fn plan_honors_committed_windows_and_waits() {
        let route = route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        let pool = vec![
            WorkEvent::appointment(appointment(1, Coordinate::new(36.1, -115.1)), None),
            WorkEvent::appointment(
                appointment(2, Coordinate::new(36.2, -115.2)),
                Some(window(at(10, 0), at(10, 30))),
            ),
        ];
        let state = engine(UniformMatrix).plan(state_with(vec![route], pool)).unwrap();

        let route = &state.routes()[0];
        let committed = route
            .events()
            .iter()
            .find(|event| {
                event
                    .as_appointment()
                    .is_some_and(|a| a.id == AppointmentId(2))
            })
            .unwrap();
        assert_eq!(committed.window().unwrap().start_at(), at(10, 0));
        assert_eq!(committed.window().unwrap().end_at(), at(10, 30));
        assert!(route.has_event_of_type(WorkEventType::Waiting));
    }

    #[test]
    fn plan_keeps_locked_appointments_pinned() {
        let mut route =
            route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        route.add_event(WorkEvent::appointment(
            appointment(1, Coordinate::new(36.1, -115.1)).locked(),
            Some(window(at(9, 0), at(9, 30))),
        ));
        let pool = vec![WorkEvent::appointment(
            appointment(2, Coordinate::new(36.2, -115.2)),
            None,
        )];
        let state = engine(UniformMatrix).plan(state_with(vec![route], pool)).unwrap();

        let route = &state.routes()[0];
        assert_eq!(route.appointment_count(), 2);
        let locked = route
            .events()
            .iter()
            .find(|event| {
                event
                    .as_appointment()
                    .is_some_and(|a| a.id == AppointmentId(1))
            })
            .unwrap();
        assert_eq!(locked.window().unwrap().start_at(), at(9, 0));
        assert_eq!(locked.window().unwrap().end_at(), at(9, 30));
        assert!(!state.has_unassigned_appointments());
    }

    #[test]
    fn plan_schedules_around_reserved_blocks() {
        let mut route =
            route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(11, 40), at(13, 30)));
        route.add_event(WorkEvent::lunch(Some(window(at(12, 0), at(12, 30)))));
        let pool = vec![WorkEvent::appointment(
            appointment(1, Coordinate::new(36.1, -115.1)),
            None,
        )];
        let state = engine(UniformMatrix).plan(state_with(vec![route], pool)).unwrap();

        let route = &state.routes()[0];
        let placed = route
            .events()
            .iter()
            .find(|event| event.is_appointment())
            .unwrap();
        assert_eq!(placed.window().unwrap().start_at(), at(12, 30));
        assert_eq!(placed.window().unwrap().end_at(), at(13, 0));
        assert!(route.has_event_of_type(WorkEventType::Waiting));
        assert!(route.has_event_of_type(WorkEventType::Lunch));
    }

    #[test]
    fn plan_leaves_unskilled_appointment_in_pool() {
        let route = route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        let pool = vec![WorkEvent::appointment(
            appointment(1, Coordinate::new(36.1, -115.1))
                .with_skills(vec![Skill::new("termite")]),
            None,
        )];
        let state = engine(UniformMatrix).plan(state_with(vec![route], pool)).unwrap();

        assert_eq!(state.unassigned_appointment_count(), 1);
        assert_eq!(state.routes()[0].appointment_count(), 0);
    }

    #[test]
    fn plan_respects_route_capacity() {
        let mut route =
            route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        route = route.with_actual_capacity(1);
        let pool = vec![
            WorkEvent::appointment(appointment(1, Coordinate::new(36.1, -115.1)), None),
            WorkEvent::appointment(appointment(2, Coordinate::new(36.2, -115.2)), None),
        ];
        let state = engine(UniformMatrix).plan(state_with(vec![route], pool)).unwrap();

        assert_eq!(state.routes()[0].appointment_count(), 1);
        assert_eq!(state.unassigned_appointment_count(), 1);
    }

    #[test]
    fn plan_fails_when_matrix_is_unavailable() {
        let route = route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        let pool = vec![WorkEvent::appointment(
            appointment(1, Coordinate::new(36.1, -115.1)),
            None,
        )];
        let err = engine(NoMatrix).plan(state_with(vec![route], pool)).unwrap_err();
        assert!(matches!(err, EngineError::Failed(_)));
    }

    // ==== optimize =====================================================

    #[test]
    fn optimize_places_remaining_pool() {
        let mut route =
            route_for(1, pro(1, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        route.add_event(WorkEvent::appointment(
            appointment(1, Coordinate::new(36.1, -115.1)),
            Some(window(at(8, 10), at(8, 40))),
        ));
        let pool = vec![WorkEvent::appointment(
            appointment(2, Coordinate::new(36.2, -115.2)),
            None,
        )];
        let state = engine(UniformMatrix)
            .optimize(state_with(vec![route], pool))
            .unwrap();

        assert_eq!(state.routes()[0].appointment_count(), 2);
        assert!(!state.has_unassigned_appointments());
    }

    #[test]
    fn optimize_relocates_stop_to_closer_route() {
        let mut far = route_for(1, pro(1, Coordinate::new(37.0, -115.0)), window(at(8, 0), at(17, 0)));
        far.add_event(WorkEvent::appointment(
            appointment(1, Coordinate::new(36.1, -115.1)),
            Some(window(at(10, 0), at(10, 30))),
        ));
        let near = route_for(2, pro(2, Coordinate::new(36.0, -115.0)), window(at(8, 0), at(17, 0)));
        let state = engine(ZoneMatrix)
            .optimize(state_with(vec![far, near], Vec::new()))
            .unwrap();

        assert_eq!(state.route(RouteId(1)).unwrap().appointment_count(), 0);
        assert_eq!(state.route(RouteId(2)).unwrap().appointment_count(), 1);
    }
}
