//! Contracts between the optimization pipeline and its collaborators.
//!
//! The pipeline itself is storage- and transport-agnostic: states come
//! from an [`OptimizationStateResolver`], go back out through an
//! [`OptimizationStatePersister`], and travel times come from whatever
//! [`TravelMatrixProvider`] the caller wires in. Everything here is
//! object-safe so implementations can be swapped behind `dyn` at the
//! service boundary.

use chrono::NaiveDate;
use thiserror::Error;

use crate::geo::Coordinate;
use crate::state::{Office, OptimizationParams, OptimizationState, OptimizationStateId};
use crate::units::{Distance, Duration};
use crate::weather::{WeatherError, WeatherInfo};

/// Pairwise travel durations and distances between a set of points.
///
/// Row `from`, column `to`. Both grids are square and share the point
/// order of the slice the matrix was built from. Out-of-range lookups
/// return zero rather than panicking; an engine treats an
/// [empty](TravelMatrix::is_empty) matrix as "provider had no answer"
/// and fails the run instead of planning with zeros.
#[derive(Debug, Clone, Default)]
pub struct TravelMatrix {
    durations: Vec<Vec<Duration>>,
    distances: Vec<Vec<Distance>>,
}

impl TravelMatrix {
    pub fn new(durations: Vec<Vec<Duration>>, distances: Vec<Vec<Distance>>) -> Self {
        Self {
            durations,
            distances,
        }
    }

    /// Matrix with no entries, the "provider had no answer" sentinel.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of points the matrix covers.
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Travel time from point `from` to point `to`.
    pub fn duration(&self, from: usize, to: usize) -> Duration {
        self.durations
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Travel distance from point `from` to point `to`.
    pub fn distance(&self, from: usize, to: usize) -> Distance {
        self.distances
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(Distance::ZERO)
    }
}

/// Produces the travel matrix for a set of coordinates.
///
/// Implementations should degrade gracefully: on upstream failure
/// return [`TravelMatrix::empty`] rather than an error, and let the
/// engine decide whether the run can continue.
pub trait TravelMatrixProvider: Send + Sync {
    fn matrix_for(&self, points: &[Coordinate]) -> TravelMatrix;
}

/// Storage failures surfaced by state repositories.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("optimization state {0} not found")]
    NotFound(OptimizationStateId),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Why an office/date pair could not be assembled into a plannable state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceDataError {
    #[error("office {office_id} has no appointments on {date}")]
    NoAppointments { office_id: i64, date: NaiveDate },
    #[error("office {office_id} has no service pros on {date}")]
    NoServicePros { office_id: i64, date: NaiveDate },
    #[error("office {office_id} has no regular routes on {date}")]
    NoRegularRoutes { office_id: i64, date: NaiveDate },
    #[error("office {office_id} has no route templates on {date}")]
    NoRouteTemplates { office_id: i64, date: NaiveDate },
}

/// Load/store access to previously persisted optimization states.
pub trait OptimizationStateRepository: Send + Sync {
    fn find_by_id(&self, id: OptimizationStateId) -> Result<OptimizationState, RepositoryError>;

    fn save(&self, state: &OptimizationState) -> Result<(), RepositoryError>;
}

/// Assembles a fresh pre-optimization state from source data.
///
/// Returns [`SourceDataError`] when the office/date pair cannot yield a
/// plannable state, for example a day with routes but no appointments.
pub trait OptimizationStateResolver: Send + Sync {
    fn resolve(
        &self,
        date: NaiveDate,
        office: &Office,
        params: &OptimizationParams,
    ) -> Result<OptimizationState, SourceDataError>;
}

/// Writes a finished state back to whatever the caller treats as durable.
pub trait OptimizationStatePersister: Send + Sync {
    fn persist(&self, state: &OptimizationState) -> Result<(), RepositoryError>;
}

/// Current conditions for an office on a date.
///
/// The pipeline treats weather as advisory: a [`WeatherError`] is
/// logged and planning proceeds without conditions attached.
pub trait WeatherService: Send + Sync {
    fn current_weather(
        &self,
        office: &Office,
        date: NaiveDate,
        location: Coordinate,
    ) -> Result<WeatherInfo, WeatherError>;
}
