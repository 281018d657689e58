//! Route geometry as a decoded coordinate sequence.
//!
//! Encoding to and from the compact polyline wire format happens at API
//! boundaries (OSRM responses, frontend payloads), never inside the
//! optimizer core.

use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;

/// The shape a route traces on the map, stop by stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    points: Vec<Coordinate>,
}

impl Polyline {
    pub fn new(points: Vec<Coordinate>) -> Self {
        Self { points }
    }

    /// Builds the geometry from an already-ordered stop sequence.
    pub fn from_stops(stops: impl IntoIterator<Item = Coordinate>) -> Self {
        Self {
            points: stops.into_iter().collect(),
        }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Coordinate> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
