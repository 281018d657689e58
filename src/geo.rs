//! Geographic coordinates.

use serde::{Deserialize, Serialize};

/// A WGS84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Arithmetic mean of a set of coordinates.
    ///
    /// Returns `None` for an empty slice; service-area lookups treat that as
    /// "no area to look up".
    pub fn centroid(points: &[Coordinate]) -> Option<Coordinate> {
        if points.is_empty() {
            return None;
        }

        let count = points.len() as f64;
        let lat_sum: f64 = points.iter().map(|point| point.latitude).sum();
        let lng_sum: f64 = points.iter().map(|point| point.longitude).sum();

        Some(Coordinate::new(lat_sum / count, lng_sum / count))
    }
}
