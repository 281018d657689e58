//! Straight-line travel matrix (fallback when OSRM is unavailable).
//!
//! Great-circle distances with an assumed average driving speed. Less
//! accurate than a road network but always available, which keeps the
//! engine runnable in tests and in offices without a routing backend.

use crate::geo::Coordinate;
use crate::traits::{TravelMatrix, TravelMatrixProvider};
use crate::units::{Distance, Duration};

/// Average driving speed assumption for time estimation.
const DEFAULT_SPEED_KMH: f64 = 40.0;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points.
pub fn straight_line_distance(from: Coordinate, to: Coordinate) -> Distance {
    Distance::from_kilometers(HaversineMatrix::haversine_km(from, to))
}

/// Haversine-based travel matrix provider.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Assumed average driving speed in km/h.
    pub speed_kmh: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            speed_kmh: DEFAULT_SPEED_KMH,
        }
    }
}

impl HaversineMatrix {
    pub fn new(speed_kmh: f64) -> Self {
        Self { speed_kmh }
    }

    /// Great-circle distance between two points in kilometers.
    fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
        let lat1_rad = from.latitude.to_radians();
        let lat2_rad = to.latitude.to_radians();
        let delta_lat = (to.latitude - from.latitude).to_radians();
        let delta_lng = (to.longitude - from.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }

    fn km_to_duration(&self, km: f64) -> Duration {
        let hours = km / self.speed_kmh;
        Duration::from_seconds((hours * 3_600.0).round().max(0.0) as u64)
    }
}

impl TravelMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, points: &[Coordinate]) -> TravelMatrix {
        let n = points.len();
        let mut durations = vec![vec![Duration::ZERO; n]; n];
        let mut distances = vec![vec![Distance::ZERO; n]; n];

        for (i, from) in points.iter().enumerate() {
            for (j, to) in points.iter().enumerate() {
                if i != j {
                    let km = Self::haversine_km(*from, *to);
                    durations[i][j] = self.km_to_duration(km);
                    distances[i][j] = Distance::from_kilometers(km);
                }
            }
        }

        TravelMatrix::new(durations, distances)
    }
}
