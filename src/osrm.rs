//! OSRM HTTP adapter for travel matrices.
//!
//! Asks the `table` service for both duration and distance annotations
//! in one round trip. Any transport or decode failure degrades to an
//! empty matrix; the engine turns that into a run failure with context,
//! so this adapter never panics on a flaky backend.

use serde::Deserialize;

use crate::geo::Coordinate;
use crate::traits::{TravelMatrix, TravelMatrixProvider};
use crate::units::{Distance, Duration};

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }
}

impl TravelMatrixProvider for OsrmClient {
    fn matrix_for(&self, points: &[Coordinate]) -> TravelMatrix {
        if points.is_empty() {
            return TravelMatrix::empty();
        }

        // OSRM wants lng,lat order.
        let coords = points
            .iter()
            .map(|point| format!("{:.6},{:.6}", point.longitude, point.latitude))
            .collect::<Vec<_>>()
            .join(";");

        let url = format!(
            "{}/table/v1/{}/{}?annotations=duration,distance",
            self.config.base_url, self.config.profile, coords
        );

        let response = self
            .client
            .get(url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>());

        match response {
            Ok(body) => {
                let durations: Vec<Vec<Duration>> = body
                    .durations
                    .unwrap_or_default()
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|seconds| Duration::from_seconds(seconds.round().max(0.0) as u64))
                            .collect()
                    })
                    .collect();
                let distances: Vec<Vec<Distance>> = body
                    .distances
                    .unwrap_or_default()
                    .into_iter()
                    .map(|row| {
                        row.into_iter()
                            .map(|meters| Distance::from_meters(meters.max(0.0)))
                            .collect()
                    })
                    .collect();
                TravelMatrix::new(durations, distances)
            }
            Err(error) => {
                tracing::warn!(error = %error, "osrm table request failed");
                TravelMatrix::empty()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmTableResponse {
    durations: Option<Vec<Vec<f64>>>,
    distances: Option<Vec<Vec<f64>>>,
}
