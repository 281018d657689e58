//! Weather conditions attached to an optimization run.
//!
//! Weather is an enrichment: lookups that fail are logged and the run
//! carries on without it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("weather provider request failed: {0}")]
    Request(String),
    #[error("no weather data for the requested location")]
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Rain,
    Snow,
    Storm,
}

/// Conditions around an office's service area on the plan date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherInfo {
    pub condition: WeatherCondition,
    pub temperature_celsius: f64,
    pub wind_speed_kph: f64,
}

impl WeatherInfo {
    pub fn new(condition: WeatherCondition, temperature_celsius: f64, wind_speed_kph: f64) -> Self {
        Self {
            condition,
            temperature_celsius,
            wind_speed_kph,
        }
    }

    /// Weather bad enough to slow service work down: precipitation,
    /// strong wind, or temperatures outside the workable range.
    pub fn is_severe(&self) -> bool {
        matches!(
            self.condition,
            WeatherCondition::Rain | WeatherCondition::Snow | WeatherCondition::Storm
        ) || self.wind_speed_kph > 50.0
            || self.temperature_celsius < -5.0
            || self.temperature_celsius > 40.0
    }
}
