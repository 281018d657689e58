//! route-optimizer core
//!
//! Plans and optimizes field-service routes: the appointments of one
//! office and day are placed onto service pro routes by pluggable
//! engines, shaped by optimization rules, and scored for comparison.

pub mod engine;
pub mod insertion;
pub mod pipeline;
pub mod post_rules;
pub mod rules;
pub mod scheduling;
pub mod simulation;
pub mod traits;

pub mod route;
pub mod service_pro;
pub mod state;
pub mod work_event;

pub mod metrics;
pub mod score;
pub mod stats;

pub mod geo;
pub mod polyline;
pub mod time_window;
pub mod units;
pub mod weather;

pub mod haversine;
pub mod osrm;
pub mod osrm_data;
