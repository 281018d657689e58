//! Shared fixtures for route-optimizer integration tests.
//!
//! Real Las Vegas metro places (sourced from OpenStreetMap) grouped by
//! the role they play in a test service day. Everything here is routable
//! against OSRM Nevada data.

pub mod territory;

pub use territory::*;
