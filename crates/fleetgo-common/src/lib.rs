//! Shared building blocks for FleetGo crates

pub mod logging;
pub mod types;

pub use types::{CategoryError, VehicleCategory};
