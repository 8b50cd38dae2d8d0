//! Circular-region search over rentable vehicles.
//!
//! The region test is planar: `(lat - lat0)^2 + (long - long0)^2 < radius^2`
//! with everything in raw degrees. The comparison is strict, so a vehicle
//! exactly on the boundary is outside.

use crate::domain::types::GeoPoint;
use crate::domain::vehicles::Vehicle;
use crate::error::Result;
use crate::storage::VehicleRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchArea {
    pub center: GeoPoint,
    pub radius: f64,
}

impl SearchArea {
    pub const fn new(center: GeoPoint, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        self.center.planar_distance_squared(point) < self.radius.powi(2)
    }
}

/// Whether `vehicle` should be offered to a search for `category` in `area`
pub fn is_available_in(vehicle: &Vehicle, area: &SearchArea, category: &str) -> bool {
    vehicle.rentable && vehicle.category.matches(category) && area.contains(&vehicle.position)
}

pub struct AvailabilityIndex {
    registry: Arc<dyn VehicleRegistry>,
}

impl AvailabilityIndex {
    pub fn new(registry: Arc<dyn VehicleRegistry>) -> Self {
        Self { registry }
    }

    /// Rentable vehicles of `category` inside `area`, ordered by vehicle id.
    /// An empty result is not an error.
    pub async fn find_in_range(&self, area: SearchArea, category: &str) -> Result<Vec<Vehicle>> {
        let candidates = self.registry.list_rentable(category).await?;
        let total = candidates.len();

        let found: Vec<Vehicle> = candidates
            .into_iter()
            .filter(|vehicle| is_available_in(vehicle, &area, category))
            .collect();

        debug!(
            category,
            radius = area.radius,
            candidates = total,
            matched = found.len(),
            "Availability search completed"
        );

        Ok(found)
    }
}
