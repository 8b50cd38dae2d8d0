use crate::config::SearchConfig;
use crate::domain::types::{AccountId, GeoPoint, UnitType, VehicleId};
use crate::error::{RentalError, Result};
use fleetgo_common::VehicleCategory;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub owner_id: AccountId,
    pub rentable: bool,
    pub category: VehicleCategory,
    pub model: String,
    pub color: String,
    pub identifier: String,
    pub description: Option<String>,
    pub position: GeoPoint,
    pub minute_price: Option<f64>,
    pub day_price: Option<f64>,
}

impl Vehicle {
    pub fn is_owned_by(&self, account_id: AccountId) -> bool {
        self.owner_id == account_id
    }

    /// Price per unit for the requested billing granularity, if the owner set one
    pub fn unit_price(&self, unit_type: UnitType) -> Option<f64> {
        match unit_type {
            UnitType::Minutes => self.minute_price,
            UnitType::Days => self.day_price,
        }
    }

    pub fn require_unit_price(&self, unit_type: UnitType) -> Result<f64> {
        self.unit_price(unit_type)
            .ok_or_else(|| RentalError::MissingPrice {
                vehicle_id: self.id.to_string(),
                unit_type: unit_type.to_string(),
            })
    }
}

/// Attributes supplied when registering a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVehicle {
    pub owner_id: AccountId,
    pub rentable: bool,
    pub category: VehicleCategory,
    pub model: String,
    pub color: String,
    pub identifier: String,
    pub description: Option<String>,
    pub position: GeoPoint,
    pub minute_price: Option<f64>,
    pub day_price: Option<f64>,
}

impl NewVehicle {
    pub fn validate(&self) -> Result<()> {
        validate_attributes(&self.position, self.minute_price, self.day_price)
    }

    pub(crate) fn into_vehicle(self, id: VehicleId) -> Vehicle {
        Vehicle {
            id,
            owner_id: self.owner_id,
            rentable: self.rentable,
            category: self.category,
            model: self.model,
            color: self.color,
            identifier: self.identifier,
            description: self.description,
            position: self.position,
            minute_price: self.minute_price,
            day_price: self.day_price,
        }
    }
}

/// Full replacement of a vehicle's mutable attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleUpdate {
    pub rentable: bool,
    pub category: VehicleCategory,
    pub model: String,
    pub color: String,
    pub identifier: String,
    pub description: Option<String>,
    pub position: GeoPoint,
    pub minute_price: Option<f64>,
    pub day_price: Option<f64>,
}

impl VehicleUpdate {
    pub fn validate(&self) -> Result<()> {
        validate_attributes(&self.position, self.minute_price, self.day_price)
    }

    /// Start from the vehicle's current attributes
    pub fn from_vehicle(vehicle: &Vehicle) -> Self {
        Self {
            rentable: vehicle.rentable,
            category: vehicle.category.clone(),
            model: vehicle.model.clone(),
            color: vehicle.color.clone(),
            identifier: vehicle.identifier.clone(),
            description: vehicle.description.clone(),
            position: vehicle.position,
            minute_price: vehicle.minute_price,
            day_price: vehicle.day_price,
        }
    }

    pub(crate) fn apply_to(self, vehicle: &mut Vehicle) {
        vehicle.rentable = self.rentable;
        vehicle.category = self.category;
        vehicle.model = self.model;
        vehicle.color = self.color;
        vehicle.identifier = self.identifier;
        vehicle.description = self.description;
        vehicle.position = self.position;
        vehicle.minute_price = self.minute_price;
        vehicle.day_price = self.day_price;
    }
}

fn validate_attributes(
    position: &GeoPoint,
    minute_price: Option<f64>,
    day_price: Option<f64>,
) -> Result<()> {
    if !position.is_finite() {
        return Err(RentalError::InvalidRequest {
            reason: "vehicle position must be finite".to_string(),
        });
    }
    for (name, price) in [("minute", minute_price), ("day", day_price)] {
        if let Some(price) = price {
            if !price.is_finite() || price < 0.0 {
                return Err(RentalError::InvalidRequest {
                    reason: format!("{name} price must be a non-negative number"),
                });
            }
        }
    }
    Ok(())
}

/// One page of a registry listing, ordered by vehicle id
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleFilter {
    pub category: Option<VehicleCategory>,
    pub offset: u32,
    pub limit: u32,
}

impl VehicleFilter {
    /// Build a page request, falling back to the configured default page size
    /// and clamping to the configured maximum.
    pub fn new(
        category: Option<VehicleCategory>,
        offset: u32,
        limit: Option<u32>,
        bounds: &SearchConfig,
    ) -> Self {
        let limit = limit
            .unwrap_or(bounds.default_page_size)
            .min(bounds.max_page_size);
        Self {
            category,
            offset,
            limit,
        }
    }

    pub fn matches(&self, vehicle: &Vehicle) -> bool {
        self.category
            .as_ref()
            .map_or(true, |category| vehicle.category == *category)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::new_vehicle;
    use super::*;

    #[test]
    fn test_unit_price_selection() {
        let mut vehicle = new_vehicle(AccountId::new(1), "Car", GeoPoint::new(0.0, 0.0))
            .into_vehicle(VehicleId::new(1));
        assert_eq!(vehicle.unit_price(UnitType::Minutes), Some(10.0));
        assert_eq!(vehicle.unit_price(UnitType::Days), Some(100.0));

        vehicle.day_price = None;
        let err = vehicle.require_unit_price(UnitType::Days).unwrap_err();
        assert!(matches!(err, RentalError::MissingPrice { .. }));
    }

    #[test]
    fn test_validation_rejects_bad_prices_and_positions() {
        let mut vehicle = new_vehicle(AccountId::new(1), "Car", GeoPoint::new(0.0, 0.0));
        vehicle.validate().unwrap();

        vehicle.minute_price = Some(-1.0);
        assert!(vehicle.validate().is_err());

        vehicle.minute_price = None;
        vehicle.position = GeoPoint::new(f64::NAN, 0.0);
        assert!(vehicle.validate().is_err());
    }

    #[test]
    fn test_filter_clamps_page_size() {
        let bounds = SearchConfig {
            default_page_size: 20,
            max_page_size: 100,
        };
        assert_eq!(VehicleFilter::new(None, 0, None, &bounds).limit, 20);
        assert_eq!(VehicleFilter::new(None, 0, Some(5), &bounds).limit, 5);
        assert_eq!(VehicleFilter::new(None, 0, Some(1000), &bounds).limit, 100);
    }

    #[test]
    fn test_filter_category_match() {
        let vehicle = new_vehicle(AccountId::new(1), "Bike", GeoPoint::new(0.0, 0.0))
            .into_vehicle(VehicleId::new(3));
        let bounds = SearchConfig::default();

        assert!(VehicleFilter::new(None, 0, None, &bounds).matches(&vehicle));
        let bike = VehicleCategory::new("Bike").unwrap();
        assert!(VehicleFilter::new(Some(bike), 0, None, &bounds).matches(&vehicle));
        let car = VehicleCategory::new("Car").unwrap();
        let cars = VehicleFilter::new(Some(car), 0, None, &bounds);
        assert!(!cars.matches(&vehicle));
    }
}
