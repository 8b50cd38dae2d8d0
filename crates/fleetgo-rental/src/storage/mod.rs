//! Persistence seams for the rental engine.
//!
//! Every backend implements all three traits over shared state so that a
//! rent open or close can touch vehicles, rents and balances in one atomic
//! unit.

pub mod memory;
pub mod sqlite;

use crate::domain::rentals::{Rent, RentClosure};
use crate::domain::types::{AccountId, GeoPoint, RentId, VehicleId};
use crate::domain::vehicles::{NewVehicle, Vehicle, VehicleFilter, VehicleUpdate};
use crate::error::{RentalError, Result};
use async_trait::async_trait;

pub use memory::InMemoryFleetStore;
pub use sqlite::SqliteFleetStore;

#[async_trait]
pub trait VehicleRegistry: Send + Sync {
    async fn get(&self, id: VehicleId) -> Result<Vehicle>;

    /// Compare-and-swap on the rentable flag.
    ///
    /// Fails with `VehicleUnavailable` when a claim (`desired == false`)
    /// finds the flag already cleared and `VehicleNotRented` when a release
    /// finds it already set. Releasing a vehicle that an open rent still
    /// references fails with `VehicleInUse`.
    async fn try_set_rentable(&self, id: VehicleId, desired: bool, expected: bool) -> Result<()>;

    async fn update_position(&self, id: VehicleId, position: GeoPoint) -> Result<()>;

    async fn list(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>>;

    /// Every rentable vehicle whose category is exactly `category`, by id
    async fn list_rentable(&self, category: &str) -> Result<Vec<Vehicle>>;

    async fn create(&self, vehicle: NewVehicle) -> Result<Vehicle>;

    async fn update(&self, id: VehicleId, update: VehicleUpdate) -> Result<Vehicle>;

    async fn delete(&self, id: VehicleId) -> Result<()>;
}

#[async_trait]
pub trait RentRepository: Send + Sync {
    async fn get_rent(&self, id: RentId) -> Result<Option<Rent>>;

    /// Newest first
    async fn rents_for_account(&self, account_id: AccountId) -> Result<Vec<Rent>>;

    /// Newest first
    async fn rents_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Vec<Rent>>;

    async fn open_rent_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Rent>>;

    /// Claim the rent's vehicle and persist the rent together. Nothing is
    /// written if the vehicle is missing or already claimed.
    async fn open_rent(&self, rent: &Rent) -> Result<()>;

    /// Apply `closure` atomically: end the rent, release the vehicle at the
    /// drop-off point and debit the renter. Nothing is written if any step
    /// fails.
    async fn close_rent(&self, closure: &RentClosure) -> Result<Rent>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn exists(&self, id: AccountId) -> Result<bool>;

    async fn balance(&self, id: AccountId) -> Result<f64>;

    /// Add `delta` (possibly negative) to the balance and return the new
    /// balance. No lower bound is enforced.
    async fn adjust_balance(&self, id: AccountId, delta: f64) -> Result<f64>;
}

fn rentable_conflict(id: VehicleId, desired: bool) -> RentalError {
    if desired {
        RentalError::VehicleNotRented { id: id.to_string() }
    } else {
        RentalError::VehicleUnavailable { id: id.to_string() }
    }
}

fn vehicle_not_found(id: VehicleId) -> RentalError {
    RentalError::VehicleNotFound { id: id.to_string() }
}

fn rent_not_found(id: RentId) -> RentalError {
    RentalError::RentNotFound { id: id.to_string() }
}

fn account_not_found(id: AccountId) -> RentalError {
    RentalError::AccountNotFound { id: id.to_string() }
}
