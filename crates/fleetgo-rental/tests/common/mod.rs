#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use fleetgo_common::VehicleCategory;
use fleetgo_rental::config::DatabaseConfig;
use fleetgo_rental::domain::{AccountId, GeoPoint, ManualClock, NewVehicle, RentalManager, Vehicle};
use fleetgo_rental::storage::{
    AccountStore, InMemoryFleetStore, RentRepository, SqliteFleetStore, VehicleRegistry,
};
use std::sync::Arc;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Copy)]
pub enum Backend {
    Memory,
    Sqlite,
}

pub const BACKENDS: [Backend; 2] = [Backend::Memory, Backend::Sqlite];

enum Store {
    Memory(Arc<InMemoryFleetStore>),
    Sqlite(Arc<SqliteFleetStore>, NamedTempFile),
}

/// A rental manager on a fresh store with a manual clock
pub struct Harness {
    store: Store,
    pub manager: Arc<RentalManager>,
    pub clock: Arc<ManualClock>,
    pub vehicles: Arc<dyn VehicleRegistry>,
    pub rents: Arc<dyn RentRepository>,
    pub accounts: Arc<dyn AccountStore>,
}

impl Harness {
    pub async fn new(backend: Backend) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 9, 14, 8, 0, 0).unwrap(),
        ));

        match backend {
            Backend::Memory => {
                let store = Arc::new(InMemoryFleetStore::new());
                Self {
                    manager: Arc::new(RentalManager::from_store(store.clone(), clock.clone())),
                    clock,
                    vehicles: store.clone(),
                    rents: store.clone(),
                    accounts: store.clone(),
                    store: Store::Memory(store),
                }
            }
            Backend::Sqlite => {
                let file = NamedTempFile::new().unwrap();
                let config = DatabaseConfig {
                    url: format!("sqlite://{}", file.path().display()),
                    ..DatabaseConfig::default()
                };
                let store = Arc::new(SqliteFleetStore::connect(&config).await.unwrap());
                Self {
                    manager: Arc::new(RentalManager::from_store(store.clone(), clock.clone())),
                    clock,
                    vehicles: store.clone(),
                    rents: store.clone(),
                    accounts: store.clone(),
                    store: Store::Sqlite(store, file),
                }
            }
        }
    }

    pub async fn account(&self, balance: f64) -> AccountId {
        match &self.store {
            Store::Memory(store) => store.create_account(balance).await,
            Store::Sqlite(store, _) => store.create_account(balance).await.unwrap(),
        }
    }

    pub async fn vehicle(&self, owner: AccountId, category: &str, position: GeoPoint) -> Vehicle {
        self.vehicles
            .create(new_vehicle(owner, category, position))
            .await
            .unwrap()
    }

    /// Vehicles whose rentable flag disagrees with the presence of an open rent
    pub async fn invariant_violations(&self, vehicles: &[Vehicle]) -> Vec<Vehicle> {
        let mut broken = Vec::new();
        for vehicle in vehicles {
            let current = self.vehicles.get(vehicle.id).await.unwrap();
            let open = self.rents.open_rent_for_vehicle(vehicle.id).await.unwrap();
            if current.rentable == open.is_some() {
                broken.push(current);
            }
        }
        broken
    }
}

pub fn new_vehicle(owner: AccountId, category: &str, position: GeoPoint) -> NewVehicle {
    NewVehicle {
        owner_id: owner,
        rentable: true,
        category: VehicleCategory::new(category).unwrap(),
        model: "Transit".to_string(),
        color: "White".to_string(),
        identifier: "K777KK".to_string(),
        description: None,
        position,
        minute_price: Some(10.0),
        day_price: Some(100.0),
    }
}
