use super::{
    account_not_found, rent_not_found, rentable_conflict, vehicle_not_found, AccountStore,
    RentRepository, VehicleRegistry,
};
use crate::domain::rentals::{Rent, RentClosure};
use crate::domain::types::{AccountId, GeoPoint, RentId, VehicleId};
use crate::domain::vehicles::{NewVehicle, Vehicle, VehicleFilter, VehicleUpdate};
use crate::error::{RentalError, Result};
use async_trait::async_trait;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct FleetState {
    last_account_id: i64,
    last_vehicle_id: i64,
    balances: BTreeMap<AccountId, f64>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    rents: HashMap<RentId, Rent>,
    open_rents: HashMap<VehicleId, RentId>,
}

impl FleetState {
    fn vehicle_mut(&mut self, id: VehicleId) -> Result<&mut Vehicle> {
        self.vehicles.get_mut(&id).ok_or_else(|| vehicle_not_found(id))
    }

    fn has_open_rent(&self, id: VehicleId) -> bool {
        self.open_rents.contains_key(&id)
    }

    fn sorted_rents<F>(&self, predicate: F) -> Vec<Rent>
    where
        F: Fn(&Rent) -> bool,
    {
        let mut rents: Vec<Rent> = self
            .rents
            .values()
            .filter(|rent| predicate(*rent))
            .cloned()
            .collect();
        rents.sort_by_key(|rent| (Reverse(rent.started_at), rent.id));
        rents
    }
}

/// Process-local fleet store.
///
/// One lock guards vehicles, rents and balances, so every trait method is
/// atomic with respect to every other.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFleetStore {
    state: Arc<RwLock<FleetState>>,
}

impl InMemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_account(&self, initial_balance: f64) -> AccountId {
        let mut state = self.state.write().await;
        state.last_account_id += 1;
        let id = AccountId::new(state.last_account_id);
        state.balances.insert(id, initial_balance);
        id
    }
}

#[async_trait]
impl VehicleRegistry for InMemoryFleetStore {
    async fn get(&self, id: VehicleId) -> Result<Vehicle> {
        let state = self.state.read().await;
        state
            .vehicles
            .get(&id)
            .cloned()
            .ok_or_else(|| vehicle_not_found(id))
    }

    async fn try_set_rentable(&self, id: VehicleId, desired: bool, expected: bool) -> Result<()> {
        let mut state = self.state.write().await;
        if desired && state.has_open_rent(id) {
            return Err(RentalError::VehicleInUse { id: id.to_string() });
        }

        let vehicle = state.vehicle_mut(id)?;
        if vehicle.rentable != expected {
            debug!(vehicle_id = %id, desired, "Rentable flag compare-and-swap lost");
            return Err(rentable_conflict(id, desired));
        }
        vehicle.rentable = desired;
        Ok(())
    }

    async fn update_position(&self, id: VehicleId, position: GeoPoint) -> Result<()> {
        let mut state = self.state.write().await;
        state.vehicle_mut(id)?.position = position;
        Ok(())
    }

    async fn list(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>> {
        let state = self.state.read().await;
        Ok(state
            .vehicles
            .values()
            .filter(|vehicle| filter.matches(vehicle))
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect())
    }

    async fn list_rentable(&self, category: &str) -> Result<Vec<Vehicle>> {
        let state = self.state.read().await;
        Ok(state
            .vehicles
            .values()
            .filter(|vehicle| vehicle.rentable && vehicle.category.matches(category))
            .cloned()
            .collect())
    }

    async fn create(&self, vehicle: NewVehicle) -> Result<Vehicle> {
        vehicle.validate()?;

        let mut state = self.state.write().await;
        if !state.balances.contains_key(&vehicle.owner_id) {
            return Err(account_not_found(vehicle.owner_id));
        }

        state.last_vehicle_id += 1;
        let vehicle = vehicle.into_vehicle(VehicleId::new(state.last_vehicle_id));
        state.vehicles.insert(vehicle.id, vehicle.clone());
        Ok(vehicle)
    }

    async fn update(&self, id: VehicleId, update: VehicleUpdate) -> Result<Vehicle> {
        update.validate()?;

        let mut state = self.state.write().await;
        let in_use = state.has_open_rent(id);
        let vehicle = state.vehicle_mut(id)?;
        if in_use && update.rentable != vehicle.rentable {
            return Err(RentalError::VehicleInUse { id: id.to_string() });
        }

        update.apply_to(vehicle);
        Ok(vehicle.clone())
    }

    async fn delete(&self, id: VehicleId) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.vehicles.contains_key(&id) {
            return Err(vehicle_not_found(id));
        }
        if state.has_open_rent(id) {
            return Err(RentalError::VehicleInUse { id: id.to_string() });
        }
        state.vehicles.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RentRepository for InMemoryFleetStore {
    async fn get_rent(&self, id: RentId) -> Result<Option<Rent>> {
        let state = self.state.read().await;
        Ok(state.rents.get(&id).cloned())
    }

    async fn rents_for_account(&self, account_id: AccountId) -> Result<Vec<Rent>> {
        let state = self.state.read().await;
        Ok(state.sorted_rents(|rent| rent.account_id == account_id))
    }

    async fn rents_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Vec<Rent>> {
        let state = self.state.read().await;
        Ok(state.sorted_rents(|rent| rent.vehicle_id == vehicle_id))
    }

    async fn open_rent_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Rent>> {
        let state = self.state.read().await;
        Ok(state
            .open_rents
            .get(&vehicle_id)
            .and_then(|rent_id| state.rents.get(rent_id))
            .cloned())
    }

    async fn open_rent(&self, rent: &Rent) -> Result<()> {
        let mut state = self.state.write().await;
        let in_use = state.has_open_rent(rent.vehicle_id);
        let vehicle = state.vehicle_mut(rent.vehicle_id)?;
        if !vehicle.rentable || in_use {
            debug!(vehicle_id = %rent.vehicle_id, "Vehicle already claimed");
            return Err(rentable_conflict(rent.vehicle_id, false));
        }

        vehicle.rentable = false;
        state.open_rents.insert(rent.vehicle_id, rent.id);
        state.rents.insert(rent.id, rent.clone());
        Ok(())
    }

    async fn close_rent(&self, closure: &RentClosure) -> Result<Rent> {
        let mut state = self.state.write().await;

        // Validate everything before the first write so a failure leaves no trace.
        let rent = state
            .rents
            .get(&closure.rent_id)
            .ok_or_else(|| rent_not_found(closure.rent_id))?;
        if !rent.is_open() {
            return Err(RentalError::RentAlreadyClosed {
                id: closure.rent_id.to_string(),
            });
        }
        let vehicle = state
            .vehicles
            .get(&closure.vehicle_id)
            .ok_or_else(|| vehicle_not_found(closure.vehicle_id))?;
        if vehicle.rentable {
            return Err(rentable_conflict(closure.vehicle_id, true));
        }
        if !state.balances.contains_key(&closure.account_id) {
            return Err(account_not_found(closure.account_id));
        }

        let vehicle = state.vehicle_mut(closure.vehicle_id)?;
        vehicle.rentable = true;
        vehicle.position = closure.drop_off;

        if let Some(balance) = state.balances.get_mut(&closure.account_id) {
            *balance -= closure.final_price;
        }

        state.open_rents.remove(&closure.vehicle_id);
        let rent = state
            .rents
            .get_mut(&closure.rent_id)
            .ok_or_else(|| rent_not_found(closure.rent_id))?;
        rent.apply_closure(closure);
        Ok(rent.clone())
    }
}

#[async_trait]
impl AccountStore for InMemoryFleetStore {
    async fn exists(&self, id: AccountId) -> Result<bool> {
        let state = self.state.read().await;
        Ok(state.balances.contains_key(&id))
    }

    async fn balance(&self, id: AccountId) -> Result<f64> {
        let state = self.state.read().await;
        state
            .balances
            .get(&id)
            .copied()
            .ok_or_else(|| account_not_found(id))
    }

    async fn adjust_balance(&self, id: AccountId, delta: f64) -> Result<f64> {
        let mut state = self.state.write().await;
        let balance = state
            .balances
            .get_mut(&id)
            .ok_or_else(|| account_not_found(id))?;
        *balance += delta;
        Ok(*balance)
    }
}
