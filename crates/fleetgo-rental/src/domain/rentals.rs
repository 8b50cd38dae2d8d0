use crate::domain::clock::{Clock, SystemClock};
use crate::domain::pricing;
use crate::domain::types::{AccountId, Caller, GeoPoint, RentId, UnitType, VehicleId};
use crate::error::{RentalError, Result};
use crate::storage::{AccountStore, RentRepository, VehicleRegistry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Lifecycle state of a rent. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RentStatus {
    Open,
    Closed {
        ended_at: DateTime<Utc>,
        final_price: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rent {
    pub id: RentId,
    pub vehicle_id: VehicleId,
    pub account_id: AccountId,
    pub started_at: DateTime<Utc>,
    pub unit_price: f64,
    pub unit_type: UnitType,
    pub status: RentStatus,
}

impl Rent {
    pub fn open(
        vehicle_id: VehicleId,
        account_id: AccountId,
        unit_price: f64,
        unit_type: UnitType,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RentId::new(),
            vehicle_id,
            account_id,
            started_at,
            unit_price,
            unit_type,
            status: RentStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, RentStatus::Open)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        match self.status {
            RentStatus::Open => None,
            RentStatus::Closed { ended_at, .. } => Some(ended_at),
        }
    }

    pub fn final_price(&self) -> Option<f64> {
        match self.status {
            RentStatus::Open => None,
            RentStatus::Closed { final_price, .. } => Some(final_price),
        }
    }

    /// Price the rent as of `ended_at` and describe the mutation that
    /// closes it. Fails if the rent is already closed.
    pub fn close(&self, ended_at: DateTime<Utc>, drop_off: GeoPoint) -> Result<RentClosure> {
        if !self.is_open() {
            return Err(RentalError::RentAlreadyClosed {
                id: self.id.to_string(),
            });
        }

        Ok(RentClosure {
            rent_id: self.id,
            vehicle_id: self.vehicle_id,
            account_id: self.account_id,
            ended_at,
            final_price: pricing::price(self.unit_price, self.unit_type, self.started_at, ended_at),
            drop_off,
        })
    }

    pub(crate) fn apply_closure(&mut self, closure: &RentClosure) {
        self.status = RentStatus::Closed {
            ended_at: closure.ended_at,
            final_price: closure.final_price,
        };
    }
}

/// Everything a backend must persist, as one atomic unit, to close a rent:
/// the rent's end and charge, the vehicle release at the drop-off point and
/// the renter's debit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentClosure {
    pub rent_id: RentId,
    pub vehicle_id: VehicleId,
    pub account_id: AccountId,
    pub ended_at: DateTime<Utc>,
    pub final_price: f64,
    pub drop_off: GeoPoint,
}

/// Rental lifecycle operations
#[async_trait]
pub trait RentalOperations: Send + Sync {
    async fn open_rental(
        &self,
        vehicle_id: VehicleId,
        renter: AccountId,
        unit_type: UnitType,
    ) -> Result<Rent>;

    async fn admin_open_rental(
        &self,
        caller: Caller,
        renter: AccountId,
        vehicle_id: VehicleId,
        unit_type: UnitType,
    ) -> Result<Rent>;

    async fn close_rental(
        &self,
        rent_id: RentId,
        caller: Caller,
        drop_off: GeoPoint,
    ) -> Result<Rent>;

    async fn get_rent(&self, rent_id: RentId, caller: Caller) -> Result<Rent>;

    async fn history_for_account(&self, account_id: AccountId, caller: Caller)
        -> Result<Vec<Rent>>;

    async fn history_for_vehicle(&self, vehicle_id: VehicleId, caller: Caller)
        -> Result<Vec<Rent>>;

    async fn active_rent_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Rent>>;
}

pub struct RentalManager {
    vehicles: Arc<dyn VehicleRegistry>,
    rents: Arc<dyn RentRepository>,
    accounts: Arc<dyn AccountStore>,
    clock: Arc<dyn Clock>,
}

impl RentalManager {
    pub fn new(
        vehicles: Arc<dyn VehicleRegistry>,
        rents: Arc<dyn RentRepository>,
        accounts: Arc<dyn AccountStore>,
    ) -> Self {
        Self::with_clock(vehicles, rents, accounts, Arc::new(SystemClock))
    }

    pub fn with_clock(
        vehicles: Arc<dyn VehicleRegistry>,
        rents: Arc<dyn RentRepository>,
        accounts: Arc<dyn AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            vehicles,
            rents,
            accounts,
            clock,
        }
    }

    /// Manager over a backend that implements all three stores
    pub fn from_store<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: VehicleRegistry + RentRepository + AccountStore + 'static,
    {
        Self {
            vehicles: store.clone(),
            rents: store.clone(),
            accounts: store,
            clock,
        }
    }

    async fn require_account(&self, account_id: AccountId) -> Result<()> {
        if self.accounts.exists(account_id).await? {
            Ok(())
        } else {
            Err(RentalError::AccountNotFound {
                id: account_id.to_string(),
            })
        }
    }

    async fn open_checked(
        &self,
        vehicle_id: VehicleId,
        renter: AccountId,
        unit_type: UnitType,
        allow_self_rental: bool,
    ) -> Result<Rent> {
        let vehicle = self.vehicles.get(vehicle_id).await?;
        self.require_account(renter).await?;

        if !allow_self_rental && vehicle.is_owned_by(renter) {
            return Err(RentalError::SelfRental {
                vehicle_id: vehicle_id.to_string(),
            });
        }

        // Captured from this snapshot; later price edits never reach the rent.
        let unit_price = vehicle.require_unit_price(unit_type)?;

        let rent = Rent::open(vehicle_id, renter, unit_price, unit_type, self.clock.now());
        self.rents.open_rent(&rent).await?;

        info!(
            rent_id = %rent.id,
            vehicle_id = %vehicle_id,
            account_id = %renter,
            unit_type = %unit_type,
            unit_price,
            "Opened rental"
        );

        Ok(rent)
    }
}

#[async_trait]
impl RentalOperations for RentalManager {
    async fn open_rental(
        &self,
        vehicle_id: VehicleId,
        renter: AccountId,
        unit_type: UnitType,
    ) -> Result<Rent> {
        self.open_checked(vehicle_id, renter, unit_type, false).await
    }

    async fn admin_open_rental(
        &self,
        caller: Caller,
        renter: AccountId,
        vehicle_id: VehicleId,
        unit_type: UnitType,
    ) -> Result<Rent> {
        if !caller.is_admin {
            return Err(RentalError::Forbidden {
                id: vehicle_id.to_string(),
            });
        }
        self.open_checked(vehicle_id, renter, unit_type, true).await
    }

    async fn close_rental(
        &self,
        rent_id: RentId,
        caller: Caller,
        drop_off: GeoPoint,
    ) -> Result<Rent> {
        if !drop_off.is_finite() {
            return Err(RentalError::InvalidRequest {
                reason: "drop-off position must be finite".to_string(),
            });
        }

        let rent = self.get_rent(rent_id, caller).await?;
        let closure = rent.close(self.clock.now(), drop_off)?;
        let closed = self.rents.close_rent(&closure).await?;

        info!(
            rent_id = %rent_id,
            vehicle_id = %closure.vehicle_id,
            account_id = %closure.account_id,
            final_price = closure.final_price,
            admin = caller.is_admin && caller.account_id != closure.account_id,
            "Closed rental"
        );

        Ok(closed)
    }

    async fn get_rent(&self, rent_id: RentId, caller: Caller) -> Result<Rent> {
        let Some(rent) = self.rents.get_rent(rent_id).await? else {
            return Err(RentalError::RentNotFound {
                id: rent_id.to_string(),
            });
        };

        if !caller.can_act_for(rent.account_id) {
            debug!(rent_id = %rent_id, caller = %caller.account_id, "Rent access denied");
            return Err(RentalError::Forbidden {
                id: rent_id.to_string(),
            });
        }

        Ok(rent)
    }

    async fn history_for_account(
        &self,
        account_id: AccountId,
        caller: Caller,
    ) -> Result<Vec<Rent>> {
        if !caller.can_act_for(account_id) {
            return Err(RentalError::Forbidden {
                id: account_id.to_string(),
            });
        }
        self.require_account(account_id).await?;
        self.rents.rents_for_account(account_id).await
    }

    async fn history_for_vehicle(
        &self,
        vehicle_id: VehicleId,
        caller: Caller,
    ) -> Result<Vec<Rent>> {
        self.vehicles.get(vehicle_id).await?;

        let mut rents = self.rents.rents_for_vehicle(vehicle_id).await?;
        rents.retain(|rent| caller.can_act_for(rent.account_id));
        Ok(rents)
    }

    async fn active_rent_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Rent>> {
        self.rents.open_rent_for_vehicle(vehicle_id).await
    }
}
