use super::{swap_rentable, vehicle_rentable, SqliteFleetStore};
use crate::domain::types::{AccountId, GeoPoint, VehicleId};
use crate::domain::vehicles::{NewVehicle, Vehicle, VehicleFilter, VehicleUpdate};
use crate::error::{RentalError, Result};
use crate::storage::{account_not_found, vehicle_not_found, VehicleRegistry};
use async_trait::async_trait;
use fleetgo_common::VehicleCategory;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

const VEHICLE_COLUMNS: &str = "id, owner_id, rentable, category, model, color, identifier, \
     description, latitude, longitude, minute_price, day_price";

const NO_OPEN_RENT: &str =
    "NOT EXISTS (SELECT 1 FROM rents WHERE rents.vehicle_id = vehicles.id AND rents.ended_at IS NULL)";

fn vehicle_from_row(row: &SqliteRow) -> Result<Vehicle> {
    let decode = |e: sqlx::Error| RentalError::database("decode vehicle", e);

    let category: String = row.try_get("category").map_err(decode)?;
    let category = VehicleCategory::new(category).map_err(|e| RentalError::InvalidRecord {
        entity: "vehicle",
        reason: e.to_string(),
    })?;

    Ok(Vehicle {
        id: VehicleId::new(row.try_get("id").map_err(decode)?),
        owner_id: AccountId::new(row.try_get("owner_id").map_err(decode)?),
        rentable: row.try_get("rentable").map_err(decode)?,
        category,
        model: row.try_get("model").map_err(decode)?,
        color: row.try_get("color").map_err(decode)?,
        identifier: row.try_get("identifier").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        position: GeoPoint::new(
            row.try_get("latitude").map_err(decode)?,
            row.try_get("longitude").map_err(decode)?,
        ),
        minute_price: row.try_get("minute_price").map_err(decode)?,
        day_price: row.try_get("day_price").map_err(decode)?,
    })
}

impl SqliteFleetStore {
    async fn has_open_rent(&self, id: VehicleId) -> Result<bool> {
        let open: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rents WHERE vehicle_id = ? AND ended_at IS NULL",
        )
        .bind(id.as_i64())
        .fetch_one(self.pool())
        .await
        .map_err(|e| RentalError::database("has_open_rent", e))?;
        Ok(open > 0)
    }

    async fn vehicle_exists(&self, id: VehicleId) -> Result<bool> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| RentalError::database("acquire", e))?;
        Ok(vehicle_rentable(&mut conn, id).await?.is_some())
    }
}

#[async_trait]
impl VehicleRegistry for SqliteFleetStore {
    async fn get(&self, id: VehicleId) -> Result<Vehicle> {
        let row = sqlx::query(&format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE id = ?"))
            .bind(id.as_i64())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| RentalError::database("get_vehicle", e))?
            .ok_or_else(|| vehicle_not_found(id))?;

        vehicle_from_row(&row)
    }

    async fn try_set_rentable(&self, id: VehicleId, desired: bool, expected: bool) -> Result<()> {
        if !desired {
            let mut conn = self
                .pool()
                .acquire()
                .await
                .map_err(|e| RentalError::database("acquire", e))?;
            return swap_rentable(&mut conn, id, desired, expected).await;
        }

        // A release must not strand an open rent.
        let result = sqlx::query(&format!(
            "UPDATE vehicles SET rentable = ? WHERE id = ? AND rentable = ? AND {NO_OPEN_RENT}"
        ))
        .bind(desired)
        .bind(id.as_i64())
        .bind(expected)
        .execute(self.pool())
        .await
        .map_err(|e| RentalError::database("try_set_rentable", e))?;

        if result.rows_affected() == 0 {
            let current = self.get(id).await?;
            if current.rentable != expected {
                debug!(vehicle_id = %id, desired, "Rentable flag compare-and-swap lost");
                return Err(crate::storage::rentable_conflict(id, desired));
            }
            return Err(RentalError::VehicleInUse { id: id.to_string() });
        }
        Ok(())
    }

    async fn update_position(&self, id: VehicleId, position: GeoPoint) -> Result<()> {
        let result = sqlx::query("UPDATE vehicles SET latitude = ?, longitude = ? WHERE id = ?")
            .bind(position.latitude)
            .bind(position.longitude)
            .bind(id.as_i64())
            .execute(self.pool())
            .await
            .map_err(|e| RentalError::database("update_position", e))?;

        if result.rows_affected() == 0 {
            return Err(vehicle_not_found(id));
        }
        Ok(())
    }

    async fn list(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>> {
        let category = filter.category.as_ref().map(VehicleCategory::as_str);
        let rows = sqlx::query(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles \
             WHERE (? IS NULL OR category = ?) \
             ORDER BY id LIMIT ? OFFSET ?"
        ))
        .bind(category)
        .bind(category)
        .bind(i64::from(filter.limit))
        .bind(i64::from(filter.offset))
        .fetch_all(self.pool())
        .await
        .map_err(|e| RentalError::database("list_vehicles", e))?;

        rows.iter().map(vehicle_from_row).collect()
    }

    async fn list_rentable(&self, category: &str) -> Result<Vec<Vehicle>> {
        let rows = sqlx::query(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles \
             WHERE rentable = 1 AND category = ? ORDER BY id"
        ))
        .bind(category)
        .fetch_all(self.pool())
        .await
        .map_err(|e| RentalError::database("list_rentable", e))?;

        rows.iter().map(vehicle_from_row).collect()
    }

    async fn create(&self, vehicle: NewVehicle) -> Result<Vehicle> {
        vehicle.validate()?;

        let result = sqlx::query(
            r#"
            INSERT INTO vehicles (owner_id, rentable, category, model, color, identifier,
                                  description, latitude, longitude, minute_price, day_price)
            SELECT ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?
            WHERE EXISTS (SELECT 1 FROM accounts WHERE id = ?)
            "#,
        )
        .bind(vehicle.owner_id.as_i64())
        .bind(vehicle.rentable)
        .bind(vehicle.category.as_str())
        .bind(&vehicle.model)
        .bind(&vehicle.color)
        .bind(&vehicle.identifier)
        .bind(&vehicle.description)
        .bind(vehicle.position.latitude)
        .bind(vehicle.position.longitude)
        .bind(vehicle.minute_price)
        .bind(vehicle.day_price)
        .bind(vehicle.owner_id.as_i64())
        .execute(self.pool())
        .await
        .map_err(|e| RentalError::database("create_vehicle", e))?;

        if result.rows_affected() == 0 {
            return Err(account_not_found(vehicle.owner_id));
        }

        let id = VehicleId::new(result.last_insert_rowid());
        debug!(vehicle_id = %id, owner_id = %vehicle.owner_id, "Registered vehicle");
        Ok(vehicle.into_vehicle(id))
    }

    async fn update(&self, id: VehicleId, update: VehicleUpdate) -> Result<Vehicle> {
        update.validate()?;

        let result = sqlx::query(&format!(
            r#"
            UPDATE vehicles
            SET rentable = ?, category = ?, model = ?, color = ?, identifier = ?,
                description = ?, latitude = ?, longitude = ?, minute_price = ?, day_price = ?
            WHERE id = ? AND (rentable = ? OR {NO_OPEN_RENT})
            "#
        ))
        .bind(update.rentable)
        .bind(update.category.as_str())
        .bind(&update.model)
        .bind(&update.color)
        .bind(&update.identifier)
        .bind(&update.description)
        .bind(update.position.latitude)
        .bind(update.position.longitude)
        .bind(update.minute_price)
        .bind(update.day_price)
        .bind(id.as_i64())
        .bind(update.rentable)
        .execute(self.pool())
        .await
        .map_err(|e| RentalError::database("update_vehicle", e))?;

        if result.rows_affected() == 0 {
            return if self.vehicle_exists(id).await? {
                Err(RentalError::VehicleInUse { id: id.to_string() })
            } else {
                Err(vehicle_not_found(id))
            };
        }

        self.get(id).await
    }

    async fn delete(&self, id: VehicleId) -> Result<()> {
        let result = sqlx::query(&format!(
            "DELETE FROM vehicles WHERE id = ? AND {NO_OPEN_RENT}"
        ))
        .bind(id.as_i64())
        .execute(self.pool())
        .await
        .map_err(|e| RentalError::database("delete_vehicle", e))?;

        if result.rows_affected() == 0 {
            return if self.has_open_rent(id).await? && self.vehicle_exists(id).await? {
                Err(RentalError::VehicleInUse { id: id.to_string() })
            } else {
                Err(vehicle_not_found(id))
            };
        }

        debug!(vehicle_id = %id, "Deleted vehicle");
        Ok(())
    }
}
