use super::{decode_timestamp, encode_timestamp, swap_rentable, SqliteFleetStore};
use crate::domain::rentals::{Rent, RentClosure, RentStatus};
use crate::domain::types::{AccountId, RentId, UnitType, VehicleId};
use crate::error::{RentalError, Result};
use crate::storage::{account_not_found, rent_not_found, vehicle_not_found, RentRepository};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};
use std::str::FromStr;
use tracing::debug;

const RENT_COLUMNS: &str =
    "id, vehicle_id, account_id, started_at, ended_at, unit_price, unit_type, final_price";

fn invalid(reason: String) -> RentalError {
    RentalError::InvalidRecord {
        entity: "rent",
        reason,
    }
}

fn rent_from_row(row: &SqliteRow) -> Result<Rent> {
    let decode = |e: sqlx::Error| RentalError::database("decode rent", e);

    let id: String = row.try_get("id").map_err(decode)?;
    let id = RentId::from_str(&id).map_err(|e| invalid(format!("bad rent id '{id}': {e}")))?;

    let unit_type: String = row.try_get("unit_type").map_err(decode)?;
    let unit_type = UnitType::from_str(&unit_type).map_err(|e| invalid(e.to_string()))?;

    let started_at: String = row.try_get("started_at").map_err(decode)?;
    let ended_at: Option<String> = row.try_get("ended_at").map_err(decode)?;
    let final_price: Option<f64> = row.try_get("final_price").map_err(decode)?;

    let status = match (ended_at, final_price) {
        (None, None) => RentStatus::Open,
        (Some(ended_at), Some(final_price)) => RentStatus::Closed {
            ended_at: decode_timestamp("rent", &ended_at)?,
            final_price,
        },
        _ => {
            return Err(invalid(format!(
                "rent {id} has only one of end time and final price"
            )))
        }
    };

    Ok(Rent {
        id,
        vehicle_id: VehicleId::new(row.try_get("vehicle_id").map_err(decode)?),
        account_id: AccountId::new(row.try_get("account_id").map_err(decode)?),
        started_at: decode_timestamp("rent", &started_at)?,
        unit_price: row.try_get("unit_price").map_err(decode)?,
        unit_type,
        status,
    })
}

async fn fetch_rent(conn: &mut SqliteConnection, id: RentId) -> Result<Option<Rent>> {
    let row = sqlx::query(&format!("SELECT {RENT_COLUMNS} FROM rents WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RentalError::database("get_rent", e))?;

    row.as_ref().map(rent_from_row).transpose()
}

impl SqliteFleetStore {
    async fn fetch_rents(&self, filter_column: &str, value: i64) -> Result<Vec<Rent>> {
        let rows = sqlx::query(&format!(
            "SELECT {RENT_COLUMNS} FROM rents WHERE {filter_column} = ? \
             ORDER BY started_at DESC, id ASC"
        ))
        .bind(value)
        .fetch_all(self.pool())
        .await
        .map_err(|e| RentalError::database("list_rents", e))?;

        rows.iter().map(rent_from_row).collect()
    }
}

#[async_trait]
impl RentRepository for SqliteFleetStore {
    async fn get_rent(&self, id: RentId) -> Result<Option<Rent>> {
        let mut conn = self
            .pool()
            .acquire()
            .await
            .map_err(|e| RentalError::database("acquire", e))?;
        fetch_rent(&mut conn, id).await
    }

    async fn rents_for_account(&self, account_id: AccountId) -> Result<Vec<Rent>> {
        self.fetch_rents("account_id", account_id.as_i64()).await
    }

    async fn rents_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Vec<Rent>> {
        self.fetch_rents("vehicle_id", vehicle_id.as_i64()).await
    }

    async fn open_rent_for_vehicle(&self, vehicle_id: VehicleId) -> Result<Option<Rent>> {
        let row = sqlx::query(&format!(
            "SELECT {RENT_COLUMNS} FROM rents WHERE vehicle_id = ? AND ended_at IS NULL"
        ))
        .bind(vehicle_id.as_i64())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| RentalError::database("open_rent_for_vehicle", e))?;

        row.as_ref().map(rent_from_row).transpose()
    }

    async fn open_rent(&self, rent: &Rent) -> Result<()> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| RentalError::database("begin open_rent", e))?;

        // Claim first; losing the swap rolls back when `tx` drops.
        if let Err(e) = swap_rentable(&mut tx, rent.vehicle_id, false, true).await {
            debug!(vehicle_id = %rent.vehicle_id, error = %e, "Vehicle claim failed");
            return Err(e);
        }

        sqlx::query(
            r#"
            INSERT INTO rents (id, vehicle_id, account_id, started_at, unit_price, unit_type)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(rent.id.to_string())
        .bind(rent.vehicle_id.as_i64())
        .bind(rent.account_id.as_i64())
        .bind(encode_timestamp(rent.started_at))
        .bind(rent.unit_price)
        .bind(rent.unit_type.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| RentalError::database("insert_rent", e))?;

        tx.commit()
            .await
            .map_err(|e| RentalError::database("commit open_rent", e))?;
        Ok(())
    }

    async fn close_rent(&self, closure: &RentClosure) -> Result<Rent> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| RentalError::database("begin close_rent", e))?;

        let ended = sqlx::query(
            "UPDATE rents SET ended_at = ?, final_price = ? WHERE id = ? AND ended_at IS NULL",
        )
        .bind(encode_timestamp(closure.ended_at))
        .bind(closure.final_price)
        .bind(closure.rent_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| RentalError::database("end_rent", e))?;

        if ended.rows_affected() == 0 {
            return match fetch_rent(&mut tx, closure.rent_id).await? {
                None => Err(rent_not_found(closure.rent_id)),
                Some(_) => Err(RentalError::RentAlreadyClosed {
                    id: closure.rent_id.to_string(),
                }),
            };
        }

        swap_rentable(&mut tx, closure.vehicle_id, true, false).await?;

        let moved = sqlx::query("UPDATE vehicles SET latitude = ?, longitude = ? WHERE id = ?")
            .bind(closure.drop_off.latitude)
            .bind(closure.drop_off.longitude)
            .bind(closure.vehicle_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| RentalError::database("move_vehicle", e))?;
        if moved.rows_affected() == 0 {
            return Err(vehicle_not_found(closure.vehicle_id));
        }

        let debited = sqlx::query("UPDATE accounts SET balance = balance - ? WHERE id = ?")
            .bind(closure.final_price)
            .bind(closure.account_id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| RentalError::database("debit_account", e))?;
        if debited.rows_affected() == 0 {
            return Err(account_not_found(closure.account_id));
        }

        let rent = fetch_rent(&mut tx, closure.rent_id)
            .await?
            .ok_or_else(|| rent_not_found(closure.rent_id))?;

        tx.commit()
            .await
            .map_err(|e| RentalError::database("commit close_rent", e))?;
        Ok(rent)
    }
}
