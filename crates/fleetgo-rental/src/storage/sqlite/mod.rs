//! SQLite backend.
//!
//! Every multi-row mutation runs in one sqlx transaction whose first
//! statement is a write, so the connection takes the write lock up front
//! and waits on the busy timeout instead of failing on a lock upgrade.

mod accounts;
mod rents;
mod vehicles;

use crate::config::DatabaseConfig;
use crate::domain::types::VehicleId;
use crate::error::{RentalError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone)]
pub struct SqliteFleetStore {
    pool: SqlitePool,
}

impl SqliteFleetStore {
    /// Open (creating if needed) the database at `config.url`
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| RentalError::Configuration(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout());

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| RentalError::database("connect", e))?;

        let store = Self::from_pool(pool);
        if config.run_migrations {
            store.run_migrations().await?;
        }

        info!(url = %config.url, "Connected to fleet database");
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RentalError::database("migrate", e))?;
        Ok(())
    }
}

/// Stored form of every timestamp: RFC 3339, UTC, microsecond precision.
/// The fixed width keeps lexical order equal to chronological order.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(entity: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| RentalError::InvalidRecord {
            entity,
            reason: format!("bad timestamp '{value}': {e}"),
        })
}

/// Current rentable flag of a vehicle, `None` if it does not exist
async fn vehicle_rentable(conn: &mut SqliteConnection, id: VehicleId) -> Result<Option<bool>> {
    sqlx::query_scalar::<_, bool>("SELECT rentable FROM vehicles WHERE id = ?")
        .bind(id.as_i64())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| RentalError::database("vehicle_rentable", e))
}

/// Compare-and-swap on the rentable flag without the open-rent guard; the
/// caller's transaction keeps the rent side consistent.
async fn swap_rentable(
    conn: &mut SqliteConnection,
    id: VehicleId,
    desired: bool,
    expected: bool,
) -> Result<()> {
    let result = sqlx::query("UPDATE vehicles SET rentable = ? WHERE id = ? AND rentable = ?")
        .bind(desired)
        .bind(id.as_i64())
        .bind(expected)
        .execute(&mut *conn)
        .await
        .map_err(|e| RentalError::database("swap_rentable", e))?;

    if result.rows_affected() == 0 {
        return match vehicle_rentable(conn, id).await? {
            None => Err(super::vehicle_not_found(id)),
            Some(_) => Err(super::rentable_conflict(id, desired)),
        };
    }
    Ok(())
}
