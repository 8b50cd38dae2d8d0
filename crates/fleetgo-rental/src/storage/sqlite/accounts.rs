use super::SqliteFleetStore;
use crate::domain::types::AccountId;
use crate::error::{RentalError, Result};
use crate::storage::{account_not_found, AccountStore};
use async_trait::async_trait;
use tracing::debug;

impl SqliteFleetStore {
    /// Provision an account holding `initial_balance`
    pub async fn create_account(&self, initial_balance: f64) -> Result<AccountId> {
        let result = sqlx::query("INSERT INTO accounts (balance) VALUES (?)")
            .bind(initial_balance)
            .execute(self.pool())
            .await
            .map_err(|e| RentalError::database("create_account", e))?;

        let id = AccountId::new(result.last_insert_rowid());
        debug!(account_id = %id, initial_balance, "Created account");
        Ok(id)
    }
}

#[async_trait]
impl AccountStore for SqliteFleetStore {
    async fn exists(&self, id: AccountId) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| RentalError::database("account_exists", e))?;
        Ok(found.is_some())
    }

    async fn balance(&self, id: AccountId) -> Result<f64> {
        sqlx::query_scalar("SELECT balance FROM accounts WHERE id = ?")
            .bind(id.as_i64())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| RentalError::database("account_balance", e))?
            .ok_or_else(|| account_not_found(id))
    }

    async fn adjust_balance(&self, id: AccountId, delta: f64) -> Result<f64> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| RentalError::database("begin adjust_balance", e))?;

        let updated = sqlx::query("UPDATE accounts SET balance = balance + ? WHERE id = ?")
            .bind(delta)
            .bind(id.as_i64())
            .execute(&mut *tx)
            .await
            .map_err(|e| RentalError::database("adjust_balance", e))?;
        if updated.rows_affected() == 0 {
            return Err(account_not_found(id));
        }

        let balance: f64 = sqlx::query_scalar("SELECT balance FROM accounts WHERE id = ?")
            .bind(id.as_i64())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RentalError::database("read adjusted balance", e))?;

        tx.commit()
            .await
            .map_err(|e| RentalError::database("commit adjust_balance", e))?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::temp_store;
    use super::*;

    #[tokio::test]
    async fn test_account_lifecycle() {
        let (store, _file) = temp_store().await;
        let first = store.create_account(10.0).await.unwrap();
        let second = store.create_account(0.0).await.unwrap();
        assert_ne!(first, second);

        assert!(store.exists(first).await.unwrap());
        assert!(!store.exists(AccountId::new(9_999)).await.unwrap());
        assert_eq!(store.balance(first).await.unwrap(), 10.0);

        assert_eq!(store.adjust_balance(first, -12.5).await.unwrap(), -2.5);
        assert_eq!(store.balance(first).await.unwrap(), -2.5);

        let err = store
            .adjust_balance(AccountId::new(9_999), 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, RentalError::AccountNotFound { .. }));
    }

    #[tokio::test]
    async fn test_adjusted_balance_is_visible_to_later_reads() {
        let (store, _file) = temp_store().await;
        let id = store.create_account(100.0).await.unwrap();

        let mut expected = 100.0;
        for _ in 0..20 {
            expected -= 40.0;
            assert_eq!(store.adjust_balance(id, -40.0).await.unwrap(), expected);
            assert_eq!(store.balance(id).await.unwrap(), expected);
        }

        let other = store.create_account(100.0).await.unwrap();
        store.adjust_balance(other, -40.0).await.unwrap();
        let reads = futures::future::join_all((0..4).map(|_| store.balance(other))).await;
        for read in reads {
            assert_eq!(read.unwrap(), 60.0);
        }
    }
}
