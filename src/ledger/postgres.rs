//! PostgreSQL backend
//!
//! Row locks are `SELECT ... FOR NO KEY UPDATE`: strong enough to serialize
//! balance updates, weak enough not to block the `FOR KEY SHARE` locks that
//! entry/transfer foreign keys take on the same rows.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use super::error::StoreError;
use super::models::{
    Account, AccountId, CreateAccountParams, CreateEntryParams, CreateTransferParams, Entry,
    EntryId, Transfer, TransferId,
};
use super::queries::{Backend, Queries, Transaction};

const ACCOUNT_COLUMNS: &str = "id, owner, balance, currency, created_at";
const TRANSFER_COLUMNS: &str = "id, from_account_id, to_account_id, amount, created_at";
const ENTRY_COLUMNS: &str = "id, account_id, amount, created_at";

/// Transactional ledger store over a Postgres pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    lock_timeout: Option<Duration>,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: None,
        }
    }

    /// Applied with `SET LOCAL lock_timeout` at the start of each transaction
    pub fn with_lock_timeout(mut self, lock_timeout: Option<Duration>) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }
}

#[async_trait]
impl Backend for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let mut tx = self.pool.begin().await?;
        if let Some(lock_timeout) = self.lock_timeout {
            // SET does not accept bind parameters; the value is an integer.
            let stmt = format!("SET LOCAL lock_timeout = '{}ms'", lock_timeout.as_millis());
            sqlx::query(&stmt).execute(&mut *tx).await?;
        }
        Ok(Box::new(PgTx { tx }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open Postgres transaction. sqlx rolls it back if dropped uncommitted.
pub struct PgTx {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl Queries for PgTx {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "INSERT INTO accounts (owner, balance, currency) VALUES ($1, $2, $3) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(params.owner)
        .bind(params.balance)
        .bind(params.currency)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("account", id))
    }

    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1 LIMIT 1 FOR NO KEY UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("account", id))
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(&format!(
            "UPDATE accounts SET balance = balance + $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("account", id))
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        let transfer = sqlx::query_as::<_, Transfer>(&format!(
            "INSERT INTO transfers (from_account_id, to_account_id, amount) VALUES ($1, $2, $3) RETURNING {TRANSFER_COLUMNS}"
        ))
        .bind(params.from_account_id)
        .bind(params.to_account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError> {
        sqlx::query_as::<_, Transfer>(&format!(
            "SELECT {TRANSFER_COLUMNS} FROM transfers WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("transfer", id))
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        let entry = sqlx::query_as::<_, Entry>(&format!(
            "INSERT INTO entries (account_id, amount) VALUES ($1, $2) RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(params.account_id)
        .bind(params.amount)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError> {
        sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = $1 LIMIT 1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::not_found("entry", id))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError> {
        let entries = sqlx::query_as::<_, Entry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE account_id = $1 ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>, StoreError> {
        let transfers = sqlx::query_as::<_, Transfer>(&format!(
            r#"SELECT {TRANSFER_COLUMNS} FROM transfers
               WHERE (from_account_id = $1 AND to_account_id = $2)
                  OR (from_account_id = $2 AND to_account_id = $1)
               ORDER BY id LIMIT $3 OFFSET $4"#
        ))
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(transfers)
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }

    fn queries(&mut self) -> &mut dyn Queries {
        self
    }
}
