//! Query facade and transaction boundary
//!
//! The engine only ever talks to storage through these traits. A backend
//! hands out [`Transaction`]s; a transaction is itself a [`Queries`] facade
//! whose writes become visible to others only after [`Transaction::commit`].

use async_trait::async_trait;

use super::error::StoreError;
use super::models::{
    Account, AccountId, CreateAccountParams, CreateEntryParams, CreateTransferParams, Entry,
    EntryId, Transfer, TransferId,
};

/// Single-row ledger operations.
///
/// All methods are scoped to whatever connection/transaction the
/// implementor is bound to.
#[async_trait]
pub trait Queries: Send {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError>;

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError>;

    /// Read an account and take its row lock.
    ///
    /// The lock is held until the enclosing transaction commits or rolls back.
    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError>;

    /// Atomically add `delta` to the persisted balance and return the updated row.
    ///
    /// Takes the row lock if not already held.
    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, StoreError>;

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError>;

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError>;

    /// Entries of one account, oldest first
    async fn list_entries(
        &mut self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError>;

    /// Transfers between two accounts (either direction), oldest first
    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>, StoreError>;
}

/// Opaque open transaction.
///
/// Dropping a transaction without committing discards its writes and
/// releases its locks.
#[async_trait]
pub trait Transaction: Queries {
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;

    /// View this transaction as its query facade
    fn queries(&mut self) -> &mut dyn Queries;
}

/// A transactional store
#[async_trait]
pub trait Backend: Send + Sync {
    /// Get backend name for logging
    fn name(&self) -> &'static str;

    /// Begin a transaction with default isolation
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;

    /// Check the store is reachable
    async fn health_check(&self) -> Result<(), StoreError>;
}
