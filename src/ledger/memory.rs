//! In-memory transactional backend
//!
//! Used by `--memory` mode and the test-suite. Mirrors the guarantees the
//! engine relies on from Postgres:
//!
//! - writes are staged per transaction and applied atomically on commit
//! - each account row has an async lock; once taken it is held until the
//!   transaction commits, rolls back or is dropped
//! - balance updates are increments on the committed value under that lock
//!
//! Fault switches let tests fail a specific step.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::error::StoreError;
use super::models::{
    Account, AccountId, CreateAccountParams, CreateEntryParams, CreateTransferParams, Entry,
    EntryId, Transfer, TransferId,
};
use super::queries::{Backend, Queries, Transaction};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    transfers: BTreeMap<TransferId, Transfer>,
    entries: BTreeMap<EntryId, Entry>,
    row_locks: HashMap<AccountId, Arc<RowLock<()>>>,
}

struct Inner {
    tables: Mutex<Tables>,
    // Like Postgres sequences, ids are not returned on rollback.
    next_account_id: AtomicI64,
    next_transfer_id: AtomicI64,
    next_entry_id: AtomicI64,
    fail_add_balance: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    foreign_key_errors: AtomicBool,
}

impl Inner {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }
}

/// Shared in-memory ledger store. Cheap to clone.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                tables: Mutex::new(Tables::default()),
                next_account_id: AtomicI64::new(1),
                next_transfer_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                fail_add_balance: AtomicBool::new(false),
                fail_commit: AtomicBool::new(false),
                fail_rollback: AtomicBool::new(false),
                foreign_key_errors: AtomicBool::new(false),
            }),
        }
    }

    /// Fail every `add_account_balance` call (after entries are written)
    pub fn set_fail_add_balance(&self, fail: bool) {
        self.inner.fail_add_balance.store(fail, Ordering::SeqCst);
    }

    /// Fail every commit. Staged writes are discarded.
    pub fn set_fail_commit(&self, fail: bool) {
        self.inner.fail_commit.store(fail, Ordering::SeqCst);
    }

    /// Report every rollback as failed. Staged writes are still discarded.
    pub fn set_fail_rollback(&self, fail: bool) {
        self.inner.fail_rollback.store(fail, Ordering::SeqCst);
    }

    /// Report inserts that reference a missing account the way Postgres
    /// does (`ForeignKeyViolation`) instead of `NotFound`
    pub fn set_foreign_key_errors(&self, enabled: bool) {
        self.inner.foreign_key_errors.store(enabled, Ordering::SeqCst);
    }

    // === Committed-state inspection ===

    pub fn account(&self, id: AccountId) -> Option<Account> {
        self.inner.tables().ok()?.accounts.get(&id).cloned()
    }

    pub fn account_count(&self) -> usize {
        self.inner.tables().map(|t| t.accounts.len()).unwrap_or(0)
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.inner
            .tables()
            .map(|t| t.transfers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.inner
            .tables()
            .map(|t| t.entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Sum of committed entry amounts for an account
    pub fn entry_sum(&self, account_id: AccountId) -> i64 {
        self.entries()
            .iter()
            .filter(|e| e.account_id == account_id)
            .map(|e| e.amount)
            .sum()
    }
}

#[async_trait]
impl Backend for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            accounts: BTreeMap::new(),
            transfers: Vec::new(),
            entries: Vec::new(),
            deltas: BTreeMap::new(),
            locks: HashMap::new(),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.inner.tables().map(|_| ())
    }
}

/// Open transaction on a [`MemoryStore`]
pub struct MemoryTx {
    inner: Arc<Inner>,
    /// Accounts created by this transaction
    accounts: BTreeMap<AccountId, Account>,
    transfers: Vec<Transfer>,
    entries: Vec<Entry>,
    /// Pending balance increments on committed accounts
    deltas: BTreeMap<AccountId, i64>,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
}

impl MemoryTx {
    /// Account as seen by this transaction
    fn visible_account(&self, id: AccountId) -> Result<Account, StoreError> {
        if let Some(account) = self.accounts.get(&id) {
            return Ok(account.clone());
        }
        let tables = self.inner.tables()?;
        let mut account = tables
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("account", id))?;
        account.balance += self.deltas.get(&id).copied().unwrap_or(0);
        Ok(account)
    }

    async fn lock_row(&mut self, id: AccountId) -> Result<(), StoreError> {
        if self.locks.contains_key(&id) || self.accounts.contains_key(&id) {
            return Ok(());
        }
        let row_lock = {
            let tables = self.inner.tables()?;
            tables
                .row_locks
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("account", id))?
        };
        let guard = row_lock.lock_owned().await;
        self.locks.insert(id, guard);
        Ok(())
    }

    /// Referential check for inserts pointing at `id`
    fn ensure_account(&self, id: AccountId) -> Result<(), StoreError> {
        match self.visible_account(id) {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound { .. })
                if self.inner.foreign_key_errors.load(Ordering::SeqCst) =>
            {
                Err(StoreError::ForeignKeyViolation(format!(
                    "Key (account_id)=({id}) is not present in table \"accounts\"."
                )))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Queries for MemoryTx {
    async fn create_account(&mut self, params: CreateAccountParams) -> Result<Account, StoreError> {
        let account = Account {
            id: self.inner.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.visible_account(id)
    }

    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.lock_row(id).await?;
        self.visible_account(id)
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: i64,
    ) -> Result<Account, StoreError> {
        if self.inner.fail_add_balance.load(Ordering::SeqCst) {
            return Err(StoreError::Database(
                "injected failure: add_account_balance".to_string(),
            ));
        }
        self.lock_row(id).await?;

        let current = self.visible_account(id)?;
        let updated = current.balance.checked_add(delta).ok_or_else(|| {
            StoreError::CheckViolation(format!("balance of account {id} out of range"))
        })?;

        if let Some(account) = self.accounts.get_mut(&id) {
            account.balance = updated;
        } else {
            *self.deltas.entry(id).or_insert(0) += delta;
        }
        self.visible_account(id)
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        if params.amount <= 0 {
            return Err(StoreError::CheckViolation(
                "transfers_amount_check".to_string(),
            ));
        }
        self.ensure_account(params.from_account_id)?;
        self.ensure_account(params.to_account_id)?;

        let transfer = Transfer {
            id: self.inner.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer, StoreError> {
        if let Some(t) = self.transfers.iter().find(|t| t.id == id) {
            return Ok(t.clone());
        }
        self.inner
            .tables()?
            .transfers
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("transfer", id))
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        self.ensure_account(params.account_id)?;

        let entry = Entry {
            id: self.inner.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn get_entry(&mut self, id: EntryId) -> Result<Entry, StoreError> {
        if let Some(e) = self.entries.iter().find(|e| e.id == id) {
            return Ok(e.clone());
        }
        self.inner
            .tables()?
            .entries
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("entry", id))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, StoreError> {
        let mut entries: Vec<Entry> = {
            let tables = self.inner.tables()?;
            tables
                .entries
                .values()
                .filter(|e| e.account_id == account_id)
                .cloned()
                .collect()
        };
        entries.extend(
            self.entries
                .iter()
                .filter(|e| e.account_id == account_id)
                .cloned(),
        );
        entries.sort_by_key(|e| e.id);
        Ok(page(entries, limit, offset))
    }

    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>, StoreError> {
        let between = |t: &&Transfer| {
            (t.from_account_id == from_account_id && t.to_account_id == to_account_id)
                || (t.from_account_id == to_account_id && t.to_account_id == from_account_id)
        };
        let mut transfers: Vec<Transfer> = {
            let tables = self.inner.tables()?;
            tables.transfers.values().filter(between).cloned().collect()
        };
        transfers.extend(self.transfers.iter().filter(between).cloned());
        transfers.sort_by_key(|t| t.id);
        Ok(page(transfers, limit, offset))
    }
}

fn page<T>(rows: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    rows.into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        if self.inner.fail_commit.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("injected failure: commit".to_string()));
        }

        let MemoryTx {
            inner,
            accounts,
            transfers,
            entries,
            deltas,
            locks,
        } = *self;

        {
            let mut tables = inner.tables()?;
            for (id, delta) in deltas {
                let account = tables
                    .accounts
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::not_found("account", id))?;
                account.balance += delta;
            }
            for (id, account) in accounts {
                tables.row_locks.insert(id, Arc::new(RowLock::new(())));
                tables.accounts.insert(id, account);
            }
            for t in transfers {
                tables.transfers.insert(t.id, t);
            }
            for e in entries {
                tables.entries.insert(e.id, e);
            }
        }

        // Row locks are released only once the new balances are visible.
        drop(locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        if self.inner.fail_rollback.load(Ordering::SeqCst) {
            return Err(StoreError::Connection(
                "injected failure: rollback".to_string(),
            ));
        }
        Ok(())
    }

    fn queries(&mut self) -> &mut dyn Queries {
        self
    }
}
