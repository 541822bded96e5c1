//! Ledger service: the entry point callers hold on to

use std::sync::Arc;

use super::coordinator::TxCoordinator;
use super::engine::TransferEngine;
use super::error::{LedgerError, StoreError};
use super::models::{
    Account, AccountId, CreateAccountParams, Entry, EntryId, Transfer, TransferId,
    TransferParams, TransferResult,
};
use super::queries::Backend;

pub struct Ledger {
    coordinator: Arc<TxCoordinator>,
    engine: TransferEngine,
}

impl Ledger {
    pub fn new(coordinator: TxCoordinator) -> Self {
        let coordinator = Arc::new(coordinator);
        Self {
            engine: TransferEngine::new(coordinator.clone()),
            coordinator,
        }
    }

    /// Ledger over `backend` with no transaction deadline
    pub fn with_backend(backend: Arc<dyn Backend>) -> Self {
        Self::new(TxCoordinator::new(backend))
    }

    pub fn coordinator(&self) -> &TxCoordinator {
        &self.coordinator
    }

    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError> {
        self.engine.transfer(params).await
    }

    /// Open an account. Bootstrap/test use only; not exposed over HTTP.
    pub async fn create_account(&self, params: CreateAccountParams) -> Result<Account, LedgerError> {
        self.coordinator
            .run_in_transaction(move |q| Box::pin(async move { Ok(q.create_account(params).await?) }))
            .await
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.coordinator
            .run_in_transaction(move |q| {
                Box::pin(async move {
                    q.get_account(id).await.map_err(|e| match e {
                        StoreError::NotFound { .. } => LedgerError::AccountNotFound(id),
                        other => LedgerError::Store(other),
                    })
                })
            })
            .await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer, LedgerError> {
        self.coordinator
            .run_in_transaction(move |q| {
                Box::pin(async move {
                    q.get_transfer(id).await.map_err(|e| match e {
                        StoreError::NotFound { .. } => LedgerError::TransferNotFound(id),
                        other => LedgerError::Store(other),
                    })
                })
            })
            .await
    }

    /// Missing entries come back as `Store(NotFound)` (404)
    pub async fn get_entry(&self, id: EntryId) -> Result<Entry, LedgerError> {
        self.coordinator
            .run_in_transaction(move |q| Box::pin(async move { Ok(q.get_entry(id).await?) }))
            .await
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Entry>, LedgerError> {
        self.coordinator
            .run_in_transaction(move |q| {
                Box::pin(async move { Ok(q.list_entries(account_id, limit, offset).await?) })
            })
            .await
    }

    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transfer>, LedgerError> {
        self.coordinator
            .run_in_transaction(move |q| {
                Box::pin(async move {
                    Ok(q
                        .list_transfers(from_account_id, to_account_id, limit, offset)
                        .await?)
                })
            })
            .await
    }

    pub async fn health_check(&self) -> Result<(), LedgerError> {
        Ok(self.coordinator.backend().health_check().await?)
    }
}
