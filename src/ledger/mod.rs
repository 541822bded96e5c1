//! Ledger: accounts, entries and atomic transfers
//!
//! # Architecture
//!
//! ```text
//! Ledger ──▶ TransferEngine ──▶ TxCoordinator ──▶ Backend::begin()
//!                                     │                 │
//!                                     ▼                 ▼
//!                              unit of work ◀── Box<dyn Transaction>
//!                                                (PgStore / MemoryStore)
//! ```
//!
//! # Invariants
//!
//! 1. **Atomicity**: transfer record, both entries and both balance updates
//!    commit together or not at all
//! 2. **Conservation**: the two entries of a transfer sum to zero
//! 3. **Lock Ordering**: account rows are locked lowest id first

pub mod coordinator;
pub mod engine;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod queries;
pub mod service;


// Re-exports for convenience
pub use coordinator::TxCoordinator;
pub use engine::{TransferEngine, transfer_tx};
pub use error::{LedgerError, StoreError};
pub use memory::MemoryStore;
pub use models::{
    Account, AccountId, CreateAccountParams, CreateEntryParams, CreateTransferParams, Entry,
    EntryId, Transfer, TransferId, TransferParams, TransferResult,
};
pub use postgres::PgStore;
pub use queries::{Backend, Queries, Transaction};
pub use service::Ledger;
