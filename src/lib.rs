//! Simple Bank - transactional money transfers between ledger accounts
//!
//! # Modules
//!
//! - [`ledger`] - Accounts, entries, transfers; transaction coordinator and transfer engine
//! - [`db`] - PostgreSQL pool and schema bootstrap
//! - [`gateway`] - axum HTTP surface
//! - [`config`] - YAML configuration with environment overrides
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod db;
pub mod gateway;
pub mod ledger;
pub mod logging;

// Convenient re-exports at crate root
pub use config::{AppConfig, ConfigError};
pub use ledger::{
    Account, AccountId, Backend, Entry, Ledger, LedgerError, MemoryStore, PgStore, StoreError,
    Transfer, TransferId, TransferParams, TransferResult, TxCoordinator,
};
