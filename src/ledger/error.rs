//! Ledger Error Types
//!
//! Two layers: [`StoreError`] is what the query facade and transaction
//! handles report; [`LedgerError`] is what the engine returns to callers.

use thiserror::Error;

use super::models::{AccountId, TransferId};

/// Failures reported by a storage backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Unique violation: {0}")]
    UniqueViolation(String),

    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    #[error("Lock wait timeout: {0}")]
    LockTimeout(String),

    #[error("Deadlock detected: {0}")]
    Deadlock(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        StoreError::NotFound { entity, id }
    }

    /// Missing row, or a write referencing a missing row
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::ForeignKeyViolation(_)
        )
    }

    /// Contention or connectivity problems a caller may retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::LockTimeout(_) | StoreError::Deadlock(_) | StoreError::Connection(_)
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound { entity: "row", id: 0 },
            sqlx::Error::Database(db) => {
                let msg = db.message().to_string();
                match db.code().as_deref() {
                    Some("23503") => StoreError::ForeignKeyViolation(msg),
                    Some("23505") => StoreError::UniqueViolation(msg),
                    Some("23514") => StoreError::CheckViolation(msg),
                    // lock_not_available, query_canceled (statement/lock timeout)
                    Some("55P03") | Some("57014") => StoreError::LockTimeout(msg),
                    Some("40P01") => StoreError::Deadlock(msg),
                    _ => StoreError::Database(msg),
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Connection(e.to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

/// Errors returned by the transfer engine and the ledger service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero (got {0})")]
    InvalidAmount(i64),

    #[error("Source and destination account cannot be the same ({0})")]
    SameAccount(AccountId),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Currency mismatch: account {from} is {from_currency}, account {to} is {to_currency}")]
    CurrencyMismatch {
        from: AccountId,
        from_currency: String,
        to: AccountId,
        to_currency: String,
    },

    #[error("Insufficient balance on account {account}: balance {balance}, required {required}")]
    InsufficientBalance {
        account: AccountId,
        balance: i64,
        required: i64,
    },

    #[error("Balance of account {0} would overflow")]
    BalanceOverflow(AccountId),

    #[error("Transfer not found: {0}")]
    TransferNotFound(TransferId),

    // === System Errors ===
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transaction deadline of {0} ms exceeded")]
    Timeout(u64),

    #[error("{source}; rollback failed: {rollback}")]
    RollbackFailed {
        source: Box<LedgerError>,
        rollback: StoreError,
    },
}

impl LedgerError {
    /// Compose a unit-of-work failure with the rollback failure that followed it
    pub fn rollback_failed(source: LedgerError, rollback: StoreError) -> Self {
        LedgerError::RollbackFailed {
            source: Box::new(source),
            rollback,
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount(_) => "INVALID_AMOUNT",
            LedgerError::SameAccount(_) => "SAME_ACCOUNT",
            LedgerError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            LedgerError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            LedgerError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            LedgerError::BalanceOverflow(_) => "BALANCE_OVERFLOW",
            LedgerError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            LedgerError::Store(e) if e.is_not_found() => "NOT_FOUND",
            LedgerError::Store(StoreError::LockTimeout(_)) => "LOCK_TIMEOUT",
            LedgerError::Store(StoreError::Deadlock(_)) => "DEADLOCK",
            LedgerError::Store(StoreError::Connection(_)) => "SERVICE_UNAVAILABLE",
            LedgerError::Store(_) => "DATABASE_ERROR",
            LedgerError::Timeout(_) => "TIMEOUT",
            LedgerError::RollbackFailed { .. } => "ROLLBACK_FAILED",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            LedgerError::InvalidAmount(_) | LedgerError::SameAccount(_) => 400,
            LedgerError::AccountNotFound(_) | LedgerError::TransferNotFound(_) => 404,
            LedgerError::Store(e) if e.is_not_found() => 404,
            LedgerError::CurrencyMismatch { .. }
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::BalanceOverflow(_) => 422,
            LedgerError::Store(e) if e.is_transient() => 503,
            LedgerError::Timeout(_) => 503,
            LedgerError::Store(_) | LedgerError::RollbackFailed { .. } => 500,
        }
    }

    /// True for errors raised by input checks rather than the store
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidAmount(_)
                | LedgerError::SameAccount(_)
                | LedgerError::AccountNotFound(_)
                | LedgerError::CurrencyMismatch { .. }
                | LedgerError::InsufficientBalance { .. }
                | LedgerError::BalanceOverflow(_)
                | LedgerError::TransferNotFound(_)
        )
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::Store(StoreError::from(e))
    }
}
