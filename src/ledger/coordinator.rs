//! Transaction Coordinator
//!
//! Runs a unit of work inside exactly one store transaction:
//!
//! ```text
//! begin ──▶ unit_of_work(tx) ──Ok──▶ commit ──▶ Ok(value)
//!                 │
//!                Err / deadline
//!                 ▼
//!             rollback ──Ok──▶ Err(original)
//!                 │
//!                Err ────────▶ Err(RollbackFailed { original, rollback })
//! ```
//!
//! The deadline covers `begin` and the unit of work. Commit is never cut
//! short, so a committed transaction is always reported as committed.
//!
//! Dropping the returned future mid-flight drops the transaction handle,
//! which rolls it back.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::LedgerError;
use super::queries::{Backend, Queries};

/// Opens transactions on a [`Backend`] and owns commit/rollback
pub struct TxCoordinator {
    backend: Arc<dyn Backend>,
    deadline: Option<Duration>,
}

impl TxCoordinator {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            deadline: None,
        }
    }

    /// Bound every unit of work by `deadline`; `None` disables the bound.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Execute `unit_of_work` within a transaction.
    ///
    /// The unit of work is called once with a facade bound to the transaction.
    /// On `Ok` the transaction is committed and a commit failure is returned as-is.
    /// On `Err` (or deadline expiry) the transaction is rolled back; if the
    /// rollback fails too, both errors are returned in
    /// [`LedgerError::RollbackFailed`].
    pub async fn run_in_transaction<T, F>(&self, unit_of_work: F) -> Result<T, LedgerError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn Queries) -> BoxFuture<'t, Result<T, LedgerError>> + Send,
    {
        let expires_at = self.deadline.map(|d| (Instant::now() + d, d));

        let mut tx = match expires_at {
            Some((at, d)) => match tokio::time::timeout_at(at, self.backend.begin()).await {
                Ok(tx) => tx?,
                Err(_) => {
                    warn!(backend = self.backend.name(), "deadline expired before begin");
                    return Err(LedgerError::Timeout(d.as_millis() as u64));
                }
            },
            None => self.backend.begin().await?,
        };
        debug!(backend = self.backend.name(), "transaction begun");

        let outcome = match expires_at {
            Some((at, d)) => {
                match tokio::time::timeout_at(at, unit_of_work(tx.queries())).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(LedgerError::Timeout(d.as_millis() as u64)),
                }
            }
            None => unit_of_work(tx.queries()).await,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!(backend = self.backend.name(), "transaction committed");
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => {
                    debug!(error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    warn!(error = %err, rollback = %rollback, "rollback failed");
                    Err(LedgerError::rollback_failed(err, rollback))
                }
            },
        }
    }
}
