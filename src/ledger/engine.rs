//! Transfer Engine
//!
//! Moves `amount` from one account to another inside a single transaction:
//!
//! 0. resolve both accounts (no lock)
//! 1. insert the transfer record
//! 2. insert the debit entry (`-amount` on from)
//! 3. insert the credit entry (`+amount` on to)
//! 4. lock both account rows and add the deltas, lower account id first
//!
//! Step 4 never depends on which side is "from": two transfers between the
//! same pair, in opposite directions, lock the rows in the same order and so
//! cannot wait on each other in a cycle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::coordinator::TxCoordinator;
use super::error::{LedgerError, StoreError};
use super::models::{CreateEntryParams, CreateTransferParams, TransferParams, TransferResult};
use super::queries::Queries;

pub struct TransferEngine {
    coordinator: Arc<TxCoordinator>,
}

impl TransferEngine {
    pub fn new(coordinator: Arc<TxCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Reject inputs the unit of work must never see
    pub fn validate(params: &TransferParams) -> Result<(), LedgerError> {
        if params.amount <= 0 {
            return Err(LedgerError::InvalidAmount(params.amount));
        }
        if params.from_account_id == params.to_account_id {
            return Err(LedgerError::SameAccount(params.from_account_id));
        }
        Ok(())
    }

    /// Execute a transfer. No retries: contention errors go back to the caller.
    pub async fn transfer(&self, params: TransferParams) -> Result<TransferResult, LedgerError> {
        if let Err(e) = Self::validate(&params) {
            debug!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                error = %e,
                "Transfer rejected before begin"
            );
            return Err(e);
        }

        let outcome = self
            .coordinator
            .run_in_transaction(move |q| Box::pin(transfer_tx(q, params)))
            .await;

        match &outcome {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                from_balance = result.from_account.balance,
                to_balance = result.to_account.balance,
                "Transfer committed"
            ),
            Err(e) if e.is_validation() => debug!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                error = %e,
                "Transfer rejected"
            ),
            Err(e) => warn!(
                from = params.from_account_id,
                to = params.to_account_id,
                amount = params.amount,
                code = e.code(),
                error = %e,
                "Transfer failed"
            ),
        }

        outcome
    }
}

/// Map a missing account row to the validation error callers expect
fn account_error(e: StoreError) -> LedgerError {
    match e {
        StoreError::NotFound {
            entity: "account",
            id,
        } => LedgerError::AccountNotFound(id),
        other => LedgerError::Store(other),
    }
}

/// The transfer unit of work. Must run inside a transaction.
pub async fn transfer_tx(
    q: &mut dyn Queries,
    params: TransferParams,
) -> Result<TransferResult, LedgerError> {
    // Unknown accounts are reported as AccountNotFound on every backend,
    // not as whatever constraint error the first insert would raise.
    q.get_account(params.from_account_id)
        .await
        .map_err(account_error)?;
    q.get_account(params.to_account_id)
        .await
        .map_err(account_error)?;

    let transfer = q
        .create_transfer(CreateTransferParams {
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
        })
        .await
        .map_err(account_error)?;

    let from_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.from_account_id,
            amount: -params.amount,
        })
        .await
        .map_err(account_error)?;

    let to_entry = q
        .create_entry(CreateEntryParams {
            account_id: params.to_account_id,
            amount: params.amount,
        })
        .await
        .map_err(account_error)?;

    // Lock order is by account id, not by role.
    let [(first_id, first_delta), (second_id, second_delta)] = params.lock_order();

    let first = q
        .get_account_for_update(first_id)
        .await
        .map_err(account_error)?;
    let second = q
        .get_account_for_update(second_id)
        .await
        .map_err(account_error)?;
    debug!(
        transfer_id = transfer.id,
        first = first_id,
        second = second_id,
        "Row locks acquired"
    );

    let (from, to) = if first_id == params.from_account_id {
        (&first, &second)
    } else {
        (&second, &first)
    };

    if from.currency != to.currency {
        return Err(LedgerError::CurrencyMismatch {
            from: from.id,
            from_currency: from.currency.clone(),
            to: to.id,
            to_currency: to.currency.clone(),
        });
    }
    if from.balance < params.amount {
        return Err(LedgerError::InsufficientBalance {
            account: from.id,
            balance: from.balance,
            required: params.amount,
        });
    }
    if to.balance.checked_add(params.amount).is_none() {
        return Err(LedgerError::BalanceOverflow(to.id));
    }

    let first = q
        .add_account_balance(first_id, first_delta)
        .await
        .map_err(account_error)?;
    let second = q
        .add_account_balance(second_id, second_delta)
        .await
        .map_err(account_error)?;

    let (from_account, to_account) = if first_id == params.from_account_id {
        (first, second)
    } else {
        (second, first)
    };

    let result = TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    };
    debug_assert!(result.check_invariants().is_ok());

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        assert_eq!(
            TransferEngine::validate(&TransferParams::new(1, 2, 0)),
            Err(LedgerError::InvalidAmount(0))
        );
        assert_eq!(
            TransferEngine::validate(&TransferParams::new(1, 2, -10)),
            Err(LedgerError::InvalidAmount(-10))
        );
    }

    #[test]
    fn test_validate_rejects_self_transfer() {
        assert_eq!(
            TransferEngine::validate(&TransferParams::new(3, 3, 10)),
            Err(LedgerError::SameAccount(3))
        );
    }

    #[test]
    fn test_validate_accepts_minimum_amount() {
        assert!(TransferEngine::validate(&TransferParams::new(1, 2, 1)).is_ok());
    }

    #[test]
    fn test_account_error_mapping() {
        assert_eq!(
            account_error(StoreError::not_found("account", 7)),
            LedgerError::AccountNotFound(7)
        );
        assert_eq!(
            account_error(StoreError::Deadlock("d".into())),
            LedgerError::Store(StoreError::Deadlock("d".into()))
        );
    }
}
