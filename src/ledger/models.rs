//! Ledger records: accounts, transfers and their paired entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account identity. Also the key of the global lock order.
pub type AccountId = i64;
pub type TransferId = i64;
pub type EntryId = i64;

/// Bank account. Only `balance` is mutable, and only through
/// [`Queries::add_account_balance`](super::queries::Queries::add_account_balance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Minor currency units
    pub balance: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only ledger line. Negative amount = debit, positive = credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Write-once record of a fund movement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntryParams {
    pub account_id: AccountId,
    pub amount: i64,
}

/// Input of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Account ids in lock-acquisition order (lower id first).
    ///
    /// Each element carries the balance delta for that account, so callers can
    /// lock and update without caring which side is "from".
    pub fn lock_order(&self) -> [(AccountId, i64); 2] {
        let debit = (self.from_account_id, -self.amount);
        let credit = (self.to_account_id, self.amount);
        if self.from_account_id < self.to_account_id {
            [debit, credit]
        } else {
            [credit, debit]
        }
    }
}

/// Everything a successful transfer produced.
///
/// Account snapshots are taken after the balance update, inside the
/// transaction that committed them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl TransferResult {
    /// Check the double-entry invariants tying the five records together.
    pub fn check_invariants(&self) -> Result<(), String> {
        let t = &self.transfer;
        if t.amount <= 0 {
            return Err(format!(
                "transfer {} has non-positive amount {}",
                t.id, t.amount
            ));
        }
        if self.from_entry.account_id != t.from_account_id
            || self.from_account.id != t.from_account_id
        {
            return Err(format!(
                "transfer {}: debit side not tied to account {}",
                t.id, t.from_account_id
            ));
        }
        if self.to_entry.account_id != t.to_account_id || self.to_account.id != t.to_account_id {
            return Err(format!(
                "transfer {}: credit side not tied to account {}",
                t.id, t.to_account_id
            ));
        }
        if self.from_entry.amount != -t.amount || self.to_entry.amount != t.amount {
            return Err(format!(
                "transfer {}: entries {} / {} do not offset amount {}",
                t.id, self.from_entry.amount, self.to_entry.amount, t.amount
            ));
        }
        if self.from_entry.amount + self.to_entry.amount != 0 {
            return Err(format!("transfer {}: entries do not sum to zero", t.id));
        }
        if self.from_account.balance < 0 {
            return Err(format!("account {} went negative", self.from_account.id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(id: AccountId, balance: i64) -> Account {
        Account {
            id,
            owner: format!("owner-{id}"),
            balance,
            currency: "USD".to_string(),
            created_at: Utc::now(),
        }
    }

    fn entry(id: EntryId, account_id: AccountId, amount: i64) -> Entry {
        Entry {
            id,
            account_id,
            amount,
            created_at: Utc::now(),
        }
    }

    fn result(from: AccountId, to: AccountId, amount: i64) -> TransferResult {
        TransferResult {
            transfer: Transfer {
                id: 1,
                from_account_id: from,
                to_account_id: to,
                amount,
                created_at: Utc::now(),
            },
            from_account: account(from, 90),
            to_account: account(to, 60),
            from_entry: entry(1, from, -amount),
            to_entry: entry(2, to, amount),
        }
    }

    #[test]
    fn test_lock_order_lower_id_first() {
        let forward = TransferParams::new(1, 2, 10);
        assert_eq!(forward.lock_order(), [(1, -10), (2, 10)]);

        let backward = TransferParams::new(2, 1, 10);
        assert_eq!(backward.lock_order(), [(1, 10), (2, -10)]);
    }

    #[test]
    fn test_opposite_directions_share_lock_order() {
        let a = TransferParams::new(7, 3, 5).lock_order();
        let b = TransferParams::new(3, 7, 5).lock_order();
        assert_eq!(a[0].0, b[0].0);
        assert_eq!(a[1].0, b[1].0);
    }

    #[test]
    fn test_invariants_hold_for_paired_entries() {
        assert!(result(1, 2, 10).check_invariants().is_ok());
    }

    #[test]
    fn test_invariants_reject_unbalanced_entries() {
        let mut r = result(1, 2, 10);
        r.to_entry.amount = 9;
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn test_invariants_reject_swapped_accounts() {
        let mut r = result(1, 2, 10);
        r.from_entry.account_id = 2;
        assert!(r.check_invariants().is_err());
    }

    #[test]
    fn test_transfer_result_field_names() {
        let json = serde_json::to_value(result(1, 2, 10)).unwrap();
        for key in ["transfer", "from_account", "to_account", "from_entry", "to_entry"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["transfer"]["from_account_id"], 1);
        assert_eq!(json["from_entry"]["amount"], -10);
    }
}
