//! Ledger schema bootstrap
//!
//! Idempotent: every statement is `IF NOT EXISTS`, so this runs on each start.

use anyhow::Result;
use sqlx::PgPool;

const CREATE_ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id          BIGSERIAL PRIMARY KEY,
    owner       VARCHAR NOT NULL,
    balance     BIGINT NOT NULL,
    currency    VARCHAR NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id          BIGSERIAL PRIMARY KEY,
    account_id  BIGINT NOT NULL REFERENCES accounts (id),
    amount      BIGINT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_TRANSFERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS transfers (
    id               BIGSERIAL PRIMARY KEY,
    from_account_id  BIGINT NOT NULL REFERENCES accounts (id),
    to_account_id    BIGINT NOT NULL REFERENCES accounts (id),
    amount           BIGINT NOT NULL CONSTRAINT transfers_amount_check CHECK (amount > 0),
    created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_INDEXES: [&str; 5] = [
    "CREATE INDEX IF NOT EXISTS accounts_owner_idx ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS entries_account_id_idx ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_account_id_idx ON transfers (from_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_to_account_id_idx ON transfers (to_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_pair_idx ON transfers (from_account_id, to_account_id)",
];

/// Create ledger tables and indexes if missing
pub async fn init_schema(pool: &PgPool) -> Result<()> {
    tracing::info!("Initializing ledger schema...");

    sqlx::query(CREATE_ACCOUNTS_TABLE)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", "Failed to create accounts table", e))?;

    sqlx::query(CREATE_ENTRIES_TABLE)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", "Failed to create entries table", e))?;

    sqlx::query(CREATE_TRANSFERS_TABLE)
        .execute(pool)
        .await
        .map_err(|e| anyhow::anyhow!("{}: {}", "Failed to create transfers table", e))?;

    for stmt in CREATE_INDEXES {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create index ({}): {}", stmt, e))?;
    }

    tracing::info!("Ledger schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_amount_is_constrained() {
        assert!(CREATE_TRANSFERS_TABLE.contains("CHECK (amount > 0)"));
    }

    #[test]
    fn test_entries_reference_accounts() {
        assert!(CREATE_ENTRIES_TABLE.contains("REFERENCES accounts (id)"));
        assert!(CREATE_TRANSFERS_TABLE.matches("REFERENCES accounts (id)").count() == 2);
    }
}
