//! Simple Bank server
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│ TxCoordinator│───▶│ Gateway  │
//! │  (YAML)  │    │(PG / Mem)│    │  + Engine    │    │  (HTTP)  │
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```

use std::sync::Arc;

use anyhow::Context;

use simple_bank::config::AppConfig;
use simple_bank::db::{Database, schema};
use simple_bank::ledger::{Backend, Ledger, MemoryStore, PgStore, TxCoordinator};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

fn use_memory_mode() -> bool {
    std::env::args().any(|a| a == "--memory")
}

async fn open_backend(config: &AppConfig) -> anyhow::Result<Arc<dyn Backend>> {
    if use_memory_mode() {
        tracing::warn!("Using in-memory store; balances are lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let url = config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured (set DB_SOURCE or pass --memory)")?;
    let db = Database::connect(url, &config.database)
        .await
        .context("failed to connect to PostgreSQL")?;
    schema::init_schema(db.pool()).await?;

    let store = PgStore::new(db.pool().clone()).with_lock_timeout(config.ledger.lock_timeout());
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = simple_bank::logging::init_logging(&config);

    tracing::info!("Starting Simple Bank in {} mode", env);

    let backend = open_backend(&config).await?;
    let backend_name = backend.name();
    let coordinator = TxCoordinator::new(backend).with_deadline(config.ledger.tx_timeout());
    let ledger = Arc::new(Ledger::new(coordinator));

    if backend_name == "memory" {
        for params in config.ledger.seed_accounts.iter().cloned() {
            let account = ledger.create_account(params).await?;
            tracing::info!(
                id = account.id,
                owner = %account.owner,
                balance = account.balance,
                currency = %account.currency,
                "Seeded account"
            );
        }
    }

    let port = get_port_override().unwrap_or(config.gateway.port);
    simple_bank::gateway::run_server(&config.gateway.host, port, ledger).await
}
