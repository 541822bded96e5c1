//! HTTP gateway
//!
//! | Method | Path              | Handler                    |
//! |--------|-------------------|----------------------------|
//! | POST   | `/transfers`      | [`handlers::create_transfer`] |
//! | GET    | `/accounts/{id}`  | [`handlers::get_account`]  |
//! | GET    | `/transfers/{id}` | [`handlers::get_transfer`] |
//! | GET    | `/health`         | [`handlers::health_check`] |

pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;

use crate::ledger::Ledger;
use state::AppState;

/// Build the gateway router over `ledger`
pub fn router(ledger: Arc<Ledger>) -> Router {
    let state = Arc::new(AppState::new(ledger));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/transfers", post(handlers::create_transfer))
        .route("/transfers/{id}", get(handlers::get_transfer))
        .route("/accounts/{id}", get(handlers::get_account))
        .with_state(state)
}

/// Start HTTP gateway server; returns when the listener fails
pub async fn run_server(host: &str, port: u16, ledger: Arc<Ledger>) -> anyhow::Result<()> {
    let app = router(ledger);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {} (port already in use?)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
