use std::sync::Arc;

use crate::ledger::Ledger;

/// Gateway application state (shared across handlers)
#[derive(Clone)]
pub struct AppState {
    /// Ledger service; owns the store handle and transaction coordinator
    pub ledger: Arc<Ledger>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }
}
