use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;

use crate::ledger::{Account, AccountId, Transfer, TransferId, TransferResult};

use super::state::AppState;
use super::types::{ApiError, ApiResponse, ApiResult, TransferRequest, error_codes, ok};

/// POST /transfers
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> ApiResult<TransferResult> {
    let Json(req) = body.map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e)))?;
    let params = req.validate()?;

    let result = state.ledger.transfer(params).await?;
    ok(result)
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<AccountId>,
) -> ApiResult<Account> {
    ok(state.ledger.get_account(id).await?)
}

/// GET /transfers/{id}
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TransferId>,
) -> ApiResult<Transfer> {
    ok(state.ledger.get_transfer(id).await?)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub backend: &'static str,
    pub timestamp_ms: u64,
}

/// GET /health
///
/// - Healthy: 200 + {code: 0, data: {backend, timestamp_ms}}
/// - Unhealthy: 503 + {code: 5001, msg: "unavailable"}
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    match state.ledger.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(HealthResponse {
                backend: state.ledger.coordinator().backend().name(),
                timestamp_ms: now_ms,
            })),
        ),
        Err(e) => {
            tracing::error!("[HEALTH] store ping failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    code: error_codes::SERVICE_UNAVAILABLE,
                    msg: "unavailable".to_string(),
                    data: None,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{CreateAccountParams, Ledger, MemoryStore};
    use axum::response::IntoResponse;

    async fn setup() -> (Arc<AppState>, Account, Account) {
        let ledger = Ledger::with_backend(Arc::new(MemoryStore::new()));
        let open = |owner: &str, balance| CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency: "USD".to_string(),
        };
        let a = ledger.create_account(open("alice", 100)).await.unwrap();
        let b = ledger.create_account(open("bob", 50)).await.unwrap();
        (Arc::new(AppState::new(Arc::new(ledger))), a, b)
    }

    fn request(
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<Json<TransferRequest>, JsonRejection> {
        Ok(Json(TransferRequest {
            from_account_id: from,
            to_account_id: to,
            amount,
        }))
    }

    #[tokio::test]
    async fn test_create_transfer_ok() {
        let (state, a, b) = setup().await;
        let (status, Json(resp)) =
            create_transfer(State(state.clone()), request(a.id, b.id, 10))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.code, 0);
        let result = resp.data.unwrap();
        assert_eq!(result.from_account.balance, 90);
        assert_eq!(result.to_account.balance, 60);
        assert_eq!(result.from_entry.amount, -10);
        assert_eq!(result.to_entry.amount, 10);

        let (_, Json(acc)) = get_account(State(state.clone()), Path(a.id)).await.unwrap();
        assert_eq!(acc.data.unwrap().balance, 90);

        let (_, Json(tr)) = get_transfer(State(state), Path(result.transfer.id))
            .await
            .unwrap();
        assert_eq!(tr.data.unwrap(), result.transfer);
    }

    #[tokio::test]
    async fn test_create_transfer_rejections() {
        let (state, a, b) = setup().await;

        let err = create_transfer(State(state.clone()), request(a.id, b.id, 0))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = create_transfer(State(state.clone()), request(a.id, a.id, 5))
            .await
            .unwrap_err();
        assert_eq!(err.code, error_codes::INVALID_PARAMETER);

        let err = create_transfer(State(state.clone()), request(a.id, b.id, 1_000))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code, error_codes::INSUFFICIENT_BALANCE);

        let err = create_transfer(State(state), request(a.id, 404, 5))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_missing_resources() {
        let (state, _, _) = setup().await;
        let err = get_account(State(state.clone()), Path(999)).await.unwrap_err();
        assert_eq!(err.code, error_codes::ACCOUNT_NOT_FOUND);
        let err = get_transfer(State(state), Path(999)).await.unwrap_err();
        assert_eq!(err.code, error_codes::TRANSFER_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_check() {
        let (state, _, _) = setup().await;
        let (status, Json(resp)) = health_check(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.data.unwrap().backend, "memory");
    }
}
