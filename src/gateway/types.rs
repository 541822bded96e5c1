//! API request/response types and error mapping
//!
//! - `ApiResponse<T>`: unified response wrapper
//! - `ApiError`: handler error, rendered as an `ApiResponse<()>`
//! - `error_codes`: numeric codes carried in `ApiResponse::code`

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::ledger::{AccountId, LedgerError, StoreError, TransferParams};

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or absent (error)
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

/// Wrap `data` in a 200 success envelope
pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

// ============================================================================
// Requests
// ============================================================================

/// POST /transfers body
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

impl TransferRequest {
    /// Reject obviously bad input before opening a transaction
    pub fn validate(self) -> Result<TransferParams, ApiError> {
        if self.amount <= 0 {
            return Err(ApiError::bad_request("amount must be greater than zero"));
        }
        if self.from_account_id == self.to_account_id {
            return Err(ApiError::bad_request(
                "from_account_id and to_account_id must differ",
            ));
        }
        Ok(TransferParams::new(
            self.from_account_id,
            self.to_account_id,
            self.amount,
        ))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = StatusCode::from_u16(e.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = match &e {
            LedgerError::InvalidAmount(_) | LedgerError::SameAccount(_) => {
                error_codes::INVALID_PARAMETER
            }
            LedgerError::InsufficientBalance { .. } => error_codes::INSUFFICIENT_BALANCE,
            LedgerError::CurrencyMismatch { .. } => error_codes::CURRENCY_MISMATCH,
            LedgerError::BalanceOverflow(_) => error_codes::BALANCE_OVERFLOW,
            LedgerError::AccountNotFound(_) => error_codes::ACCOUNT_NOT_FOUND,
            LedgerError::Store(se) if se.is_not_found() => error_codes::ACCOUNT_NOT_FOUND,
            LedgerError::TransferNotFound(_) => error_codes::TRANSFER_NOT_FOUND,
            LedgerError::Timeout(_) | LedgerError::Store(StoreError::LockTimeout(_)) => {
                error_codes::TIMEOUT
            }
            LedgerError::Store(se) if se.is_transient() => error_codes::SERVICE_UNAVAILABLE,
            LedgerError::Store(_) | LedgerError::RollbackFailed { .. } => {
                error_codes::INTERNAL_ERROR
            }
        };
        // Store internals (constraint names, SQL text) stay in the log.
        if status.is_server_error() {
            tracing::error!(code = e.code(), "request failed: {}", e);
        }
        let msg = match &e {
            LedgerError::Store(_) | LedgerError::RollbackFailed { .. } => e.code().to_string(),
            _ => e.to_string(),
        };
        Self::new(status, code, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.code, self.msg))).into_response()
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const CURRENCY_MISMATCH: i32 = 1003;
    pub const BALANCE_OVERFLOW: i32 = 1004;

    // Resource errors (4xxx)
    pub const ACCOUNT_NOT_FOUND: i32 = 4001;
    pub const TRANSFER_NOT_FOUND: i32 = 4002;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
    pub const TIMEOUT: i32 = 5002;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_request_validation() {
        let req = TransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 10,
        };
        assert_eq!(req.validate().unwrap(), TransferParams::new(1, 2, 10));

        let zero = TransferRequest { amount: 0, ..req };
        assert_eq!(zero.validate().unwrap_err().code, error_codes::INVALID_PARAMETER);

        let same = TransferRequest {
            to_account_id: 1,
            ..req
        };
        assert_eq!(same.validate().unwrap_err().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_ledger_error_mapping() {
        let e = ApiError::from(LedgerError::InsufficientBalance {
            account: 1,
            balance: 5,
            required: 10,
        });
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code, error_codes::INSUFFICIENT_BALANCE);

        let e = ApiError::from(LedgerError::AccountNotFound(7));
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, error_codes::ACCOUNT_NOT_FOUND);

        let e = ApiError::from(LedgerError::Store(StoreError::ForeignKeyViolation(
            "entries_account_id_fkey".into(),
        )));
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.msg, "NOT_FOUND");
        assert!(!e.msg.contains("fkey"));

        let e = ApiError::from(LedgerError::Timeout(3000));
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(e.code, error_codes::TIMEOUT);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let e = ApiError::from(LedgerError::Store(StoreError::Database(
            "relation \"accounts\" does not exist".into(),
        )));
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.code, error_codes::INTERNAL_ERROR);
        assert_eq!(e.msg, "DATABASE_ERROR");
    }

    #[test]
    fn test_envelope_serialization() {
        let json = serde_json::to_value(ApiResponse::<()>::error(1001, "bad")).unwrap();
        assert_eq!(json["code"], 1001);
        assert!(json.get("data").is_none());

        let json = serde_json::to_value(ApiResponse::success(5)).unwrap();
        assert_eq!(json["code"], error_codes::SUCCESS);
        assert_eq!(json["msg"], "ok");
        assert_eq!(json["data"], 5);
    }
}
