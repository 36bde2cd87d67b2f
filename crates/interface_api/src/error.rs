//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use core_kernel::MoneyError;
use domain_billing::BillingError;

use crate::auth::AuthError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict with the current ledger state; `code` tells clients which one
    #[error("Conflict: {message}")]
    Conflict { code: &'static str, message: String },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        details: Option<Vec<String>>,
    },

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::Conflict { code, message } => (StatusCode::CONFLICT, code, message, None),
            ApiError::Validation { message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message, details)
            }
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg, None)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        let message = err.to_string();
        match err {
            BillingError::Validation(_) | BillingError::Money(_) => ApiError::validation(message),
            BillingError::OverpaymentRejected { .. } => ApiError::Conflict {
                code: "overpayment_rejected",
                message,
            },
            BillingError::InvalidTransactionState { .. } => ApiError::Conflict {
                code: "invalid_transaction_state",
                message,
            },
            BillingError::ConcurrentModification(_) => ApiError::Conflict {
                code: "concurrent_modification",
                message,
            },
            BillingError::Unauthorized(_) => ApiError::Forbidden(message),
            BillingError::DocumentNotFound(_)
            | BillingError::TransactionNotFound(_)
            | BillingError::MethodNotFound(_) => ApiError::NotFound(message),
            BillingError::GatewayCallbackRejected(_) => ApiError::BadRequest(message),
            BillingError::Storage(e) if e.is_transient() => ApiError::Unavailable(e.to_string()),
            BillingError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<MoneyError> for ApiError {
    fn from(err: MoneyError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        ApiError::Validation {
            message: "request failed validation".to_string(),
            details: Some(details),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{Currency, Money};
    use domain_billing::TransactionState;

    #[test]
    fn test_status_codes() {
        let cases = [
            (BillingError::validation("bad"), StatusCode::UNPROCESSABLE_ENTITY),
            (
                BillingError::OverpaymentRejected {
                    requested: Money::from_minor(10, Currency::VND),
                    remaining: Money::zero(Currency::VND),
                },
                StatusCode::CONFLICT,
            ),
            (
                BillingError::InvalidTransactionState {
                    from: TransactionState::Failed,
                    to: TransactionState::Success,
                },
                StatusCode::CONFLICT,
            ),
            (BillingError::unauthorized("peer"), StatusCode::FORBIDDEN),
            (BillingError::DocumentNotFound("DOC-1".to_string()), StatusCode::NOT_FOUND),
            (
                BillingError::Storage(core_kernel::PortError::connection("down")),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
