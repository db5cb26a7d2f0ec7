//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use agent_billing_core::{BillingError, IdError};

use crate::ledger::LedgerError;
use crate::provider::ProviderError;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A required integration is not configured.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// External service error.
    #[error("external service error: {0}")]
    ExternalService(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", self.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone()),
            Self::Unavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg.clone(),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                )
            }
            Self::ExternalService(msg) => {
                tracing::error!(error = %msg, "Billing provider error");
                (
                    StatusCode::BAD_GATEWAY,
                    "external_service_error",
                    msg.clone(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<IdError> for ApiError {
    fn from(err: IdError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::InvalidAmount(_)
            | BillingError::UnknownPlan(_)
            | BillingError::InvalidId(_) => Self::BadRequest(err.to_string()),
            BillingError::CustomerNotFound { customer_id } => {
                Self::NotFound(format!("customer not found: {customer_id}"))
            }
            BillingError::Provider(msg) => Self::ExternalService(msg),
            BillingError::UnknownEventType(_) | BillingError::Configuration(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(msg) => Self::Unavailable(msg),
            ProviderError::NotFound(msg) => Self::NotFound(msg),
            ProviderError::Rejected { .. } | ProviderError::InvalidResponse(_) => {
                Self::ExternalService(err.to_string())
            }
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Billing(e) => e.into(),
            LedgerError::Provider(e) => e.into(),
        }
    }
}
