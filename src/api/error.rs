//! HTTP error mapping.
//!
//! | Status | Code |
//! |--------|------|
//! | 400 | `VALIDATION_ERROR`, `INVALID_AMOUNT`, `INVALID_ORDER_ID`, `CAPACITY_EXCEEDED`, `INVALID_STATUS_TRANSITION`, `BAD_REQUEST` |
//! | 404 | `ORDER_NOT_FOUND`, `BOOKING_NOT_FOUND` |
//! | 409 | `CONCURRENT_MODIFICATION` |
//! | 500 | `DATABASE_ERROR`, `INTERNAL_ERROR` |

use crate::{core::capacity::CapacityRejection, errors::Error};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Error body returned by every failing endpoint.
///
/// ```json
/// { "code": "CAPACITY_EXCEEDED", "message": "...", "details": { ... } }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code
    pub code: &'static str,
    /// Human readable message
    pub message: String,
    /// Structured diagnostics, when there are any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub enum ApiError {
    /// Error raised by the core
    Core(Error),
    /// The date has no room for the requested pax
    CapacityExceeded(CapacityRejection),
    /// Request could not be decoded or is inconsistent with its path
    BadRequest(String),
}

/// Handler result
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

fn core_status(err: &Error) -> (StatusCode, &'static str) {
    match err {
        Error::Validation { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        Error::InvalidAmount { .. } => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
        Error::InvalidOrderReference { .. } => (StatusCode::BAD_REQUEST, "INVALID_ORDER_ID"),
        Error::InvalidStatusTransition { .. } => {
            (StatusCode::BAD_REQUEST, "INVALID_STATUS_TRANSITION")
        }
        Error::OrderNotFound { .. } => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
        Error::BookingNotFound { .. } => (StatusCode::NOT_FOUND, "BOOKING_NOT_FOUND"),
        Error::ConcurrentModification { .. } => (StatusCode::CONFLICT, "CONCURRENT_MODIFICATION"),
        Error::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        Error::Config { .. } | Error::Io(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Core(err) => {
                let (status, code) = core_status(&err);
                let message = if status.is_server_error() {
                    error!(error = %err, "Request failed");
                    "Internal server error".to_string()
                } else {
                    err.to_string()
                };
                (
                    status,
                    ErrorBody {
                        code,
                        message,
                        details: None,
                    },
                )
            }
            Self::CapacityExceeded(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "CAPACITY_EXCEEDED",
                    message: format!(
                        "Capacity exceeded for this date. Maximum {} pax allowed.",
                        rejection.max_capacity
                    ),
                    details: serde_json::to_value(rejection).ok(),
                },
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "BAD_REQUEST",
                    message,
                    details: None,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
