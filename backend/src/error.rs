//! Error handling for the MRP Back Office
//!
//! Every failure path rolls back to the pre-operation state; errors carry
//! enough structured detail (material id, shortage, current vs. requested
//! state) to render a caller-facing message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Product {0} has no active bill of materials")]
    UnknownProduct(Uuid),

    #[error("Insufficient stock for material {material_id}: short by {shortage}")]
    InsufficientStock { material_id: Uuid, shortage: Decimal },

    #[error("Transition '{requested_transition}' is not valid from status '{current_status}'")]
    InvalidPlanState {
        current_status: String,
        requested_transition: String,
    },

    // Concurrency errors; both are safe to retry because every transition
    // is atomic and idempotent
    #[error("Concurrent stock mutation prevented an atomic deduction")]
    DeductionConflict,

    #[error("Could not acquire a row lock in time")]
    LockTimeout,

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // 55P03 = lock_not_available, raised when SET LOCAL lock_timeout
        // expires; 40P01 = deadlock_detected, raised on the victim of a lock
        // cycle. Both mean lock contention and the operation can be retried.
        if let sqlx::Error::Database(ref db_err) = err {
            if matches!(db_err.code().as_deref(), Some("55P03") | Some("40P01")) {
                return AppError::LockTimeout;
            }
        }
        AppError::DatabaseError(err)
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message: format!("{} not found", resource),
                    field: None,
                },
            ),
            AppError::UnknownProduct(product_id) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "UNKNOWN_PRODUCT".to_string(),
                    message: format!("Product {} has no active bill of materials", product_id),
                    field: None,
                },
            ),
            AppError::InsufficientStock { material_id, shortage } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INSUFFICIENT_STOCK".to_string(),
                    message: format!(
                        "Insufficient stock for material {}: short by {}",
                        material_id, shortage
                    ),
                    field: None,
                },
            ),
            AppError::InvalidPlanState {
                current_status,
                requested_transition,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_PLAN_STATE".to_string(),
                    message: format!(
                        "Cannot {} a plan in status '{}'",
                        requested_transition, current_status
                    ),
                    field: None,
                },
            ),
            AppError::DeductionConflict => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DEDUCTION_CONFLICT".to_string(),
                    message: "A concurrent stock mutation interfered; the operation was rolled back and can be retried"
                        .to_string(),
                    field: None,
                },
            ),
            AppError::LockTimeout => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "LOCK_TIMEOUT".to_string(),
                    message: "Could not acquire a row lock in time; retry with backoff".to_string(),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message: "A database error occurred".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct StubPgError(&'static str);

    impl fmt::Display for StubPgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "sqlstate {}", self.0)
        }
    }

    impl StdError for StubPgError {}

    impl DatabaseError for StubPgError {
        fn message(&self) -> &str {
            "lock contention"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn db_error(code: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(StubPgError(code)))
    }

    #[test]
    fn test_expired_lock_timeout_is_retryable() {
        assert!(matches!(AppError::from(db_error("55P03")), AppError::LockTimeout));
    }

    /// Postgres aborts one victim of a lock cycle with 40P01; the caller
    /// must see a retryable conflict, not an internal error
    #[test]
    fn test_deadlock_victim_is_retryable() {
        assert!(matches!(AppError::from(db_error("40P01")), AppError::LockTimeout));
    }

    #[test]
    fn test_other_database_errors_pass_through() {
        assert!(matches!(
            AppError::from(db_error("23505")),
            AppError::DatabaseError(_)
        ));
    }
}
