//! API Error Types
//!
//! Error types for the HTTP layer. Ledger errors keep their category:
//! validation 400, unknown entity 404, illegal transition and insufficient
//! funds 422, duplicate 409, everything else 500.

use affiliate_core::{AffiliateError, ErrorCategory};
use affiliate_ledger::LedgerError;
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::record_error;

/// API-specific errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Validation error
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Unauthorized access
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// Forbidden action
    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Ledger error
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub code: String,
    /// Error message
    pub message: String,
    /// Optional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ledger(err) => match err.category() {
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                ErrorCategory::IllegalTransition => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::Conflict => StatusCode::CONFLICT,
                ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
            ApiError::Ledger(err) => err.code(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(reason: impl Into<String>) -> Self {
        ApiError::Forbidden {
            reason: reason.into(),
        }
    }
}

impl From<AffiliateError> for ApiError {
    fn from(err: AffiliateError) -> Self {
        ApiError::Ledger(LedgerError::Domain(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        record_error(self.error_code());

        let error_response = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affiliate_store::StoreError;

    #[test]
    fn test_validation_error() {
        let err = ApiError::validation("Invalid amount");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_unauthorized_error() {
        let err = ApiError::unauthorized("Invalid token");
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_domain_errors_keep_category() {
        let err: ApiError = AffiliateError::not_found("Commission", "cm_1").into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "NOT_FOUND");

        let err: ApiError = AffiliateError::IllegalTransition {
            entity: "Commission".into(),
            from: "PAID".into(),
            to: "REVERSED".into(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), "ILLEGAL_TRANSITION");

        let err: ApiError = AffiliateError::invalid_amount("negative").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_duplicate_is_conflict() {
        let err = ApiError::Ledger(LedgerError::Store(StoreError::duplicate("Order", "ord_1")));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "CONFLICT");
    }

    #[test]
    fn test_config_error_is_internal() {
        let err = ApiError::Ledger(LedgerError::config("bad"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
