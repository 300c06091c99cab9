//! Affiliate Ledger Error Types

use affiliate_core::{AffiliateError, ErrorCategory};
use affiliate_store::StoreError;
use thiserror::Error;

/// Ledger Result type
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger Error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Domain rule violation
    #[error(transparent)]
    Domain(#[from] AffiliateError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Coarse category for response mapping
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(err) => err.category(),
            Self::Store(StoreError::NotFound { .. }) => ErrorCategory::NotFound,
            Self::Store(StoreError::Duplicate { .. }) => ErrorCategory::Conflict,
            Self::Store(StoreError::StaleWrite { .. }) => ErrorCategory::IllegalTransition,
            Self::Store(_) | Self::Config(_) => ErrorCategory::Internal,
        }
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Validation => "VALIDATION_ERROR",
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::IllegalTransition => "ILLEGAL_TRANSITION",
            ErrorCategory::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCategory::Conflict => "CONFLICT",
            ErrorCategory::Internal => "INTERNAL_ERROR",
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_categories() {
        let err: LedgerError = StoreError::stale("Commission", "cm_1", "PENDING", "AVAILABLE").into();
        assert_eq!(err.category(), ErrorCategory::IllegalTransition);

        let err: LedgerError = StoreError::duplicate("Order", "ord_1").into();
        assert_eq!(err.category(), ErrorCategory::Conflict);
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn test_domain_error_is_transparent() {
        let err: LedgerError = AffiliateError::not_found("Partner", "ptn_1").into();
        assert!(err.to_string().starts_with("[AFF-NF-001]"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }
}
