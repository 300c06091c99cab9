//! Affiliate Error Codes Registry
//!
//! Error code format: AFF-{area}-{sequence}
//! - AFF-VAL: Request validation
//! - AFF-NF: Unknown entities
//! - AFF-STATE: Illegal status transitions and gate violations
//! - AFF-FUNDS: Insufficient funds
//! - AFF-CONFLICT: Duplicate writes
//! - AFF-INV: Ledger invariant violations

use thiserror::Error;

/// Affiliate Result type
pub type AffiliateResult<T> = Result<T, AffiliateError>;

/// Coarse error category, used by outer layers to pick a response code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    IllegalTransition,
    InsufficientFunds,
    Conflict,
    Internal,
}

/// Affiliate Error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AffiliateError {
    // ============================================================
    // Validation Errors (AFF-VAL-*)
    // ============================================================
    /// [AFF-VAL-001] Invalid amount
    #[error("[AFF-VAL-001] Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// [AFF-VAL-002] Invalid field
    #[error("[AFF-VAL-002] Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// [AFF-VAL-003] Payout below minimum
    #[error("[AFF-VAL-003] Payout amount {amount} below minimum {minimum}")]
    PayoutBelowMinimum { amount: i64, minimum: i64 },

    /// [AFF-VAL-004] Payout above per-request cap
    #[error("[AFF-VAL-004] Payout amount {amount} above per-request cap {maximum}")]
    PayoutAboveMaximum { amount: i64, maximum: i64 },

    // ============================================================
    // Not Found Errors (AFF-NF-*)
    // ============================================================
    /// [AFF-NF-001] Entity not found
    #[error("[AFF-NF-001] {entity} not found: {id}")]
    NotFound { entity: String, id: String },

    // ============================================================
    // State Errors (AFF-STATE-*)
    // ============================================================
    /// [AFF-STATE-001] Transition not in the status table
    #[error("[AFF-STATE-001] Illegal {entity} transition: {from} -> {to}")]
    IllegalTransition {
        entity: String,
        from: String,
        to: String,
    },

    /// [AFF-STATE-002] Commission still inside its hold window
    #[error("[AFF-STATE-002] Commission {commission_id} is held until {hold_until}")]
    HoldNotElapsed {
        commission_id: String,
        hold_until: String,
    },

    /// [AFF-STATE-003] Source order not delivered
    #[error("[AFF-STATE-003] Order {order_id} is {status}, release requires DELIVERED")]
    OrderNotDelivered { order_id: String, status: String },

    /// [AFF-STATE-004] Partner already has a payout in flight
    #[error("[AFF-STATE-004] Partner {partner_id} already has outstanding payout {payout_id}")]
    PayoutAlreadyOutstanding {
        partner_id: String,
        payout_id: String,
    },

    /// [AFF-STATE-005] Partner is not ACTIVE
    #[error("[AFF-STATE-005] Partner {partner_id} is {status}, expected ACTIVE")]
    PartnerNotActive { partner_id: String, status: String },

    /// [AFF-STATE-006] Status changed between check and write
    #[error("[AFF-STATE-006] {entity} {id} is {actual}, expected {expected}")]
    StaleStatus {
        entity: String,
        id: String,
        expected: String,
        actual: String,
    },

    // ============================================================
    // Funds Errors (AFF-FUNDS-*)
    // ============================================================
    /// [AFF-FUNDS-001] Requested amount exceeds what is available
    #[error("[AFF-FUNDS-001] Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    // ============================================================
    // Conflict Errors (AFF-CONFLICT-*)
    // ============================================================
    /// [AFF-CONFLICT-001] Order already attributed
    #[error("[AFF-CONFLICT-001] Order {order_id} already has a referral")]
    DuplicateReferral { order_id: String },

    /// [AFF-CONFLICT-002] Entity already exists
    #[error("[AFF-CONFLICT-002] {entity} already exists: {id}")]
    Duplicate { entity: String, id: String },

    // ============================================================
    // Invariant Errors (AFF-INV-*)
    // ============================================================
    /// [AFF-INV-001] Ledger invariant violation
    #[error("[AFF-INV-001] Invariant violation: {invariant} - {details}")]
    InvariantViolation { invariant: String, details: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AffiliateError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid amount error
    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        Self::InvalidAmount {
            reason: reason.into(),
        }
    }

    /// Error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount { .. }
            | Self::InvalidField { .. }
            | Self::PayoutBelowMinimum { .. }
            | Self::PayoutAboveMaximum { .. } => ErrorCategory::Validation,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::IllegalTransition { .. }
            | Self::HoldNotElapsed { .. }
            | Self::OrderNotDelivered { .. }
            | Self::PayoutAlreadyOutstanding { .. }
            | Self::PartnerNotActive { .. }
            | Self::StaleStatus { .. } => ErrorCategory::IllegalTransition,
            Self::InsufficientFunds { .. } => ErrorCategory::InsufficientFunds,
            Self::DuplicateReferral { .. } | Self::Duplicate { .. } => ErrorCategory::Conflict,
            Self::InvariantViolation { .. } | Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl From<serde_json::Error> for AffiliateError {
    fn from(err: serde_json::Error) -> Self {
        AffiliateError::Internal(format!("serialization: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_in_messages() {
        let err = AffiliateError::not_found("Commission", "cm_1");
        assert!(err.to_string().starts_with("[AFF-NF-001]"));

        let err = AffiliateError::IllegalTransition {
            entity: "Commission".into(),
            from: "PAID".into(),
            to: "REVERSED".into(),
        };
        assert!(err.to_string().contains("PAID -> REVERSED"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            AffiliateError::PayoutBelowMinimum { amount: 1, minimum: 2 }.category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            AffiliateError::InsufficientFunds { requested: 2, available: 1 }.category(),
            ErrorCategory::InsufficientFunds
        );
        assert_eq!(
            AffiliateError::PayoutAlreadyOutstanding {
                partner_id: "p".into(),
                payout_id: "po".into()
            }
            .category(),
            ErrorCategory::IllegalTransition
        );
        assert_eq!(
            AffiliateError::DuplicateReferral { order_id: "o".into() }.category(),
            ErrorCategory::Conflict
        );
    }
}
