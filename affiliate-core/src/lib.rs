//! Affiliate Core - Attribution and Commission Ledger Domain
//!
//! Pure domain layer of the affiliate engine. No I/O happens here; the
//! store and ledger crates load state, call into these rules, and persist
//! the outcome inside one transaction.
//!
//! # Flow
//!
//! ```text
//! order placed ──► AttributionResolver ──► RuleMatcher ──► Commission (PENDING)
//!                                                              │
//!                  ┌───────────────────────────────────────────┤
//!                  ▼                                           ▼
//!        REVERSED (return/cancel)              AVAILABLE (hold passed + DELIVERED)
//!                                                              │ EARN
//!                                                              ▼
//!                                   PayoutRequest ──► APPROVED ──► PAID (PAYOUT)
//! ```
//!
//! # Status Tables
//!
//! | Entity | Transitions |
//! |--------|-------------|
//! | Commission | PENDING → AVAILABLE, REVERSED; AVAILABLE → REVERSED, PAID |
//! | PayoutRequest | REQUESTED → APPROVED, REJECTED; APPROVED → PAID |
//! | Partner | PENDING → ACTIVE, SUSPENDED; ACTIVE ⇄ SUSPENDED |

pub mod attribution;
pub mod commission;
pub mod error;
pub mod fraud;
pub mod payout;
pub mod rules;
pub mod tier;
pub mod types;

pub use error::{AffiliateError, AffiliateResult, ErrorCategory};
pub use types::*;

pub use attribution::{Attribution, AttributionRequest, AttributionResolver};
pub use commission::{calc_commission, ReversalPlan, TierRates};
pub use fraud::{RiskDecision, RiskScorer, RiskThresholds};
pub use payout::{Allocation, PayoutLimits, PayoutSettlement};
pub use rules::RuleMatcher;
pub use tier::{TierPerformance, TierThresholds};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
