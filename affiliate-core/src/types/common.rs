//! Affiliate Basic Types
//!
//! Naming conventions:
//! - `_id` suffix: Primary key identifiers
//! - `_ref` suffix: External references (bank, payment gateway)
//! - `_at` suffix: UTC timestamps
//!
//! All money is carried as integer currency-minor-units ([`Amount`]).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Signed amount in currency-minor-units
pub type Amount = i64;

// ============================================================
// Identifier newtypes (non-interchangeable)
// ============================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Mint a fresh identifier
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, uuid::Uuid::new_v4().simple()))
            }

            /// Borrow as str
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Partner identifier
    PartnerId,
    "ptn"
);
string_id!(
    /// External order identifier
    OrderId,
    "ord"
);
string_id!(
    /// Commission identifier
    CommissionId,
    "cm"
);
string_id!(
    /// Commission rule identifier
    RuleId,
    "rule"
);
string_id!(
    /// Wallet transaction identifier
    WalletTxId,
    "wtx"
);
string_id!(
    /// Payout request identifier
    PayoutId,
    "po"
);
string_id!(
    /// Audit event identifier
    AuditEventId,
    "aud"
);

// ============================================================
// Rounding
// ============================================================

/// Round a decimal to whole minor units, half away from zero.
pub fn round_minor_units(value: Decimal) -> Amount {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_i64().unwrap_or(if rounded.is_sign_negative() {
        Amount::MIN
    } else {
        Amount::MAX
    })
}

/// Percentage of an amount, rounded to minor units.
pub fn percent_of(amount: Amount, percent: Decimal) -> Amount {
    round_minor_units(Decimal::from(amount) * percent / Decimal::ONE_HUNDRED)
}

/// `part / whole` as a percentage, zero when `whole` is zero.
pub fn ratio_percent(part: u64, whole: u64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole)
}
