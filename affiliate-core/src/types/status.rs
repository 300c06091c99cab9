//! Status Enumerations and Transition Tables
//!
//! Each lifecycle status is a closed enum with an explicit
//! `current -> allowed next` table. All status changes go through
//! [`StatusMachine::transition_to`].

use crate::error::{AffiliateError, AffiliateResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Shared transition check for status enums
pub trait StatusMachine: Copy + Eq + Sized + 'static {
    /// Entity name used in errors
    const ENTITY: &'static str;

    /// Wire name of the status
    fn as_str(self) -> &'static str;

    /// Valid transitions from this status
    fn valid_transitions(self) -> &'static [Self];

    /// Check if status is terminal
    fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Check if transition to target status is valid
    fn can_transition_to(self, target: Self) -> bool {
        self.valid_transitions().contains(&target)
    }

    /// Validate a transition, returning the target status on success
    fn transition_to(self, target: Self) -> AffiliateResult<Self> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(AffiliateError::IllegalTransition {
                entity: Self::ENTITY.to_string(),
                from: self.as_str().to_string(),
                to: target.as_str().to_string(),
            })
        }
    }
}

macro_rules! wire_enum {
    ($name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// All variants
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $($name::$variant => f.write_str($wire)),+
                }
            }
        }

        impl FromStr for $name {
            type Err = AffiliateError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(AffiliateError::invalid_field(
                        stringify!($name),
                        format!("unknown value {}", other),
                    )),
                }
            }
        }
    };
}

// ============================================================
// Partner tier
// ============================================================

/// Partner tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Affiliate,
    Agent,
    Leader,
}

wire_enum!(Tier {
    Affiliate => "AFFILIATE",
    Agent => "AGENT",
    Leader => "LEADER",
});

impl Tier {
    /// Next tier up, if any
    pub fn next(self) -> Option<Tier> {
        match self {
            Tier::Affiliate => Some(Tier::Agent),
            Tier::Agent => Some(Tier::Leader),
            Tier::Leader => None,
        }
    }

    /// Parse a tier name, falling back to AFFILIATE for unknown values
    pub fn parse_or_default(s: &str) -> Tier {
        s.parse().unwrap_or_default()
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Affiliate
    }
}

// ============================================================
// Partner status
// ============================================================

/// Partner lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerStatus {
    /// Application received, not yet approved
    Pending,
    /// Approved and earning
    Active,
    /// Blocked by an admin or the risk scorer
    Suspended,
}

wire_enum!(PartnerStatus {
    Pending => "PENDING",
    Active => "ACTIVE",
    Suspended => "SUSPENDED",
});

impl StatusMachine for PartnerStatus {
    const ENTITY: &'static str = "Partner";

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }

    fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Active, Self::Suspended],
            Self::Active => &[Self::Suspended],
            Self::Suspended => &[Self::Active],
        }
    }
}

// ============================================================
// Commission status
// ============================================================

/// Commission status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    /// Created, inside the hold window
    Pending,
    /// Released and credited to the wallet
    Available,
    /// Cancelled by a return or cancellation (terminal)
    Reversed,
    /// Withdrawn by a payout (terminal)
    Paid,
}

wire_enum!(CommissionStatus {
    Pending => "PENDING",
    Available => "AVAILABLE",
    Reversed => "REVERSED",
    Paid => "PAID",
});

impl StatusMachine for CommissionStatus {
    const ENTITY: &'static str = "Commission";

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Available => "AVAILABLE",
            Self::Reversed => "REVERSED",
            Self::Paid => "PAID",
        }
    }

    fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Available, Self::Reversed],
            Self::Available => &[Self::Reversed, Self::Paid],
            Self::Reversed | Self::Paid => &[],
        }
    }
}

// ============================================================
// Payout status
// ============================================================

/// Payout request status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Requested,
    Approved,
    Paid,
    Rejected,
}

wire_enum!(PayoutStatus {
    Requested => "REQUESTED",
    Approved => "APPROVED",
    Paid => "PAID",
    Rejected => "REJECTED",
});

impl StatusMachine for PayoutStatus {
    const ENTITY: &'static str = "PayoutRequest";

    fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Approved => "APPROVED",
            Self::Paid => "PAID",
            Self::Rejected => "REJECTED",
        }
    }

    fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Requested => &[Self::Approved, Self::Rejected],
            Self::Approved => &[Self::Paid],
            Self::Paid | Self::Rejected => &[],
        }
    }
}

// ============================================================
// Other enumerations
// ============================================================

/// How an order was attributed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributionType {
    Coupon,
    LastClick,
}

wire_enum!(AttributionType {
    Coupon => "COUPON",
    LastClick => "LAST_CLICK",
});

/// Commission rule scope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleScope {
    Global,
    Category,
    Product,
}

wire_enum!(RuleScope {
    Global => "GLOBAL",
    Category => "CATEGORY",
    Product => "PRODUCT",
});

/// Wallet transaction type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTxType {
    /// Commission released (positive)
    Earn,
    /// Credited commission reversed (negative)
    Reverse,
    /// Payout paid (negative)
    Payout,
}

wire_enum!(WalletTxType {
    Earn => "EARN",
    Reverse => "REVERSE",
    Payout => "PAYOUT",
});

impl WalletTxType {
    /// Check the sign of an amount against the transaction type
    pub fn accepts(self, amount: i64) -> bool {
        match self {
            WalletTxType::Earn => amount > 0,
            WalletTxType::Reverse | WalletTxType::Payout => amount < 0,
        }
    }
}

/// Order delivery status, as reported by the shipping collaborator
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Placed,
    Paid,
    Shipping,
    Delivered,
}

wire_enum!(DeliveryStatus {
    Placed => "PLACED",
    Paid => "PAID",
    Shipping => "SHIPPING",
    Delivered => "DELIVERED",
});

impl Default for DeliveryStatus {
    fn default() -> Self {
        DeliveryStatus::Placed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commission_table() {
        use CommissionStatus::*;
        assert!(Pending.can_transition_to(Available));
        assert!(Pending.can_transition_to(Reversed));
        assert!(!Pending.can_transition_to(Paid));
        assert!(Available.can_transition_to(Paid));
        assert!(Available.can_transition_to(Reversed));
        assert!(Reversed.is_terminal());
        assert!(Paid.is_terminal());
    }

    #[test]
    fn test_reversed_cannot_be_released() {
        let err = CommissionStatus::Reversed
            .transition_to(CommissionStatus::Available)
            .unwrap_err();
        assert!(matches!(err, AffiliateError::IllegalTransition { .. }));
    }

    #[test]
    fn test_paid_cannot_be_reversed() {
        assert!(CommissionStatus::Paid
            .transition_to(CommissionStatus::Reversed)
            .is_err());
    }

    #[test]
    fn test_payout_table() {
        use PayoutStatus::*;
        assert_eq!(Requested.transition_to(Approved).unwrap(), Approved);
        assert!(Requested.transition_to(Paid).is_err());
        assert!(Approved.transition_to(Rejected).is_err());
        assert!(Rejected.is_terminal());
    }

    #[test]
    fn test_partner_table() {
        use PartnerStatus::*;
        assert!(Pending.can_transition_to(Active));
        assert!(Active.can_transition_to(Suspended));
        assert!(Suspended.can_transition_to(Active));
        assert!(!Active.can_transition_to(Pending));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(AttributionType::LastClick.to_string(), "LAST_CLICK");
        assert_eq!(
            serde_json::to_string(&AttributionType::LastClick).unwrap(),
            "\"LAST_CLICK\""
        );
        assert_eq!("available".parse::<CommissionStatus>().unwrap(), CommissionStatus::Available);
        assert!("bogus".parse::<PayoutStatus>().is_err());
    }

    #[test]
    fn test_tier_parse_or_default() {
        assert_eq!(Tier::parse_or_default("LEADER"), Tier::Leader);
        assert_eq!(Tier::parse_or_default("diamond"), Tier::Affiliate);
        assert_eq!(Tier::Affiliate.next(), Some(Tier::Agent));
        assert_eq!(Tier::Leader.next(), None);
    }

    #[test]
    fn test_wallet_sign_rules() {
        assert!(WalletTxType::Earn.accepts(10));
        assert!(!WalletTxType::Earn.accepts(-10));
        assert!(WalletTxType::Payout.accepts(-10));
        assert!(!WalletTxType::Reverse.accepts(0));
    }
}
