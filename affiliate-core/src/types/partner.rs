//! Partners and Coupons

use super::common::*;
use super::status::{PartnerStatus, StatusMachine, Tier};
use crate::error::{AffiliateError, AffiliateResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Affiliate partner. Never hard-deleted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub partner_id: PartnerId,
    pub name: String,
    /// Shop user account owned by the partner (self-purchase detection)
    pub user_id: Option<String>,
    pub tier: Tier,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    /// New partner application: PENDING at the entry tier
    pub fn apply(partner_id: PartnerId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            partner_id,
            name: name.into(),
            user_id: None,
            tier: Tier::Affiliate,
            status: PartnerStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the owning user account
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set tier
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == PartnerStatus::Active
    }

    /// Reject unless ACTIVE
    pub fn require_active(&self) -> AffiliateResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(AffiliateError::PartnerNotActive {
                partner_id: self.partner_id.to_string(),
                status: self.status.to_string(),
            })
        }
    }

    /// Move to a new status through the transition table
    pub fn transition(&mut self, target: PartnerStatus, now: DateTime<Utc>) -> AffiliateResult<()> {
        self.status = self.status.transition_to(target)?;
        self.updated_at = now;
        Ok(())
    }
}

/// Discount coupon, optionally owned by a partner
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    /// Coupon code (case-insensitive, stored upper-case)
    pub code: String,
    /// Owning partner; owned coupons attribute orders
    pub partner_id: Option<PartnerId>,
    pub discount_percent: Decimal,
    pub active: bool,
}

impl Coupon {
    pub fn new(code: &str, discount_percent: Decimal) -> Self {
        Self {
            code: Self::normalize(code),
            partner_id: None,
            discount_percent,
            active: true,
        }
    }

    /// Set owning partner
    pub fn owned_by(mut self, partner_id: PartnerId) -> Self {
        self.partner_id = Some(partner_id);
        self
    }

    /// Normalized lookup key for a code
    pub fn normalize(code: &str) -> String {
        code.trim().to_ascii_uppercase()
    }

    pub fn validate(&self) -> AffiliateResult<()> {
        if self.code.is_empty() {
            return Err(AffiliateError::invalid_field("code", "must not be empty"));
        }
        if self.discount_percent < Decimal::ZERO || self.discount_percent > Decimal::ONE_HUNDRED {
            return Err(AffiliateError::invalid_field(
                "discount_percent",
                "must be between 0 and 100",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_starts_pending_affiliate() {
        let p = Partner::apply(PartnerId::new("ptn_1"), "Ann", Utc::now());
        assert_eq!(p.status, PartnerStatus::Pending);
        assert_eq!(p.tier, Tier::Affiliate);
        assert!(p.require_active().is_err());
    }

    #[test]
    fn test_transition_updates_status() {
        let now = Utc::now();
        let mut p = Partner::apply(PartnerId::new("ptn_1"), "Ann", now);
        p.transition(PartnerStatus::Active, now).unwrap();
        assert!(p.is_active());
        assert!(p.transition(PartnerStatus::Pending, now).is_err());
        assert!(p.is_active());
    }

    #[test]
    fn test_coupon_normalizes_code() {
        let c = Coupon::new(" summer10 ", Decimal::from(10));
        assert_eq!(c.code, "SUMMER10");
        assert!(c.validate().is_ok());
        assert!(Coupon::new("x", Decimal::from(101)).validate().is_err());
    }
}
