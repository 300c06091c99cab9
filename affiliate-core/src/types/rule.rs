//! Commission Rules

use super::common::*;
use super::status::{RuleScope, Tier};
use crate::error::{AffiliateError, AffiliateResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Commission rule
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommissionRule {
    pub rule_id: RuleId,
    pub scope: RuleScope,
    /// Product or category id; None for GLOBAL
    pub scope_id: Option<String>,
    /// Tier restriction; None applies to every tier
    pub partner_level: Option<Tier>,
    /// Percent rate (5 = 5%)
    pub percent: Decimal,
    /// Fixed bonus in minor units
    pub fixed_bonus: Amount,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

/// Upsert key: (scope, scope id, tier restriction)
pub type RuleKey = (RuleScope, Option<String>, Option<Tier>);

impl CommissionRule {
    pub fn new(scope: RuleScope, scope_id: Option<String>, percent: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            rule_id: RuleId::generate(),
            scope,
            scope_id,
            partner_level: None,
            percent,
            fixed_bonus: 0,
            active: true,
            updated_at: now,
        }
    }

    /// GLOBAL rule
    pub fn global(percent: Decimal, now: DateTime<Utc>) -> Self {
        Self::new(RuleScope::Global, None, percent, now)
    }

    pub fn for_tier(mut self, tier: Tier) -> Self {
        self.partner_level = Some(tier);
        self
    }

    pub fn with_fixed_bonus(mut self, bonus: Amount) -> Self {
        self.fixed_bonus = bonus;
        self
    }

    pub fn key(&self) -> RuleKey {
        (self.scope, self.scope_id.clone(), self.partner_level)
    }

    /// Applies to the tier (unrestricted or exact match)
    pub fn applies_to(&self, tier: Tier) -> bool {
        self.partner_level.map_or(true, |level| level == tier)
    }

    pub fn validate(&self) -> AffiliateResult<()> {
        if self.percent < Decimal::ZERO || self.percent > Decimal::ONE_HUNDRED {
            return Err(AffiliateError::invalid_field("percent", "must be between 0 and 100"));
        }
        if self.fixed_bonus < 0 {
            return Err(AffiliateError::invalid_field("fixed_bonus", "must not be negative"));
        }
        match (self.scope, self.scope_id.as_deref()) {
            (RuleScope::Global, Some(_)) => Err(AffiliateError::invalid_field(
                "scope_id",
                "GLOBAL rules take no scope id",
            )),
            (RuleScope::Category | RuleScope::Product, None) => Err(AffiliateError::invalid_field(
                "scope_id",
                "required for CATEGORY and PRODUCT rules",
            )),
            (_, Some(id)) if id.trim().is_empty() => {
                Err(AffiliateError::invalid_field("scope_id", "must not be empty"))
            }
            _ => Ok(()),
        }
    }
}
