//! Rule Matcher
//!
//! Specificity cascade, first match wins:
//! PRODUCT -> CATEGORY -> GLOBAL for the tier -> GLOBAL unrestricted.
//! Within a scope a tier-specific rule beats an unrestricted one, then the
//! highest percent wins.

use crate::types::*;
use std::cmp::Ordering;

/// Rule matcher over a loaded rule set
#[derive(Clone, Debug, Default)]
pub struct RuleMatcher {
    rules: Vec<CommissionRule>,
}

impl RuleMatcher {
    /// Build from rules; inactive rules are dropped
    pub fn new(rules: impl IntoIterator<Item = CommissionRule>) -> Self {
        Self {
            rules: rules.into_iter().filter(|r| r.active).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the single rule for a tier and the purchased product/category ids
    pub fn find(&self, tier: Tier, product_ids: &[&str], category_ids: &[&str]) -> Option<&CommissionRule> {
        self.best_in_scope(RuleScope::Product, tier, product_ids)
            .or_else(|| self.best_in_scope(RuleScope::Category, tier, category_ids))
            .or_else(|| self.best_in_scope(RuleScope::Global, tier, &[]))
    }

    /// Find the rule for an order snapshot
    pub fn find_for_order(&self, tier: Tier, order: &OrderSnapshot) -> Option<&CommissionRule> {
        self.find(tier, &order.product_ids(), &order.category_ids())
    }

    fn best_in_scope(&self, scope: RuleScope, tier: Tier, ids: &[&str]) -> Option<&CommissionRule> {
        self.rules
            .iter()
            .filter(|r| r.scope == scope && r.applies_to(tier))
            .filter(|r| match scope {
                RuleScope::Global => true,
                _ => r
                    .scope_id
                    .as_deref()
                    .map_or(false, |id| ids.contains(&id)),
            })
            .max_by(|a, b| Self::rank(a, b))
    }

    fn rank(a: &CommissionRule, b: &CommissionRule) -> Ordering {
        a.partner_level
            .is_some()
            .cmp(&b.partner_level.is_some())
            .then(a.percent.cmp(&b.percent))
            // Lower id wins the final tie so the choice is deterministic
            .then_with(|| b.rule_id.cmp(&a.rule_id))
    }
}
