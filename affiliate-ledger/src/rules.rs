//! Commission Rule Service
//!
//! Rules are keyed by (scope, scope id, partner level). Upserting a rule for
//! an existing key replaces it in place and keeps its id.

use affiliate_core::*;
use affiliate_store::AffiliateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::LedgerResult;

/// Commission rule service
#[derive(Clone)]
pub struct RuleService {
    store: Arc<dyn AffiliateStore>,
}

impl RuleService {
    pub fn new(store: Arc<dyn AffiliateStore>) -> Self {
        Self { store }
    }

    /// Every rule, active or not
    pub async fn list(&self) -> LedgerResult<Vec<CommissionRule>> {
        let reader = self.store.begin_read().await?;
        Ok(reader.list_rules().await?)
    }

    /// Matcher over the active rules
    pub async fn matcher(&self) -> LedgerResult<RuleMatcher> {
        Ok(RuleMatcher::new(self.list().await?))
    }

    /// Insert or replace the rule for `rule.key()`
    pub async fn upsert(
        &self,
        mut rule: CommissionRule,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<CommissionRule> {
        rule.validate()?;
        let mut tx = self.store.begin().await?;
        if let Some(existing) = tx.find_rule_by_key(&rule.key()).await? {
            rule.rule_id = existing.rule_id;
        }
        rule.updated_at = now;
        tx.put_rule(rule.clone()).await?;
        tx.append_audit(
            AuditEvent::new(AuditAction::RuleUpserted, "CommissionRule", &rule.rule_id, actor, now)
                .with_note(Some(format!(
                    "{} {} {}%",
                    rule.scope,
                    rule.partner_level.map_or("ANY".to_string(), |t| t.to_string()),
                    rule.percent
                ))),
        )
        .await?;
        tx.commit().await?;

        info!(rule_id = %rule.rule_id, scope = %rule.scope, percent = %rule.percent, "commission rule upserted");
        Ok(rule)
    }

    /// Seed one GLOBAL rule per tier where none exists yet. Returns how many
    /// were written.
    pub async fn seed_defaults(&self, rates: &TierRates, now: DateTime<Utc>) -> LedgerResult<usize> {
        let mut tx = self.store.begin().await?;
        let mut seeded = 0;
        for rule in rates.default_rules(now) {
            if tx.find_rule_by_key(&rule.key()).await?.is_none() {
                tx.put_rule(rule).await?;
                seeded += 1;
            }
        }
        tx.commit().await?;
        if seeded > 0 {
            info!(seeded, "default commission rules seeded");
        }
        Ok(seeded)
    }
}
