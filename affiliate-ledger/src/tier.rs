//! Tier Promotion Service

use affiliate_core::*;
use affiliate_store::AffiliateStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerResult;

/// One promotion applied by a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierUpgrade {
    pub partner_id: PartnerId,
    pub from: Tier,
    pub to: Tier,
}

/// Tier promotion service
#[derive(Clone)]
pub struct TierPromotionService {
    store: Arc<dyn AffiliateStore>,
    config: Arc<LedgerConfig>,
}

impl TierPromotionService {
    pub fn new(store: Arc<dyn AffiliateStore>, config: Arc<LedgerConfig>) -> Self {
        Self { store, config }
    }

    /// Evaluate every ACTIVE AFFILIATE or AGENT partner once.
    ///
    /// Each partner is promoted in its own transaction; failures are logged
    /// and skipped.
    pub async fn run(&self, now: DateTime<Utc>) -> LedgerResult<Vec<TierUpgrade>> {
        let partners = {
            let reader = self.store.begin_read().await?;
            reader.list_partners().await?
        };

        let mut upgrades = Vec::new();
        for partner in partners
            .iter()
            .filter(|p| p.is_active() && p.tier.next().is_some())
        {
            match self.evaluate(&partner.partner_id, now).await {
                Ok(Some(upgrade)) => upgrades.push(upgrade),
                Ok(None) => {}
                Err(err) => {
                    warn!(partner_id = %partner.partner_id, error = %err, "tier evaluation failed");
                }
            }
        }
        Ok(upgrades)
    }

    /// Promote one partner a single step if it qualifies
    pub async fn evaluate(&self, partner_id: &PartnerId, now: DateTime<Utc>) -> LedgerResult<Option<TierUpgrade>> {
        let mut tx = self.store.begin().await?;
        let mut partner = tx.get_partner_required(partner_id).await?;
        if !partner.is_active() {
            return Ok(None);
        }
        let orders = tx
            .list_referred_orders(partner_id, now - self.config.tier_window())
            .await?;
        let perf = TierPerformance::from_orders(&orders);
        let Some(next) = self.config.tier_thresholds.evaluate(partner.tier, &perf) else {
            return Ok(None);
        };

        let upgrade = TierUpgrade {
            partner_id: partner_id.clone(),
            from: partner.tier,
            to: next,
        };
        partner.tier = next;
        partner.updated_at = now;
        tx.put_partner(partner).await?;
        tx.append_audit(
            AuditEvent::new(AuditAction::PartnerPromoted, "Partner", partner_id, Actor::System, now)
                .with_partner(partner_id)
                .with_amount(perf.revenue)
                .with_note(Some(format!("{} -> {} on {} orders", upgrade.from, upgrade.to, perf.order_count))),
        )
        .await?;
        tx.commit().await?;

        info!(
            partner_id = %partner_id,
            from = %upgrade.from,
            to = %upgrade.to,
            revenue = perf.revenue,
            orders = perf.order_count,
            "partner promoted"
        );
        Ok(Some(upgrade))
    }
}
