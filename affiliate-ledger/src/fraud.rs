//! Fraud Service
//!
//! Periodic risk recompute over a rolling window. Each partner is scored in
//! its own transaction; a failure is counted and the run moves on.

use affiliate_core::fraud::derive_inputs;
use affiliate_core::*;
use affiliate_store::AffiliateStore;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerResult;

/// Outcome of a bulk recompute
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudRefreshReport {
    pub evaluated: u32,
    /// Scored at or above the hold threshold
    pub flagged: u32,
    pub suspended: Vec<PartnerId>,
    pub failed: u32,
}

/// Fraud service
#[derive(Clone)]
pub struct FraudService {
    store: Arc<dyn AffiliateStore>,
    config: Arc<LedgerConfig>,
    scorer: RiskScorer,
}

impl FraudService {
    pub fn new(store: Arc<dyn AffiliateStore>, config: Arc<LedgerConfig>) -> Self {
        let scorer = RiskScorer::new(config.risk_formula);
        Self { store, config, scorer }
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    /// Recompute every ACTIVE partner's score
    pub async fn recompute_all(&self, now: DateTime<Utc>) -> LedgerResult<FraudRefreshReport> {
        let partners = {
            let reader = self.store.begin_read().await?;
            reader.list_partners().await?
        };

        let mut report = FraudRefreshReport::default();
        for partner in partners.into_iter().filter(Partner::is_active) {
            report.evaluated += 1;
            match self.recompute_partner(&partner.partner_id, now).await {
                Ok(signal) => {
                    if signal.score >= self.config.risk_thresholds.hold_above {
                        report.flagged += 1;
                    }
                    if self.config.risk_thresholds.decide(signal.score) == RiskDecision::Suspend {
                        report.suspended.push(partner.partner_id);
                    }
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(partner_id = %partner.partner_id, error = %err, "risk recompute failed");
                }
            }
        }

        counter!("affiliate_fraud_refresh_runs_total").increment(1);
        info!(
            evaluated = report.evaluated,
            flagged = report.flagged,
            suspended = report.suspended.len(),
            failed = report.failed,
            "risk scores recomputed"
        );
        Ok(report)
    }

    /// Score one partner over the window, store the snapshot and suspend the
    /// partner when the score crosses the suspend threshold.
    pub async fn recompute_partner(&self, partner_id: &PartnerId, now: DateTime<Utc>) -> LedgerResult<RiskSignal> {
        let mut tx = self.store.begin().await?;
        let mut partner = tx.get_partner_required(partner_id).await?;
        let orders = tx
            .list_referred_orders(partner_id, now - self.config.fraud_window())
            .await?;

        let inputs = derive_inputs(&partner, &orders);
        let signal = self
            .scorer
            .signal(partner_id.clone(), inputs, orders.len() as u32, now);
        tx.put_risk_signal(signal.clone()).await?;

        let decision = self.config.risk_thresholds.decide(signal.score);
        if decision == RiskDecision::Suspend && partner.is_active() {
            partner.transition(PartnerStatus::Suspended, now)?;
            tx.put_partner(partner.clone()).await?;
            tx.append_audit(
                AuditEvent::new(AuditAction::PartnerAutoSuspended, "Partner", partner_id, Actor::System, now)
                    .with_partner(partner_id)
                    .with_note(Some(format!("risk score {}", signal.score))),
            )
            .await?;
            warn!(partner_id = %partner_id, score = signal.score, "partner auto-suspended");
        }
        tx.commit().await?;
        Ok(signal)
    }

    /// Stored signals at or above the hold threshold, highest first
    pub async fn flagged(&self) -> LedgerResult<Vec<RiskSignal>> {
        let reader = self.store.begin_read().await?;
        let mut signals: Vec<RiskSignal> = reader
            .list_risk_signals()
            .await?
            .into_iter()
            .filter(|s| s.score >= self.config.risk_thresholds.hold_above)
            .collect();
        signals.sort_by(|a, b| b.score.cmp(&a.score).then(a.partner_id.cmp(&b.partner_id)));
        Ok(signals)
    }

    /// Partner's current score is above the hold threshold
    pub async fn is_held(&self, partner_id: &PartnerId) -> LedgerResult<bool> {
        let reader = self.store.begin_read().await?;
        Ok(reader
            .get_risk_signal(partner_id)
            .await?
            .map_or(false, |s| self.config.risk_thresholds.holds(s.score)))
    }
}
