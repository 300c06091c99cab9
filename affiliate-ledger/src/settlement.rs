//! Settlement Job
//!
//! One pass over every PENDING commission: reversals first, then releases
//! for commissions past their hold on DELIVERED orders. Tier promotion runs
//! after the commission pass.
//!
//! Each commission settles in its own transaction, so an interrupted run can
//! simply be started again.

use affiliate_core::*;
use affiliate_store::{AffiliateStore, CommissionFilter};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::ledger::LedgerService;
use crate::tier::{TierPromotionService, TierUpgrade};

/// Aggregate counts for one run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReport {
    pub processed_total: u32,
    pub released: u32,
    pub reversed: u32,
    pub partially_reversed: u32,
    /// Eligible but held for fraud review
    pub held: u32,
    pub failed: u32,
    pub tier_upgrades: Vec<TierUpgrade>,
}

/// Settlement job
#[derive(Clone)]
pub struct SettlementJob {
    store: Arc<dyn AffiliateStore>,
    config: Arc<LedgerConfig>,
    ledger: LedgerService,
    tiers: TierPromotionService,
}

impl SettlementJob {
    pub fn new(
        store: Arc<dyn AffiliateStore>,
        config: Arc<LedgerConfig>,
        ledger: LedgerService,
        tiers: TierPromotionService,
    ) -> Self {
        Self {
            store,
            config,
            ledger,
            tiers,
        }
    }

    /// Run the job once
    pub async fn run(&self, now: DateTime<Utc>) -> LedgerResult<SettlementReport> {
        let start = Instant::now();
        let (pending, held_partners) = {
            let reader = self.store.begin_read().await?;
            let pending = reader
                .list_commissions(&CommissionFilter::default().with_status(CommissionStatus::Pending))
                .await?;
            let held: HashMap<PartnerId, bool> = reader
                .list_risk_signals()
                .await?
                .into_iter()
                .map(|s| {
                    let held = self.config.risk_thresholds.holds(s.score);
                    (s.partner_id, held)
                })
                .collect();
            (pending, held)
        };

        let mut report = SettlementReport::default();
        for commission in pending {
            report.processed_total += 1;
            let held = held_partners
                .get(&commission.partner_id)
                .copied()
                .unwrap_or(false);
            match self.ledger.settle(&commission.commission_id, held, now).await {
                Ok(outcome) => {
                    report.released += outcome.released as u32;
                    report.reversed += outcome.reversed as u32;
                    report.partially_reversed += outcome.partially_reversed as u32;
                    report.held += outcome.held as u32;
                }
                Err(err) => {
                    report.failed += 1;
                    warn!(commission_id = %commission.commission_id, error = %err, "commission settlement failed");
                }
            }
        }

        match self.tiers.run(now).await {
            Ok(upgrades) => report.tier_upgrades = upgrades,
            Err(err) => warn!(error = %err, "tier promotion pass failed"),
        }

        counter!("affiliate_settlement_runs_total").increment(1);
        histogram!("affiliate_settlement_duration_seconds").record(start.elapsed().as_secs_f64());
        info!(
            processed = report.processed_total,
            released = report.released,
            reversed = report.reversed,
            partially_reversed = report.partially_reversed,
            held = report.held,
            failed = report.failed,
            tier_upgrades = report.tier_upgrades.len(),
            "settlement run complete"
        );
        Ok(report)
    }

    /// Run the job every `settlement_interval_secs`. Returns None when the
    /// interval is 0.
    pub fn spawn_scheduler(self) -> Option<JoinHandle<()>> {
        let secs = self.config.settlement_interval_secs;
        if secs == 0 {
            return None;
        }
        info!(interval_secs = secs, "settlement scheduler started");
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(err) = self.run(Utc::now()).await {
                    error!(error = %err, "scheduled settlement run failed");
                }
            }
        }))
    }
}
