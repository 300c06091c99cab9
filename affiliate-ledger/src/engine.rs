//! Affiliate Engine
//!
//! Wires every service over one store and one configuration.

use affiliate_store::{AffiliateStore, MemoryStore, SqliteStore, StoreHealth};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::attribution::AttributionService;
use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::fraud::FraudService;
use crate::ledger::LedgerService;
use crate::partner::PartnerService;
use crate::payout::PayoutService;
use crate::rules::RuleService;
use crate::settlement::SettlementJob;
use crate::tier::TierPromotionService;

/// Engine facade
#[derive(Clone)]
pub struct AffiliateEngine {
    store: Arc<dyn AffiliateStore>,
    config: Arc<LedgerConfig>,
    pub ledger: LedgerService,
    pub attribution: AttributionService,
    pub partners: PartnerService,
    pub payouts: PayoutService,
    pub rules: RuleService,
    pub fraud: FraudService,
    pub tiers: TierPromotionService,
    pub settlement: SettlementJob,
}

impl AffiliateEngine {
    pub fn new(store: Arc<dyn AffiliateStore>, config: LedgerConfig) -> Self {
        let config = Arc::new(config);
        let ledger = LedgerService::new(store.clone(), config.clone());
        let resolver = affiliate_core::AttributionResolver::new().with_session_ttl(config.session_ttl());
        let tiers = TierPromotionService::new(store.clone(), config.clone());
        Self {
            attribution: AttributionService::new(store.clone(), resolver),
            partners: PartnerService::new(store.clone()),
            payouts: PayoutService::new(store.clone(), config.clone(), ledger.clone()),
            rules: RuleService::new(store.clone()),
            fraud: FraudService::new(store.clone(), config.clone()),
            settlement: SettlementJob::new(store.clone(), config.clone(), ledger.clone(), tiers.clone()),
            tiers,
            ledger,
            store,
            config,
        }
    }

    /// Engine over a fresh in-memory store
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(Arc::new(MemoryStore::new()), config)
    }

    /// Engine over the store named by `config.database_url`, or in memory
    /// when none is configured
    pub async fn open(config: LedgerConfig) -> LedgerResult<Self> {
        match config.database_url.clone() {
            Some(url) => {
                let store = SqliteStore::connect(&url).await?;
                info!(url = %url, "ledger persisted to sqlite");
                Ok(Self::new(Arc::new(store), config))
            }
            None => {
                warn!("AFFILIATE_DATABASE_URL not set; ledger state is lost on restart");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn AffiliateStore> {
        &self.store
    }

    /// Startup work: seed default rules when configured
    pub async fn bootstrap(&self, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.config.seed_default_rules {
            self.rules.seed_defaults(&self.config.tier_rates, now).await?;
        }
        info!(
            hold_days = self.config.hold_days,
            formula = ?self.config.risk_formula,
            settlement = ?self.config.payout_settlement,
            "affiliate engine ready"
        );
        Ok(())
    }

    pub async fn health(&self) -> LedgerResult<StoreHealth> {
        Ok(self.store.health_check().await?)
    }
}
