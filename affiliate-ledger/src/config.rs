//! Ledger Configuration
//!
//! Every business constant lives here with its default.
//!
//! # Environment
//!
//! - `AFFILIATE_HOLD_DAYS`: commission hold window (default: 14)
//! - `AFFILIATE_SESSION_TTL_DAYS`: attribution session lifetime (default: 7)
//! - `AFFILIATE_PAYOUT_MIN` / `AFFILIATE_PAYOUT_MAX`: payout bounds (default: 100000 / 50000000)
//! - `AFFILIATE_FRAUD_HOLD_SCORE` / `AFFILIATE_FRAUD_SUSPEND_SCORE`: risk thresholds (default: 40 / 80)
//! - `AFFILIATE_FRAUD_WINDOW_DAYS`: risk window (default: 30)
//! - `AFFILIATE_FRAUD_FORMULA`: `weighted` or `banded` (default: weighted)
//! - `AFFILIATE_PAYOUT_SETTLEMENT`: `earmark` or `all` (default: earmark)
//! - `AFFILIATE_TIER_WINDOW_DAYS`: promotion window (default: 30)
//! - `AFFILIATE_SEED_DEFAULT_RULES`: seed GLOBAL tier rules on startup (default: true)
//! - `AFFILIATE_SETTLEMENT_INTERVAL_SECS`: in-process scheduler period, 0 disables (default: 0)
//! - `AFFILIATE_DATABASE_URL`: SQLite ledger database, e.g. `sqlite://affiliate.db`;
//!   unset keeps the ledger in memory

use affiliate_core::{PayoutLimits, PayoutSettlement, RiskFormula, RiskThresholds, TierRates, TierThresholds};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{LedgerError, LedgerResult};

/// Ledger configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Commission hold window in days
    pub hold_days: i64,
    /// Attribution session lifetime in days
    pub session_ttl_days: i64,
    /// Payout bounds
    pub payout_limits: PayoutLimits,
    /// How paid payouts mark commissions
    pub payout_settlement: PayoutSettlement,
    /// Risk thresholds
    pub risk_thresholds: RiskThresholds,
    /// Risk scoring formula
    pub risk_formula: RiskFormula,
    /// Risk window in days
    pub fraud_window_days: i64,
    /// Tier promotion thresholds
    pub tier_thresholds: TierThresholds,
    /// Tier promotion window in days
    pub tier_window_days: i64,
    /// Default rate table
    pub tier_rates: TierRates,
    /// Seed one GLOBAL rule per tier on startup
    pub seed_default_rules: bool,
    /// In-process settlement period in seconds; 0 disables
    pub settlement_interval_secs: u64,
    /// Durable store location; `None` keeps the ledger in memory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            hold_days: affiliate_core::commission::DEFAULT_HOLD_DAYS,
            session_ttl_days: affiliate_core::attribution::DEFAULT_SESSION_TTL_DAYS,
            payout_limits: PayoutLimits::default(),
            payout_settlement: PayoutSettlement::default(),
            risk_thresholds: RiskThresholds::default(),
            risk_formula: RiskFormula::default(),
            fraud_window_days: 30,
            tier_thresholds: TierThresholds::default(),
            tier_window_days: 30,
            tier_rates: TierRates::default(),
            seed_default_rules: true,
            settlement_interval_secs: 0,
            database_url: None,
        }
    }
}

impl LedgerConfig {
    /// Defaults overridden from `AFFILIATE_*` variables
    pub fn from_env() -> LedgerResult<Self> {
        let mut config = Self::default();
        if let Some(v) = env_parse("AFFILIATE_HOLD_DAYS")? {
            config.hold_days = v;
        }
        if let Some(v) = env_parse("AFFILIATE_SESSION_TTL_DAYS")? {
            config.session_ttl_days = v;
        }
        if let Some(v) = env_parse("AFFILIATE_PAYOUT_MIN")? {
            config.payout_limits.minimum = v;
        }
        if let Some(v) = env_parse("AFFILIATE_PAYOUT_MAX")? {
            config.payout_limits.maximum = v;
        }
        if let Some(v) = env_parse("AFFILIATE_FRAUD_HOLD_SCORE")? {
            config.risk_thresholds.hold_above = v;
        }
        if let Some(v) = env_parse("AFFILIATE_FRAUD_SUSPEND_SCORE")? {
            config.risk_thresholds.suspend_above = v;
        }
        if let Some(v) = env_parse("AFFILIATE_FRAUD_WINDOW_DAYS")? {
            config.fraud_window_days = v;
        }
        if let Ok(v) = std::env::var("AFFILIATE_FRAUD_FORMULA") {
            config.risk_formula = parse_formula(&v)?;
        }
        if let Ok(v) = std::env::var("AFFILIATE_PAYOUT_SETTLEMENT") {
            config.payout_settlement = parse_settlement(&v)?;
        }
        if let Some(v) = env_parse("AFFILIATE_TIER_WINDOW_DAYS")? {
            config.tier_window_days = v;
        }
        if let Ok(v) = std::env::var("AFFILIATE_SEED_DEFAULT_RULES") {
            config.seed_default_rules = v.to_lowercase() != "false" && v != "0";
        }
        if let Some(v) = env_parse("AFFILIATE_SETTLEMENT_INTERVAL_SECS")? {
            config.settlement_interval_secs = v;
        }
        if let Ok(v) = std::env::var("AFFILIATE_DATABASE_URL") {
            let v = v.trim();
            if !v.is_empty() {
                config.database_url = Some(v.to_string());
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn validate(&self) -> LedgerResult<()> {
        if self.hold_days < 0 || self.session_ttl_days <= 0 {
            return Err(LedgerError::config("hold and session windows must be positive"));
        }
        if self.fraud_window_days <= 0 || self.tier_window_days <= 0 {
            return Err(LedgerError::config("fraud and tier windows must be positive"));
        }
        if self.payout_limits.minimum <= 0 || self.payout_limits.minimum > self.payout_limits.maximum {
            return Err(LedgerError::config("payout minimum must be positive and not above maximum"));
        }
        if self.risk_thresholds.hold_above > self.risk_thresholds.suspend_above {
            return Err(LedgerError::config("fraud hold score must not exceed suspend score"));
        }
        if let Some(url) = &self.database_url {
            if !url.starts_with("sqlite:") {
                return Err(LedgerError::config(format!("unsupported database url {}", url)));
            }
            if url.contains(":memory:") {
                return Err(LedgerError::config("in-memory sqlite does not survive the pool; unset the url instead"));
            }
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::days(self.session_ttl_days)
    }

    pub fn fraud_window(&self) -> Duration {
        Duration::days(self.fraud_window_days)
    }

    pub fn tier_window(&self) -> Duration {
        Duration::days(self.tier_window_days)
    }
}

fn env_parse<T: FromStr>(key: &str) -> LedgerResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| LedgerError::config(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

fn parse_formula(raw: &str) -> LedgerResult<RiskFormula> {
    match raw.trim().to_lowercase().as_str() {
        "weighted" => Ok(RiskFormula::Weighted),
        "banded" => Ok(RiskFormula::Banded),
        other => Err(LedgerError::config(format!("unknown fraud formula {}", other))),
    }
}

fn parse_settlement(raw: &str) -> LedgerResult<PayoutSettlement> {
    match raw.trim().to_lowercase().as_str() {
        "earmark" | "oldest_first" => Ok(PayoutSettlement::EarmarkOldestFirst),
        "all" | "all_available" => Ok(PayoutSettlement::AllAvailable),
        other => Err(LedgerError::config(format!("unknown payout settlement {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.hold_days, 14);
        assert_eq!(config.session_ttl_days, 7);
        assert_eq!(config.payout_limits.minimum, 100_000);
        assert_eq!(config.payout_limits.maximum, 50_000_000);
        assert_eq!(config.risk_thresholds.hold_above, 40);
        assert_eq!(config.risk_thresholds.suspend_above, 80);
        assert_eq!(config.risk_formula, RiskFormula::Weighted);
        assert_eq!(config.payout_settlement, PayoutSettlement::EarmarkOldestFirst);
        assert!(config.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_database_url() {
        let mut config = LedgerConfig::default();
        config.database_url = Some("sqlite://affiliate.db".to_string());
        assert!(config.validate().is_ok());
        config.database_url = Some("postgres://localhost/affiliate".to_string());
        assert!(config.validate().is_err());
        config.database_url = Some("sqlite::memory:".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = LedgerConfig::default();
        config.risk_thresholds.hold_above = 90;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!(parse_formula("BANDED").unwrap(), RiskFormula::Banded);
        assert!(parse_formula("linear").is_err());
        assert_eq!(parse_settlement("all").unwrap(), PayoutSettlement::AllAvailable);
    }
}
