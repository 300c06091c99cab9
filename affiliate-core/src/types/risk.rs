//! Risk Signals

use super::common::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Behavioral inputs over the rolling window
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskInputs {
    /// Percent of referred orders with a return
    pub return_rate_pct: Decimal,
    /// Percent of referred orders cancelled
    pub cancel_rate_pct: Decimal,
    pub same_device_count: u32,
    pub same_address_count: u32,
    pub self_purchase_count: u32,
    pub suspicious_ip_count: u32,
}

/// Scoring formula
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFormula {
    /// Per-signal additive weights
    #[default]
    Weighted,
    /// Coarse banded thresholds
    Banded,
}

/// Per-partner risk snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskSignal {
    pub partner_id: PartnerId,
    pub inputs: RiskInputs,
    pub formula: RiskFormula,
    /// Flagged score in [0, 100]
    pub score: u8,
    /// Number of referred orders considered
    pub order_count: u32,
    pub computed_at: DateTime<Utc>,
}
