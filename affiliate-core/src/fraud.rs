//! Fraud Risk Scorer
//!
//! Two formulas over the same inputs:
//! - `Weighted`: additive per-signal weights (default)
//! - `Banded`: coarse thresholds used by legacy bulk refreshes
//!
//! Both are monotonic non-decreasing in every input and clamped to [0, 100].

use crate::types::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum score
pub const MAX_SCORE: u8 = 100;

/// Score thresholds driving holds and suspensions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskThresholds {
    /// Scores above this hold auto-release
    pub hold_above: u8,
    /// Scores above this suspend the partner
    pub suspend_above: u8,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            hold_above: 40,
            suspend_above: 80,
        }
    }
}

/// Policy outcome for a score
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskDecision {
    Clear,
    HoldReleases,
    Suspend,
}

impl RiskThresholds {
    pub fn decide(&self, score: u8) -> RiskDecision {
        if score > self.suspend_above {
            RiskDecision::Suspend
        } else if score > self.hold_above {
            RiskDecision::HoldReleases
        } else {
            RiskDecision::Clear
        }
    }

    /// Releases must wait for manual review
    pub fn holds(&self, score: u8) -> bool {
        score > self.hold_above
    }
}

/// Risk scorer
#[derive(Clone, Copy, Debug, Default)]
pub struct RiskScorer {
    formula: RiskFormula,
}

impl RiskScorer {
    pub fn new(formula: RiskFormula) -> Self {
        Self { formula }
    }

    pub fn formula(&self) -> RiskFormula {
        self.formula
    }

    /// Score inputs with the configured formula
    pub fn score(&self, inputs: &RiskInputs) -> u8 {
        let raw = match self.formula {
            RiskFormula::Weighted => Self::weighted(inputs),
            RiskFormula::Banded => Self::banded(inputs),
        };
        raw.min(MAX_SCORE as u32) as u8
    }

    fn weighted(i: &RiskInputs) -> u32 {
        let mut score = 0u32;
        score += band(i.return_rate_pct, &[(25, 30), (15, 15)]);
        score += band(i.cancel_rate_pct, &[(20, 20), (10, 10)]);
        score = score.saturating_add(i.same_device_count.saturating_mul(5));
        score = score.saturating_add(i.same_address_count.saturating_mul(3));
        score = score.saturating_add(i.self_purchase_count.saturating_mul(10));
        score.saturating_add(i.suspicious_ip_count.saturating_mul(5))
    }

    fn banded(i: &RiskInputs) -> u32 {
        let mut score = 0u32;
        score += band(i.return_rate_pct, &[(50, 30), (35, 20), (25, 10)]);
        score += band(i.cancel_rate_pct, &[(40, 20), (25, 10)]);
        score += band(Decimal::from(i.same_device_count), &[(5, 20), (3, 10)]);
        score += band(Decimal::from(i.same_address_count), &[(3, 15), (1, 8)]);
        score += band(Decimal::from(i.suspicious_ip_count), &[(5, 15), (2, 8)]);
        score
    }

    /// Score and package a snapshot
    pub fn signal(&self, partner_id: PartnerId, inputs: RiskInputs, order_count: u32, now: DateTime<Utc>) -> RiskSignal {
        RiskSignal {
            score: self.score(&inputs),
            partner_id,
            inputs,
            formula: self.formula,
            order_count,
            computed_at: now,
        }
    }
}

/// Points for the first band the value strictly exceeds. Bands are ordered highest first.
fn band(value: Decimal, bands: &[(i64, u32)]) -> u32 {
    bands
        .iter()
        .find(|(limit, _)| value > Decimal::from(*limit))
        .map_or(0, |(_, points)| *points)
}

/// Derive risk inputs from a partner's referred orders in the window.
///
/// Repeat counts are orders whose fingerprint matches an earlier order.
pub fn derive_inputs(partner: &Partner, orders: &[OrderSnapshot]) -> RiskInputs {
    let mut sorted: Vec<&OrderSnapshot> = orders.iter().collect();
    sorted.sort_by_key(|o| o.created_at);

    let total = sorted.len() as u64;
    let returned = sorted.iter().filter(|o| o.returned_amount > 0).count() as u64;
    let cancelled = sorted.iter().filter(|o| o.cancelled).count() as u64;

    let mut devices = HashSet::new();
    let mut addresses = HashSet::new();
    let mut ips = HashSet::new();
    let mut inputs = RiskInputs {
        return_rate_pct: ratio_percent(returned, total),
        cancel_rate_pct: ratio_percent(cancelled, total),
        ..Default::default()
    };

    for order in sorted {
        let fp = &order.fingerprint;
        if let Some(device) = fp.device_id.as_deref() {
            if !devices.insert(device) {
                inputs.same_device_count += 1;
            }
        }
        if let Some(address) = fp.address_hash.as_deref() {
            if !addresses.insert(address) {
                inputs.same_address_count += 1;
            }
        }
        if let Some(ip) = fp.ip_address.as_deref() {
            if !ips.insert(ip) {
                inputs.suspicious_ip_count += 1;
            }
        }
        if let (Some(buyer), Some(owner)) = (fp.user_id.as_deref(), partner.user_id.as_deref()) {
            if buyer == owner {
                inputs.self_purchase_count += 1;
            }
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn inputs(ret: i64, cancel: i64, device: u32, address: u32, selfp: u32, ip: u32) -> RiskInputs {
        RiskInputs {
            return_rate_pct: Decimal::from(ret),
            cancel_rate_pct: Decimal::from(cancel),
            same_device_count: device,
            same_address_count: address,
            self_purchase_count: selfp,
            suspicious_ip_count: ip,
        }
    }

    #[test]
    fn test_weighted_formula() {
        let s = RiskScorer::new(RiskFormula::Weighted);
        assert_eq!(s.score(&RiskInputs::default()), 0);
        assert_eq!(s.score(&inputs(26, 0, 0, 0, 0, 0)), 30);
        assert_eq!(s.score(&inputs(16, 11, 0, 0, 0, 0)), 25);
        assert_eq!(s.score(&inputs(25, 20, 0, 0, 0, 0)), 25);
        assert_eq!(s.score(&inputs(0, 0, 2, 1, 1, 1)), 10 + 3 + 10 + 5);
    }

    #[test]
    fn test_banded_formula() {
        let s = RiskScorer::new(RiskFormula::Banded);
        assert_eq!(s.score(&inputs(51, 41, 6, 4, 0, 6)), 30 + 20 + 20 + 15 + 15);
        assert_eq!(s.score(&inputs(36, 26, 4, 2, 9, 3)), 20 + 10 + 10 + 8 + 8);
        assert_eq!(s.score(&inputs(26, 0, 3, 1, 0, 2)), 10);
    }

    #[test]
    fn test_score_is_clamped() {
        let s = RiskScorer::default();
        assert_eq!(s.score(&inputs(100, 100, u32::MAX, u32::MAX, u32::MAX, u32::MAX)), 100);
    }

    #[test]
    fn test_score_is_monotonic() {
        for formula in [RiskFormula::Weighted, RiskFormula::Banded] {
            let s = RiskScorer::new(formula);
            let mut prev = 0;
            for n in 0..40u32 {
                let score = s.score(&inputs(n as i64 * 2, n as i64, n / 2, n / 3, n / 5, n / 4));
                assert!(score >= prev, "{:?} dropped at {}", formula, n);
                prev = score;
            }
        }
    }

    #[test]
    fn test_thresholds() {
        let t = RiskThresholds::default();
        assert_eq!(t.decide(40), RiskDecision::Clear);
        assert_eq!(t.decide(41), RiskDecision::HoldReleases);
        assert_eq!(t.decide(80), RiskDecision::HoldReleases);
        assert_eq!(t.decide(81), RiskDecision::Suspend);
        assert!(t.holds(41));
    }

    #[test]
    fn test_derive_inputs() {
        let now = Utc::now();
        let partner = Partner::apply(PartnerId::new("ptn_1"), "P", now).with_user_id("u_owner");
        let mk = |id: &str, mins: i64, device: &str, user: &str| {
            OrderSnapshot::new(OrderId::new(id), 100_000, now + Duration::minutes(mins)).with_fingerprint(
                OrderFingerprint {
                    device_id: Some(device.into()),
                    address_hash: Some("addr".into()),
                    ip_address: None,
                    user_id: Some(user.into()),
                },
            )
        };
        let mut a = mk("o1", 0, "d1", "u_owner");
        a.returned_amount = 10;
        let b = mk("o2", 1, "d1", "u2");
        let mut c = mk("o3", 2, "d2", "u3");
        c.cancelled = true;
        let d = mk("o4", 3, "d3", "u4");

        let got = derive_inputs(&partner, &[d, c, b, a]);
        assert_eq!(got.return_rate_pct, Decimal::from(25));
        assert_eq!(got.cancel_rate_pct, Decimal::from(25));
        assert_eq!(got.same_device_count, 1);
        assert_eq!(got.same_address_count, 3);
        assert_eq!(got.self_purchase_count, 1);
        assert_eq!(got.suspicious_ip_count, 0);
    }

    #[test]
    fn test_derive_inputs_without_orders() {
        let partner = Partner::apply(PartnerId::new("ptn_1"), "P", Utc::now());
        assert_eq!(derive_inputs(&partner, &[]), RiskInputs::default());
    }
}
