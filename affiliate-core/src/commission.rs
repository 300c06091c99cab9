//! Commission Math and Lifecycle Checks
//!
//! Pricing, release gating and return-driven reversal planning. All checks
//! here run before any write; the store re-checks status at write time.

use crate::error::{AffiliateError, AffiliateResult};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Default hold window, mirrors the return window
pub const DEFAULT_HOLD_DAYS: i64 = 14;

/// Default commission rate per tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRates {
    pub affiliate: Decimal,
    pub agent: Decimal,
    pub leader: Decimal,
}

impl Default for TierRates {
    fn default() -> Self {
        Self {
            affiliate: Decimal::from(5),
            agent: Decimal::from(8),
            leader: Decimal::from(12),
        }
    }
}

impl TierRates {
    pub fn rate(&self, tier: Tier) -> Decimal {
        match tier {
            Tier::Affiliate => self.affiliate,
            Tier::Agent => self.agent,
            Tier::Leader => self.leader,
        }
    }

    /// One unrestricted-scope GLOBAL rule per tier
    pub fn default_rules(&self, now: DateTime<Utc>) -> Vec<CommissionRule> {
        Tier::ALL
            .iter()
            .map(|tier| CommissionRule::global(self.rate(*tier), now).for_tier(*tier))
            .collect()
    }
}

/// `round(net × rate[tier] / 100)`
pub fn calc_commission(net: Amount, tier: Tier, rates: &TierRates) -> Amount {
    percent_of(net, rates.rate(tier))
}

/// [`calc_commission`] for a tier name; unknown names use the AFFILIATE rate
pub fn calc_commission_by_name(net: Amount, tier: &str, rates: &TierRates) -> Amount {
    calc_commission(net, Tier::parse_or_default(tier), rates)
}

/// Commission owed under a rule, floored at zero
pub fn commission_amount(net_base: Amount, rule: &CommissionRule) -> Amount {
    percent_of(net_base, rule.percent)
        .saturating_add(rule.fixed_bonus)
        .max(0)
}

/// Hold-until for a commission created at `now`
pub fn hold_until(now: DateTime<Utc>, hold_days: i64) -> DateTime<Utc> {
    now + Duration::days(hold_days)
}

/// Reversal owed for a partial return:
/// `round(original × returned / subtotal)`, clamped to `[0, original]`.
pub fn proportional_reversal(original: Amount, returned: Amount, subtotal: Amount) -> Amount {
    if subtotal <= 0 || original <= 0 || returned <= 0 {
        return 0;
    }
    let returned = returned.min(subtotal);
    let value = Decimal::from(original) * Decimal::from(returned) / Decimal::from(subtotal);
    round_minor_units(value).clamp(0, original)
}

/// Check a PENDING -> AVAILABLE release.
///
/// Requires the transition to be legal, the hold to have passed and the
/// order to be DELIVERED.
pub fn check_release(commission: &Commission, order: &OrderSnapshot, now: DateTime<Utc>) -> AffiliateResult<()> {
    commission.status.transition_to(CommissionStatus::Available)?;
    if !commission.hold_elapsed(now) {
        return Err(AffiliateError::HoldNotElapsed {
            commission_id: commission.commission_id.to_string(),
            hold_until: commission.hold_until.to_rfc3339(),
        });
    }
    check_manual_release(commission, order)
}

/// Check an admin release. Skips the hold window; everything else in
/// [`check_release`] still applies.
pub fn check_manual_release(commission: &Commission, order: &OrderSnapshot) -> AffiliateResult<()> {
    commission.status.transition_to(CommissionStatus::Available)?;
    if !order.is_delivered() {
        return Err(AffiliateError::OrderNotDelivered {
            order_id: order.order_id.to_string(),
            status: order.delivery_status.to_string(),
        });
    }
    if order.is_voided() {
        return Err(AffiliateError::IllegalTransition {
            entity: CommissionStatus::ENTITY.to_string(),
            from: commission.status.to_string(),
            to: CommissionStatus::Available.to_string(),
        });
    }
    Ok(())
}

/// What a return or cancellation means for a commission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReversalPlan {
    /// Nothing to do
    Nothing,
    /// Reduce the commission by `delta`; it stays in its status
    Partial { delta: Amount },
    /// Move to REVERSED; `delta` is the amount still standing
    Full { delta: Amount },
}

impl ReversalPlan {
    pub fn delta(&self) -> Amount {
        match self {
            ReversalPlan::Nothing => 0,
            ReversalPlan::Partial { delta } | ReversalPlan::Full { delta } => *delta,
        }
    }
}

/// Plan the reversal implied by the order's current return/cancel state.
///
/// Idempotent: only the part not already reversed is planned. Amounts
/// already withdrawn by a payout are never reversed.
pub fn plan_reversal(commission: &Commission, order: &OrderSnapshot) -> ReversalPlan {
    match commission.status {
        CommissionStatus::Pending | CommissionStatus::Available => {}
        CommissionStatus::Reversed | CommissionStatus::Paid => return ReversalPlan::Nothing,
    }
    let reversible = reversible_amount(commission);
    if order.is_voided() {
        return ReversalPlan::Full { delta: reversible };
    }
    if !order.is_partially_returned() {
        return ReversalPlan::Nothing;
    }
    let target = proportional_reversal(commission.original_amount, order.returned_amount, order.subtotal);
    let delta = (target - commission.reversed_amount).min(reversible);
    if delta <= 0 {
        ReversalPlan::Nothing
    } else if delta == reversible {
        ReversalPlan::Full { delta }
    } else {
        ReversalPlan::Partial { delta }
    }
}

/// Part of the commission that can still be taken back
pub fn reversible_amount(commission: &Commission) -> Amount {
    (commission.amount - commission.paid_amount).max(0)
}

/// Check a manual or collaborator-driven full reversal
pub fn check_reverse(commission: &Commission) -> AffiliateResult<()> {
    commission.status.transition_to(CommissionStatus::Reversed)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commission(amount: Amount, now: DateTime<Utc>) -> Commission {
        Commission::new(
            PartnerId::new("ptn_1"),
            OrderId::new("ord_1"),
            RuleId::new("rule_1"),
            amount,
            hold_until(now, DEFAULT_HOLD_DAYS),
            now,
        )
    }

    fn order(subtotal: Amount, now: DateTime<Utc>) -> OrderSnapshot {
        OrderSnapshot::new(OrderId::new("ord_1"), subtotal, now)
    }

    #[test]
    fn test_calc_commission_rates() {
        let rates = TierRates::default();
        assert_eq!(calc_commission(1_000_000, Tier::Affiliate, &rates), 50_000);
        assert_eq!(calc_commission(1_000_000, Tier::Agent, &rates), 80_000);
        assert_eq!(calc_commission(1_000_000, Tier::Leader, &rates), 120_000);
        assert_eq!(calc_commission_by_name(1_000_000, "PLATINUM", &rates), 50_000);
        assert_eq!(calc_commission(999, Tier::Affiliate, &rates), 50); // 49.95
    }

    #[test]
    fn test_commission_amount_with_bonus_and_floor() {
        let now = Utc::now();
        let rule = CommissionRule::global(Decimal::from(5), now).with_fixed_bonus(1_000);
        assert_eq!(commission_amount(1_000_000, &rule), 51_000);
        assert_eq!(commission_amount(0, &rule), 1_000);
        let zero = CommissionRule::global(Decimal::ZERO, now);
        assert_eq!(commission_amount(1_000_000, &zero), 0);
    }

    #[test]
    fn test_default_rules_cover_every_tier() {
        let rules = TierRates::default().default_rules(Utc::now());
        assert_eq!(rules.len(), 3);
        assert!(rules.iter().all(|r| r.scope == RuleScope::Global && r.partner_level.is_some()));
    }

    #[test]
    fn test_proportional_reversal() {
        assert_eq!(proportional_reversal(50_000, 250_000, 1_000_000), 12_500);
        assert_eq!(proportional_reversal(50_000, 5_000_000, 1_000_000), 50_000);
        assert_eq!(proportional_reversal(50_000, 1, 3), 16_667);
        assert_eq!(proportional_reversal(50_000, 100, 0), 0);
    }

    #[test]
    fn test_release_requires_hold_and_delivery() {
        let now = Utc::now();
        let c = commission(50_000, now);
        let mut o = order(1_000_000, now);
        let after = c.hold_until + Duration::seconds(1);

        assert!(matches!(
            check_release(&c, &o, now),
            Err(AffiliateError::HoldNotElapsed { .. })
        ));
        o.delivery_status = DeliveryStatus::Shipping;
        assert!(matches!(
            check_release(&c, &o, after),
            Err(AffiliateError::OrderNotDelivered { .. })
        ));
        o.delivery_status = DeliveryStatus::Delivered;
        assert!(check_release(&c, &o, after).is_ok());
        assert!(check_release(&c, &o, c.hold_until).is_err());
    }

    #[test]
    fn test_manual_release_skips_hold_only() {
        let now = Utc::now();
        let c = commission(50_000, now);
        let mut o = order(1_000_000, now);
        assert!(matches!(
            check_manual_release(&c, &o),
            Err(AffiliateError::OrderNotDelivered { .. })
        ));
        o.delivery_status = DeliveryStatus::Delivered;
        assert!(check_manual_release(&c, &o).is_ok());
        o.cancelled = true;
        assert!(check_manual_release(&c, &o).is_err());
    }

    #[test]
    fn test_release_of_reversed_is_illegal() {
        let now = Utc::now();
        let mut c = commission(50_000, now);
        c.transition(CommissionStatus::Reversed, now).unwrap();
        let mut o = order(1_000_000, now);
        o.delivery_status = DeliveryStatus::Delivered;
        assert!(matches!(
            check_release(&c, &o, c.hold_until + Duration::days(1)),
            Err(AffiliateError::IllegalTransition { .. })
        ));
    }

    #[test]
    fn test_plan_partial_then_full() {
        let now = Utc::now();
        let mut c = commission(50_000, now);
        let mut o = order(1_000_000, now);

        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Nothing);

        o.returned_amount = 250_000;
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Partial { delta: 12_500 });

        c.amount -= 12_500;
        c.reversed_amount += 12_500;
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Nothing);

        o.returned_amount = 1_000_000;
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Full { delta: 37_500 });
    }

    #[test]
    fn test_plan_cancel_and_terminal() {
        let now = Utc::now();
        let mut c = commission(50_000, now);
        let mut o = order(1_000_000, now);
        o.cancelled = true;
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Full { delta: 50_000 });

        c.transition(CommissionStatus::Reversed, now).unwrap();
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Nothing);
        assert!(check_reverse(&c).is_err());
    }

    #[test]
    fn test_plan_keeps_paid_portion() {
        let now = Utc::now();
        let mut c = commission(50_000, now);
        c.transition(CommissionStatus::Available, now).unwrap();
        c.paid_amount = 30_000;
        let mut o = order(1_000_000, now);
        o.returned_amount = 500_000;
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Full { delta: 20_000 });
        o.returned_amount = 100_000;
        assert_eq!(plan_reversal(&c, &o), ReversalPlan::Partial { delta: 5_000 });
    }
}
