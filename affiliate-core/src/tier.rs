//! Tier Promotion Rules
//!
//! One step per evaluation, never down.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Promotion thresholds over the trailing window
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub agent_revenue: Amount,
    pub agent_orders: u32,
    pub leader_revenue: Amount,
    pub leader_orders: u32,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            agent_revenue: 10_000_000,
            agent_orders: 10,
            leader_revenue: 50_000_000,
            leader_orders: 50,
        }
    }
}

/// Trailing referred performance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPerformance {
    pub revenue: Amount,
    pub order_count: u32,
}

impl TierPerformance {
    /// Sum the orders that count toward revenue
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a OrderSnapshot>) -> Self {
        orders
            .into_iter()
            .filter(|o| o.counts_for_revenue())
            .fold(Self::default(), |acc, o| Self {
                revenue: acc.revenue.saturating_add(o.net_base()),
                order_count: acc.order_count + 1,
            })
    }
}

impl TierThresholds {
    /// Next tier if the performance qualifies for it
    pub fn evaluate(&self, current: Tier, perf: &TierPerformance) -> Option<Tier> {
        let next = current.next()?;
        let (revenue, orders) = match next {
            Tier::Agent => (self.agent_revenue, self.agent_orders),
            Tier::Leader => (self.leader_revenue, self.leader_orders),
            Tier::Affiliate => return None,
        };
        (perf.revenue >= revenue && perf.order_count >= orders).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn perf(revenue: Amount, order_count: u32) -> TierPerformance {
        TierPerformance { revenue, order_count }
    }

    #[test]
    fn test_affiliate_to_agent() {
        let t = TierThresholds::default();
        assert_eq!(t.evaluate(Tier::Affiliate, &perf(12_000_000, 15)), Some(Tier::Agent));
        assert_eq!(t.evaluate(Tier::Affiliate, &perf(12_000_000, 9)), None);
        assert_eq!(t.evaluate(Tier::Affiliate, &perf(9_999_999, 100)), None);
    }

    #[test]
    fn test_one_step_per_run() {
        let t = TierThresholds::default();
        assert_eq!(t.evaluate(Tier::Affiliate, &perf(60_000_000, 60)), Some(Tier::Agent));
        assert_eq!(t.evaluate(Tier::Agent, &perf(60_000_000, 60)), Some(Tier::Leader));
        assert_eq!(t.evaluate(Tier::Leader, &perf(i64::MAX, u32::MAX)), None);
    }

    #[test]
    fn test_performance_counts_shipping_and_delivered() {
        let now = Utc::now();
        let mut shipped = OrderSnapshot::new(OrderId::new("o1"), 1_000_000, now).with_discount(100_000);
        shipped.delivery_status = DeliveryStatus::Shipping;
        let mut delivered = OrderSnapshot::new(OrderId::new("o2"), 500_000, now);
        delivered.delivery_status = DeliveryStatus::Delivered;
        let placed = OrderSnapshot::new(OrderId::new("o3"), 700_000, now);
        let mut cancelled = OrderSnapshot::new(OrderId::new("o4"), 700_000, now);
        cancelled.delivery_status = DeliveryStatus::Delivered;
        cancelled.cancelled = true;

        let p = TierPerformance::from_orders([&shipped, &delivered, &placed, &cancelled]);
        assert_eq!(p, perf(1_400_000, 2));
    }
}
