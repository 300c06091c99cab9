//! Order Snapshot
//!
//! Read model of an order owned by the checkout collaborator. The engine
//! records what it is told and never invents order state.

use super::common::*;
use super::status::DeliveryStatus;
use crate::error::{AffiliateError, AffiliateResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One purchased line
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub category_id: Option<String>,
    pub line_total: Amount,
}

/// Optional risk fingerprints captured at checkout
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFingerprint {
    pub device_id: Option<String>,
    pub address_hash: Option<String>,
    pub ip_address: Option<String>,
    /// Purchasing user account
    pub user_id: Option<String>,
}

/// Order snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub subtotal: Amount,
    pub discount_total: Amount,
    /// Never commissionable
    pub shipping_fee: Amount,
    pub items: Vec<OrderItem>,
    pub delivery_status: DeliveryStatus,
    /// Cumulative returned line value
    pub returned_amount: Amount,
    pub cancelled: bool,
    pub fingerprint: OrderFingerprint,
    /// Partner credited for the order, if any
    pub partner_id: Option<PartnerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSnapshot {
    pub fn new(order_id: OrderId, subtotal: Amount, now: DateTime<Utc>) -> Self {
        Self {
            order_id,
            subtotal,
            discount_total: 0,
            shipping_fee: 0,
            items: Vec::new(),
            delivery_status: DeliveryStatus::Placed,
            returned_amount: 0,
            cancelled: false,
            fingerprint: OrderFingerprint::default(),
            partner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_discount(mut self, discount_total: Amount) -> Self {
        self.discount_total = discount_total;
        self
    }

    pub fn with_shipping_fee(mut self, shipping_fee: Amount) -> Self {
        self.shipping_fee = shipping_fee;
        self
    }

    pub fn with_items(mut self, items: Vec<OrderItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: OrderFingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Commissionable base: subtotal minus discount, shipping excluded
    pub fn net_base(&self) -> Amount {
        (self.subtotal - self.discount_total).max(0)
    }

    pub fn product_ids(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.product_id.as_str()).collect()
    }

    pub fn category_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|i| i.category_id.as_deref())
            .collect()
    }

    pub fn is_fully_returned(&self) -> bool {
        self.subtotal > 0 && self.returned_amount >= self.subtotal
    }

    pub fn is_partially_returned(&self) -> bool {
        self.returned_amount > 0 && !self.is_fully_returned()
    }

    /// Cancelled or fully returned
    pub fn is_voided(&self) -> bool {
        self.cancelled || self.is_fully_returned()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivery_status == DeliveryStatus::Delivered
    }

    /// Counts toward referred revenue for tier promotion
    pub fn counts_for_revenue(&self) -> bool {
        !self.cancelled
            && matches!(
                self.delivery_status,
                DeliveryStatus::Shipping | DeliveryStatus::Delivered
            )
    }

    pub fn validate(&self) -> AffiliateResult<()> {
        if self.order_id.as_str().trim().is_empty() {
            return Err(AffiliateError::invalid_field("order_id", "must not be empty"));
        }
        if self.subtotal < 0 {
            return Err(AffiliateError::invalid_amount("subtotal must not be negative"));
        }
        if self.discount_total < 0 || self.shipping_fee < 0 {
            return Err(AffiliateError::invalid_amount(
                "discount and shipping must not be negative",
            ));
        }
        if self.returned_amount < 0 {
            return Err(AffiliateError::invalid_amount("returned amount must not be negative"));
        }
        if self.items.iter().any(|i| i.line_total < 0) {
            return Err(AffiliateError::invalid_amount("line totals must not be negative"));
        }
        Ok(())
    }
}

/// Status update pushed by the shipping/returns collaborator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub delivery_status: Option<DeliveryStatus>,
    /// New cumulative returned amount
    pub returned_amount: Option<Amount>,
    pub cancelled: Option<bool>,
}

impl OrderUpdate {
    /// Apply to a snapshot. Returned amount is clamped to the subtotal and never decreases.
    pub fn apply_to(&self, order: &mut OrderSnapshot, now: DateTime<Utc>) -> AffiliateResult<()> {
        if let Some(returned) = self.returned_amount {
            if returned < 0 {
                return Err(AffiliateError::invalid_amount("returned amount must not be negative"));
            }
            order.returned_amount = order.returned_amount.max(returned.min(order.subtotal));
        }
        if let Some(status) = self.delivery_status {
            order.delivery_status = status;
        }
        if let Some(cancelled) = self.cancelled {
            order.cancelled = order.cancelled || cancelled;
        }
        order.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> OrderSnapshot {
        OrderSnapshot::new(OrderId::new("ord_1"), 1_000_000, Utc::now())
            .with_discount(100_000)
            .with_shipping_fee(30_000)
    }

    #[test]
    fn test_net_base_excludes_shipping() {
        assert_eq!(order().net_base(), 900_000);
    }

    #[test]
    fn test_return_classification() {
        let mut o = order();
        assert!(!o.is_partially_returned());
        o.returned_amount = 250_000;
        assert!(o.is_partially_returned());
        assert!(!o.is_voided());
        o.returned_amount = 1_000_000;
        assert!(o.is_fully_returned());
        assert!(o.is_voided());
    }

    #[test]
    fn test_update_is_monotonic() {
        let mut o = order();
        let now = Utc::now();
        OrderUpdate { returned_amount: Some(400_000), ..Default::default() }
            .apply_to(&mut o, now)
            .unwrap();
        OrderUpdate { returned_amount: Some(100_000), ..Default::default() }
            .apply_to(&mut o, now)
            .unwrap();
        assert_eq!(o.returned_amount, 400_000);
        OrderUpdate { returned_amount: Some(5_000_000), ..Default::default() }
            .apply_to(&mut o, now)
            .unwrap();
        assert_eq!(o.returned_amount, 1_000_000);
    }

    #[test]
    fn test_revenue_counting() {
        let mut o = order();
        assert!(!o.counts_for_revenue());
        o.delivery_status = DeliveryStatus::Shipping;
        assert!(o.counts_for_revenue());
        o.cancelled = true;
        assert!(!o.counts_for_revenue());
    }
}
