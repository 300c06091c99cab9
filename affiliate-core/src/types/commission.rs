//! Commission Record
//!
//! One commission per order referral. `amount` is the live value after
//! partial reversals; `original_amount` never changes after creation.

use super::common::*;
use super::status::{CommissionStatus, StatusMachine};
use crate::error::AffiliateResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commission owed to a partner for one order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub commission_id: CommissionId,
    pub partner_id: PartnerId,
    pub order_id: OrderId,
    /// Rule that priced the commission
    pub rule_id: RuleId,
    pub status: CommissionStatus,
    /// Amount at creation
    pub original_amount: Amount,
    /// Current amount (original minus reversed)
    pub amount: Amount,
    /// Cumulative amount reversed by returns
    pub reversed_amount: Amount,
    /// Amount already withdrawn by payouts
    pub paid_amount: Amount,
    /// Earliest release time
    pub hold_until: DateTime<Utc>,
    /// Created while the partner was under fraud review
    pub review_hold: bool,
    pub created_at: DateTime<Utc>,
    pub released_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Last admin note
    pub note: Option<String>,
}

impl Commission {
    /// Create a PENDING commission
    pub fn new(
        partner_id: PartnerId,
        order_id: OrderId,
        rule_id: RuleId,
        amount: Amount,
        hold_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            commission_id: CommissionId::generate(),
            partner_id,
            order_id,
            rule_id,
            status: CommissionStatus::Pending,
            original_amount: amount,
            amount,
            reversed_amount: 0,
            paid_amount: 0,
            hold_until,
            review_hold: false,
            created_at: now,
            released_at: None,
            reversed_at: None,
            paid_at: None,
            note: None,
        }
    }

    /// Flag for manual review
    pub fn with_review_hold(mut self, held: bool) -> Self {
        self.review_hold = held;
        self
    }

    /// Amount still withdrawable from an AVAILABLE commission
    pub fn unpaid_amount(&self) -> Amount {
        match self.status {
            CommissionStatus::Available => (self.amount - self.paid_amount).max(0),
            _ => 0,
        }
    }

    pub fn hold_elapsed(&self, now: DateTime<Utc>) -> bool {
        now > self.hold_until
    }

    /// Apply a status transition and stamp the matching timestamp
    pub fn transition(&mut self, target: CommissionStatus, now: DateTime<Utc>) -> AffiliateResult<()> {
        self.status = self.status.transition_to(target)?;
        match target {
            CommissionStatus::Available => self.released_at = Some(now),
            CommissionStatus::Reversed => self.reversed_at = Some(now),
            CommissionStatus::Paid => self.paid_at = Some(now),
            CommissionStatus::Pending => {}
        }
        Ok(())
    }
}

/// Per-status aggregates for commission listings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub pending_count: u64,
    pub pending_amount: Amount,
    pub available_count: u64,
    pub available_amount: Amount,
    pub reversed_count: u64,
    pub reversed_amount: Amount,
    pub paid_count: u64,
    pub paid_amount: Amount,
}

impl StatusSummary {
    /// Fold a commission into the summary
    pub fn add(&mut self, c: &Commission) {
        match c.status {
            CommissionStatus::Pending => {
                self.pending_count += 1;
                self.pending_amount += c.amount;
            }
            CommissionStatus::Available => {
                self.available_count += 1;
                self.available_amount += c.unpaid_amount();
            }
            CommissionStatus::Reversed => {
                self.reversed_count += 1;
                self.reversed_amount += c.reversed_amount;
            }
            CommissionStatus::Paid => {
                self.paid_count += 1;
                self.paid_amount += c.amount;
            }
        }
    }

    pub fn from_commissions<'a>(items: impl IntoIterator<Item = &'a Commission>) -> Self {
        let mut summary = Self::default();
        for c in items {
            summary.add(c);
        }
        summary
    }
}
