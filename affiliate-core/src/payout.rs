//! Payout Validation and Allocation

use crate::error::{AffiliateError, AffiliateResult};
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Per-request payout bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutLimits {
    pub minimum: Amount,
    pub maximum: Amount,
}

impl Default for PayoutLimits {
    fn default() -> Self {
        Self {
            minimum: 100_000,
            maximum: 50_000_000,
        }
    }
}

/// How a paid payout marks commissions PAID
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutSettlement {
    /// Earmark exactly the amount, oldest commissions first
    #[default]
    EarmarkOldestFirst,
    /// Mark every AVAILABLE commission PAID
    AllAvailable,
}

/// Validate a new payout request.
///
/// `available` is the partner's unpaid AVAILABLE total, `approved` the sum
/// of APPROVED payouts not yet paid (already promised out of `available`),
/// and `outstanding` any REQUESTED payout already in flight.
pub fn validate_request(
    amount: Amount,
    limits: &PayoutLimits,
    available: Amount,
    approved: Amount,
    outstanding: Option<&PayoutRequest>,
) -> AffiliateResult<()> {
    if amount < limits.minimum {
        return Err(AffiliateError::PayoutBelowMinimum {
            amount,
            minimum: limits.minimum,
        });
    }
    if amount > limits.maximum {
        return Err(AffiliateError::PayoutAboveMaximum {
            amount,
            maximum: limits.maximum,
        });
    }
    let spendable = available.saturating_sub(approved).max(0);
    if amount > spendable {
        return Err(AffiliateError::InsufficientFunds {
            requested: amount,
            available: spendable,
        });
    }
    if let Some(existing) = outstanding {
        return Err(AffiliateError::PayoutAlreadyOutstanding {
            partner_id: existing.partner_id.to_string(),
            payout_id: existing.payout_id.to_string(),
        });
    }
    Ok(())
}

/// Sum of APPROVED payouts awaiting payment
pub fn approved_total<'a>(payouts: impl IntoIterator<Item = &'a PayoutRequest>) -> Amount {
    payouts
        .into_iter()
        .filter(|p| p.status == PayoutStatus::Approved)
        .map(|p| p.amount)
        .sum()
}

/// Unpaid AVAILABLE total
pub fn available_total<'a>(commissions: impl IntoIterator<Item = &'a Commission>) -> Amount {
    commissions.into_iter().map(Commission::unpaid_amount).sum()
}

/// Share of a payout charged to one commission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub commission_id: CommissionId,
    /// Amount taken from this commission
    pub amount: Amount,
    /// Commission is now fully paid
    pub settles: bool,
}

/// Allocate a payout across AVAILABLE commissions.
pub fn allocate(
    commissions: &[Commission],
    amount: Amount,
    mode: PayoutSettlement,
) -> AffiliateResult<Vec<Allocation>> {
    let mut open: Vec<&Commission> = commissions
        .iter()
        .filter(|c| c.status == CommissionStatus::Available && c.unpaid_amount() > 0)
        .collect();
    let available = available_total(open.iter().copied());
    if amount > available {
        return Err(AffiliateError::InsufficientFunds {
            requested: amount,
            available,
        });
    }

    match mode {
        PayoutSettlement::AllAvailable => Ok(open
            .into_iter()
            .map(|c| Allocation {
                commission_id: c.commission_id.clone(),
                amount: c.unpaid_amount(),
                settles: true,
            })
            .collect()),
        PayoutSettlement::EarmarkOldestFirst => {
            open.sort_by(|a, b| {
                a.released_at
                    .cmp(&b.released_at)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.commission_id.cmp(&b.commission_id))
            });
            let mut remaining = amount;
            let mut out = Vec::new();
            for c in open {
                if remaining == 0 {
                    break;
                }
                let unpaid = c.unpaid_amount();
                let take = unpaid.min(remaining);
                remaining -= take;
                out.push(Allocation {
                    commission_id: c.commission_id.clone(),
                    amount: take,
                    settles: take == unpaid,
                });
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn available(id: &str, amount: Amount, age_days: i64) -> Commission {
        let now = Utc::now();
        let mut c = Commission::new(
            PartnerId::new("ptn_1"),
            OrderId::new(format!("ord_{}", id)),
            RuleId::new("rule_1"),
            amount,
            now,
            now - Duration::days(age_days + 14),
        );
        c.commission_id = CommissionId::new(id);
        c.transition(CommissionStatus::Available, now - Duration::days(age_days))
            .unwrap();
        c
    }

    #[test]
    fn test_request_bounds() {
        let limits = PayoutLimits::default();
        assert!(matches!(
            validate_request(99_999, &limits, 10_000_000, 0, None),
            Err(AffiliateError::PayoutBelowMinimum { .. })
        ));
        assert!(matches!(
            validate_request(50_000_001, &limits, 100_000_000, 0, None),
            Err(AffiliateError::PayoutAboveMaximum { .. })
        ));
        assert!(matches!(
            validate_request(200_000, &limits, 150_000, 0, None),
            Err(AffiliateError::InsufficientFunds { .. })
        ));
        assert!(validate_request(100_000, &limits, 100_000, 0, None).is_ok());
        assert!(validate_request(50_000_000, &limits, 50_000_000, 0, None).is_ok());
    }

    #[test]
    fn test_second_outstanding_request_rejected() {
        let existing = PayoutRequest::new(PartnerId::new("ptn_1"), 100_000, Utc::now());
        let err = validate_request(100_000, &PayoutLimits::default(), 1_000_000, 0, Some(&existing))
            .unwrap_err();
        assert!(matches!(err, AffiliateError::PayoutAlreadyOutstanding { .. }));
    }

    #[test]
    fn test_approved_payouts_reduce_spendable_funds() {
        let now = Utc::now();
        let mut approved = PayoutRequest::new(PartnerId::new("ptn_1"), 200_000, now);
        approved.transition(PayoutStatus::Approved, now).unwrap();
        let mut paid = PayoutRequest::new(PartnerId::new("ptn_1"), 50_000, now);
        paid.transition(PayoutStatus::Approved, now).unwrap();
        paid.transition(PayoutStatus::Paid, now).unwrap();
        let committed = approved_total([&approved, &paid]);
        assert_eq!(committed, 200_000);

        let limits = PayoutLimits::default();
        let err = validate_request(200_000, &limits, 200_000, committed, None).unwrap_err();
        assert!(matches!(
            err,
            AffiliateError::InsufficientFunds { requested: 200_000, available: 0 }
        ));
        assert!(validate_request(100_000, &limits, 300_000, committed, None).is_ok());
    }

    #[test]
    fn test_oldest_first_allocation() {
        let cs = vec![available("new", 60_000, 1), available("old", 50_000, 10), available("mid", 70_000, 5)];
        let alloc = allocate(&cs, 100_000, PayoutSettlement::EarmarkOldestFirst).unwrap();
        assert_eq!(alloc.len(), 2);
        assert_eq!(alloc[0].commission_id.as_str(), "old");
        assert!(alloc[0].settles);
        assert_eq!(alloc[1].commission_id.as_str(), "mid");
        assert_eq!(alloc[1].amount, 50_000);
        assert!(!alloc[1].settles);
    }

    #[test]
    fn test_all_available_allocation() {
        let cs = vec![available("a", 60_000, 1), available("b", 50_000, 10)];
        let alloc = allocate(&cs, 100_000, PayoutSettlement::AllAvailable).unwrap();
        assert_eq!(alloc.len(), 2);
        assert!(alloc.iter().all(|a| a.settles));
    }

    #[test]
    fn test_allocation_respects_partial_payment() {
        let mut c = available("a", 60_000, 1);
        c.paid_amount = 20_000;
        assert_eq!(available_total([&c]), 40_000);
        assert!(allocate(&[c], 50_000, PayoutSettlement::EarmarkOldestFirst).is_err());
    }
}
