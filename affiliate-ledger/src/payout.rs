//! Payout Service
//!
//! REQUESTED -> APPROVED -> PAID, or REQUESTED -> REJECTED. Payment is
//! delegated to the ledger service since it writes wallet rows.

use affiliate_core::payout::{approved_total, available_total, validate_request};
use affiliate_core::*;
use affiliate_store::{AffiliateStore, CommissionFilter, PayoutFilter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::ledger::LedgerService;

/// Admin payout action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayoutAction {
    Approve,
    Pay,
    Reject,
}

impl std::str::FromStr for PayoutAction {
    type Err = AffiliateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "pay" => Ok(Self::Pay),
            "reject" => Ok(Self::Reject),
            other => Err(AffiliateError::invalid_field(
                "action",
                format!("unknown payout action {}", other),
            )),
        }
    }
}

/// Payout service
#[derive(Clone)]
pub struct PayoutService {
    store: Arc<dyn AffiliateStore>,
    config: Arc<LedgerConfig>,
    ledger: LedgerService,
}

impl PayoutService {
    pub fn new(store: Arc<dyn AffiliateStore>, config: Arc<LedgerConfig>, ledger: LedgerService) -> Self {
        Self { store, config, ledger }
    }

    /// Create a REQUESTED payout after the amount, funds and single
    /// outstanding request checks. Funds already promised to APPROVED
    /// payouts are not available again.
    pub async fn request(
        &self,
        partner_id: &PartnerId,
        amount: Amount,
        bank_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<PayoutRequest> {
        let mut tx = self.store.begin().await?;
        let partner = tx.get_partner_required(partner_id).await?;
        partner.require_active()?;

        let available = available_total(
            &tx.list_commissions(
                &CommissionFilter::default()
                    .with_partner(partner_id.clone())
                    .with_status(CommissionStatus::Available),
            )
            .await?,
        );
        let approved = approved_total(
            &tx.list_payouts(&PayoutFilter {
                status: Some(PayoutStatus::Approved),
                partner_id: Some(partner_id.clone()),
            })
            .await?,
        );
        let outstanding = tx.outstanding_payout(partner_id).await?;
        validate_request(
            amount,
            &self.config.payout_limits,
            available,
            approved,
            outstanding.as_ref(),
        )?;

        let payout = PayoutRequest::new(partner_id.clone(), amount, now).with_bank_ref(bank_ref);
        tx.insert_payout(payout.clone()).await?;
        tx.append_audit(
            AuditEvent::new(
                AuditAction::PayoutRequested,
                "PayoutRequest",
                &payout.payout_id,
                Actor::Partner(partner_id.clone()),
                now,
            )
            .with_partner(partner_id)
            .with_amount(amount),
        )
        .await?;
        tx.commit().await?;

        info!(payout_id = %payout.payout_id, partner_id = %partner_id, amount, "payout requested");
        Ok(payout)
    }

    /// Apply an admin action
    pub async fn act(
        &self,
        payout_id: &PayoutId,
        action: PayoutAction,
        transaction_ref: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<PayoutRequest> {
        match action {
            PayoutAction::Approve => self.approve(payout_id, actor, now).await,
            PayoutAction::Reject => self.reject(payout_id, transaction_ref, actor, now).await,
            PayoutAction::Pay => self.ledger.pay(payout_id, transaction_ref, actor, now).await,
        }
    }

    /// REQUESTED -> APPROVED, no wallet effect
    pub async fn approve(&self, payout_id: &PayoutId, actor: Actor, now: DateTime<Utc>) -> LedgerResult<PayoutRequest> {
        let mut tx = self.store.begin().await?;
        let mut payout = tx.get_payout_required(payout_id).await?;
        let expected = payout.status;
        payout.transition(PayoutStatus::Approved, now)?;
        tx.get_partner_required(&payout.partner_id).await?.require_active()?;

        tx.update_payout(payout.clone(), expected).await?;
        tx.append_audit(
            AuditEvent::new(AuditAction::PayoutApproved, "PayoutRequest", payout_id, actor, now)
                .with_partner(&payout.partner_id)
                .with_amount(payout.amount),
        )
        .await?;
        tx.commit().await?;

        info!(payout_id = %payout_id, partner_id = %payout.partner_id, "payout approved");
        Ok(payout)
    }

    /// REQUESTED -> REJECTED, no wallet effect
    pub async fn reject(
        &self,
        payout_id: &PayoutId,
        note: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<PayoutRequest> {
        let mut tx = self.store.begin().await?;
        let mut payout = tx.get_payout_required(payout_id).await?;
        let expected = payout.status;
        payout.transition(PayoutStatus::Rejected, now)?;
        payout.note = note.clone();

        tx.update_payout(payout.clone(), expected).await?;
        tx.append_audit(
            AuditEvent::new(AuditAction::PayoutRejected, "PayoutRequest", payout_id, actor, now)
                .with_partner(&payout.partner_id)
                .with_amount(payout.amount)
                .with_note(note),
        )
        .await?;
        tx.commit().await?;

        info!(payout_id = %payout_id, partner_id = %payout.partner_id, "payout rejected");
        Ok(payout)
    }

    /// Payouts matching the filter, newest first
    pub async fn list(&self, filter: &PayoutFilter) -> LedgerResult<Vec<PayoutRequest>> {
        let reader = self.store.begin_read().await?;
        Ok(reader.list_payouts(filter).await?)
    }

    pub async fn get(&self, payout_id: &PayoutId) -> LedgerResult<PayoutRequest> {
        let reader = self.store.begin_read().await?;
        Ok(reader.get_payout_required(payout_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        assert_eq!("APPROVE".parse::<PayoutAction>().unwrap(), PayoutAction::Approve);
        assert_eq!("pay".parse::<PayoutAction>().unwrap(), PayoutAction::Pay);
        assert!("refund".parse::<PayoutAction>().is_err());
    }
}
