//! Partner Service
//!
//! Applications, status changes and coupon registration.

use affiliate_core::*;
use affiliate_store::AffiliateStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::error::LedgerResult;

/// Admin partner action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartnerAction {
    Approve,
    Suspend,
    Reactivate,
}

impl PartnerAction {
    fn target(self) -> PartnerStatus {
        match self {
            Self::Approve | Self::Reactivate => PartnerStatus::Active,
            Self::Suspend => PartnerStatus::Suspended,
        }
    }

    fn audit_action(self) -> AuditAction {
        match self {
            Self::Approve => AuditAction::PartnerApproved,
            Self::Suspend => AuditAction::PartnerSuspended,
            Self::Reactivate => AuditAction::PartnerReactivated,
        }
    }
}

impl std::str::FromStr for PartnerAction {
    type Err = AffiliateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Self::Approve),
            "suspend" => Ok(Self::Suspend),
            "reactivate" => Ok(Self::Reactivate),
            other => Err(AffiliateError::invalid_field(
                "action",
                format!("unknown partner action {}", other),
            )),
        }
    }
}

/// Partner service
#[derive(Clone)]
pub struct PartnerService {
    store: Arc<dyn AffiliateStore>,
}

impl PartnerService {
    pub fn new(store: Arc<dyn AffiliateStore>) -> Self {
        Self { store }
    }

    /// Register an application: PENDING, tier AFFILIATE
    pub async fn apply(&self, partner: Partner) -> LedgerResult<Partner> {
        if partner.name.trim().is_empty() {
            return Err(AffiliateError::invalid_field("name", "must not be empty").into());
        }
        let mut tx = self.store.begin().await?;
        tx.insert_partner(partner.clone()).await?;
        tx.commit().await?;
        info!(partner_id = %partner.partner_id, "partner application received");
        Ok(partner)
    }

    /// Apply an admin status change
    pub async fn act(
        &self,
        partner_id: &PartnerId,
        action: PartnerAction,
        actor: Actor,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Partner> {
        let mut tx = self.store.begin().await?;
        let mut partner = tx.get_partner_required(partner_id).await?;
        if action == PartnerAction::Approve && partner.status != PartnerStatus::Pending {
            return Err(AffiliateError::IllegalTransition {
                entity: PartnerStatus::ENTITY.to_string(),
                from: partner.status.to_string(),
                to: PartnerStatus::Active.to_string(),
            }
            .into());
        }
        partner.transition(action.target(), now)?;
        tx.put_partner(partner.clone()).await?;
        tx.append_audit(
            AuditEvent::new(action.audit_action(), "Partner", partner_id, actor, now)
                .with_partner(partner_id)
                .with_note(note),
        )
        .await?;
        tx.commit().await?;

        info!(partner_id = %partner_id, status = %partner.status, "partner status changed");
        Ok(partner)
    }

    pub async fn list(&self) -> LedgerResult<Vec<Partner>> {
        let reader = self.store.begin_read().await?;
        Ok(reader.list_partners().await?)
    }

    pub async fn get(&self, partner_id: &PartnerId) -> LedgerResult<Partner> {
        let reader = self.store.begin_read().await?;
        Ok(reader.get_partner_required(partner_id).await?)
    }

    /// Register or replace a coupon. An owned coupon needs a known partner.
    pub async fn register_coupon(&self, coupon: Coupon) -> LedgerResult<Coupon> {
        coupon.validate()?;
        let mut tx = self.store.begin().await?;
        if let Some(owner) = coupon.partner_id.as_ref() {
            tx.get_partner_required(owner).await?;
        }
        tx.put_coupon(coupon.clone()).await?;
        tx.commit().await?;
        info!(code = %coupon.code, "coupon registered");
        Ok(coupon)
    }

    pub async fn list_coupons(&self) -> LedgerResult<Vec<Coupon>> {
        let reader = self.store.begin_read().await?;
        Ok(reader.list_coupons().await?)
    }
}
