//! Attribution Service
//!
//! Records referral-link visits and resolves order attribution against the
//! store. Resolution is read-only and runs on whatever snapshot or
//! transaction the caller holds.

use affiliate_core::*;
use affiliate_store::{AffiliateStore, StoreRead};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::LedgerResult;

/// Resolve attribution using a store reader.
pub async fn resolve_attribution<R>(
    reader: &R,
    resolver: &AttributionResolver,
    request: &AttributionRequest,
    now: DateTime<Utc>,
) -> LedgerResult<Option<Attribution>>
where
    R: StoreRead + ?Sized,
{
    let coupon = match request.coupon_code.as_deref() {
        Some(code) => reader.get_coupon(code).await?,
        None => None,
    };
    let sessions = reader
        .find_sessions(request.session_id.as_deref(), request.user_id.as_deref())
        .await?;

    let mut candidates: Vec<&PartnerId> = sessions.iter().map(|s| &s.partner_id).collect();
    if let Some(owner) = coupon.as_ref().and_then(|c| c.partner_id.as_ref()) {
        candidates.push(owner);
    }
    let mut active = HashSet::new();
    for partner_id in candidates {
        if active.contains(partner_id) {
            continue;
        }
        if let Some(partner) = reader.get_partner(partner_id).await? {
            if partner.is_active() {
                active.insert(partner.partner_id);
            }
        }
    }

    Ok(resolver.resolve(request, coupon.as_ref(), &sessions, |p| active.contains(p), now))
}

/// Attribution service
#[derive(Clone)]
pub struct AttributionService {
    store: Arc<dyn AffiliateStore>,
    resolver: AttributionResolver,
}

impl AttributionService {
    pub fn new(store: Arc<dyn AffiliateStore>, resolver: AttributionResolver) -> Self {
        Self { store, resolver }
    }

    pub fn resolver(&self) -> &AttributionResolver {
        &self.resolver
    }

    /// Record a referral-link visit, refreshing an existing session for the
    /// same (session, partner) pair.
    pub async fn record_visit(
        &self,
        session_id: &str,
        user_id: Option<String>,
        partner_id: &PartnerId,
        now: DateTime<Utc>,
    ) -> LedgerResult<AttributionSession> {
        if session_id.trim().is_empty() {
            return Err(AffiliateError::invalid_field("session_id", "must not be empty").into());
        }
        let mut tx = self.store.begin().await?;
        let partner = tx
            .get_partner(partner_id)
            .await?
            .ok_or_else(|| AffiliateError::not_found("Partner", partner_id))?;
        partner.require_active()?;

        let existing = tx.get_session(session_id, partner_id).await?;
        let session = self
            .resolver
            .record_visit(existing, session_id, user_id, partner_id.clone(), now);
        tx.put_session(session.clone()).await?;
        tx.commit().await?;

        debug!(session_id, partner_id = %partner_id, "referral visit recorded");
        Ok(session)
    }

    /// Resolve attribution on a fresh snapshot
    pub async fn resolve(
        &self,
        request: &AttributionRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Attribution>> {
        let reader = self.store.begin_read().await?;
        resolve_attribution(reader.as_ref(), &self.resolver, request, now).await
    }
}
