//! Attribution Resolver
//!
//! Pure decision over already-loaded coupons and sessions. Callers supply
//! the partner status lookup.

use super::{Attribution, AttributionRequest};
use crate::types::*;
use chrono::{DateTime, Duration, Utc};

/// Default session lifetime after the last touch
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

/// Attribution resolver
#[derive(Clone, Debug)]
pub struct AttributionResolver {
    /// Session lifetime after last touch
    session_ttl: Duration,
}

impl AttributionResolver {
    pub fn new() -> Self {
        Self {
            session_ttl: Duration::days(DEFAULT_SESSION_TTL_DAYS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Resolve attribution for an order.
    ///
    /// `coupon` is the coupon looked up by the request's code, and
    /// `sessions` are every session matching the request's user id or
    /// session id. `is_active` reports whether a partner is ACTIVE.
    pub fn resolve<F>(
        &self,
        request: &AttributionRequest,
        coupon: Option<&Coupon>,
        sessions: &[AttributionSession],
        is_active: F,
        now: DateTime<Utc>,
    ) -> Option<Attribution>
    where
        F: Fn(&PartnerId) -> bool,
    {
        if let Some(found) = self.resolve_coupon(request, coupon, &is_active) {
            return Some(found);
        }
        self.resolve_last_click(request, sessions, &is_active, now)
    }

    fn resolve_coupon<F>(
        &self,
        request: &AttributionRequest,
        coupon: Option<&Coupon>,
        is_active: &F,
    ) -> Option<Attribution>
    where
        F: Fn(&PartnerId) -> bool,
    {
        let code = Coupon::normalize(request.coupon_code.as_deref()?);
        let coupon = coupon.filter(|c| c.code == code && c.active)?;
        let partner_id = coupon.partner_id.as_ref().filter(|p| is_active(p))?;
        Some(Attribution {
            partner_id: partner_id.clone(),
            attribution_type: AttributionType::Coupon,
            coupon_code: Some(coupon.code.clone()),
            session_id: None,
        })
    }

    fn resolve_last_click<F>(
        &self,
        request: &AttributionRequest,
        sessions: &[AttributionSession],
        is_active: &F,
        now: DateTime<Utc>,
    ) -> Option<Attribution>
    where
        F: Fn(&PartnerId) -> bool,
    {
        let eligible = |s: &&AttributionSession| !s.is_expired(now) && is_active(&s.partner_id);

        let by_user = request.user_id.as_deref().and_then(|user| {
            sessions
                .iter()
                .filter(|s| s.user_id.as_deref() == Some(user))
                .filter(eligible)
                .max_by_key(|s| s.last_touch_at)
        });

        let chosen = by_user.or_else(|| {
            let session_id = request.session_id.as_deref()?;
            sessions
                .iter()
                .filter(|s| s.session_id == session_id)
                .filter(eligible)
                .max_by_key(|s| s.last_touch_at)
        })?;

        Some(Attribution {
            partner_id: chosen.partner_id.clone(),
            attribution_type: AttributionType::LastClick,
            coupon_code: None,
            session_id: Some(chosen.session_id.clone()),
        })
    }

    /// Record a referral-link visit. Refreshes the existing session for the
    /// same (session, partner) pair instead of creating a duplicate.
    pub fn record_visit(
        &self,
        existing: Option<AttributionSession>,
        session_id: &str,
        user_id: Option<String>,
        partner_id: PartnerId,
        now: DateTime<Utc>,
    ) -> AttributionSession {
        match existing {
            Some(mut session) => {
                session.touch(now, self.session_ttl);
                if user_id.is_some() {
                    session.user_id = user_id;
                }
                session
            }
            None => AttributionSession::new(session_id, partner_id, now, self.session_ttl)
                .with_user_id(user_id),
        }
    }
}

impl Default for AttributionResolver {
    fn default() -> Self {
        Self::new()
    }
}
