//! Attribution Sessions and Order Referrals

use super::common::*;
use super::status::AttributionType;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Browsing session credited to a partner by a referral-link visit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionSession {
    pub session_id: String,
    /// Signed-in user, if known
    pub user_id: Option<String>,
    pub partner_id: PartnerId,
    pub last_touch_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AttributionSession {
    pub fn new(
        session_id: impl Into<String>,
        partner_id: PartnerId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            partner_id,
            last_touch_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn with_user_id(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    /// Refresh last touch and expiry
    pub fn touch(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.last_touch_at = now;
        self.expires_at = now + ttl;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Immutable record of which partner was credited for an order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReferral {
    pub order_id: OrderId,
    pub partner_id: PartnerId,
    pub attribution_type: AttributionType,
    pub coupon_code: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
