//! Attribution
//!
//! Decides which partner, if any, is credited for an order:
//! - Partner-owned coupon (always wins)
//! - Last-click referral session
//! - Otherwise organic

mod resolver;

pub use resolver::*;

use crate::types::*;
use serde::{Deserialize, Serialize};

/// Attribution inputs captured at checkout
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRequest {
    pub coupon_code: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl AttributionRequest {
    pub fn with_coupon(mut self, code: impl Into<String>) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Resolved attribution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution {
    pub partner_id: PartnerId,
    pub attribution_type: AttributionType,
    pub coupon_code: Option<String>,
    pub session_id: Option<String>,
}

impl Attribution {
    /// Build the immutable referral record
    pub fn into_referral(self, order_id: OrderId, now: chrono::DateTime<chrono::Utc>) -> OrderReferral {
        OrderReferral {
            order_id,
            partner_id: self.partner_id,
            attribution_type: self.attribution_type,
            coupon_code: self.coupon_code,
            session_id: self.session_id,
            created_at: now,
        }
    }
}
