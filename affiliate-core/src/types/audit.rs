//! Audit Events
//!
//! Written in the same store transaction as the change they describe.

use super::common::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audited action
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    CommissionCreated,
    CommissionReleased,
    CommissionReversed,
    CommissionPartiallyReversed,
    CommissionPaid,
    PayoutRequested,
    PayoutApproved,
    PayoutPaid,
    PayoutRejected,
    PartnerApproved,
    PartnerSuspended,
    PartnerReactivated,
    PartnerAutoSuspended,
    PartnerPromoted,
    RuleUpserted,
}

/// Who caused an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Actor {
    System,
    Admin(String),
    Partner(PartnerId),
    Collaborator(String),
}

impl Default for Actor {
    fn default() -> Self {
        Actor::System
    }
}

/// Audit trail entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: AuditEventId,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    pub partner_id: Option<PartnerId>,
    pub amount: Option<Amount>,
    pub note: Option<String>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        entity_type: &str,
        entity_id: impl ToString,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: AuditEventId::generate(),
            action,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            partner_id: None,
            amount: None,
            note: None,
            actor,
            at,
        }
    }

    pub fn with_partner(mut self, partner_id: &PartnerId) -> Self {
        self.partner_id = Some(partner_id.clone());
        self
    }

    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}
