//! Payouts and Wallet Rows

use super::common::*;
use super::status::{PayoutStatus, StatusMachine, WalletTxType};
use crate::error::AffiliateResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Partner withdrawal request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub payout_id: PayoutId,
    pub partner_id: PartnerId,
    pub amount: Amount,
    pub status: PayoutStatus,
    /// Partner bank account reference
    pub bank_ref: Option<String>,
    /// Payment transfer reference recorded on pay
    pub transaction_ref: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

impl PayoutRequest {
    pub fn new(partner_id: PartnerId, amount: Amount, now: DateTime<Utc>) -> Self {
        Self {
            payout_id: PayoutId::generate(),
            partner_id,
            amount,
            status: PayoutStatus::Requested,
            bank_ref: None,
            transaction_ref: None,
            requested_at: now,
            approved_at: None,
            paid_at: None,
            rejected_at: None,
            note: None,
        }
    }

    pub fn with_bank_ref(mut self, bank_ref: Option<String>) -> Self {
        self.bank_ref = bank_ref;
        self
    }

    /// Apply a status transition and stamp the matching timestamp
    pub fn transition(&mut self, target: PayoutStatus, now: DateTime<Utc>) -> AffiliateResult<()> {
        self.status = self.status.transition_to(target)?;
        match target {
            PayoutStatus::Approved => self.approved_at = Some(now),
            PayoutStatus::Paid => self.paid_at = Some(now),
            PayoutStatus::Rejected => self.rejected_at = Some(now),
            PayoutStatus::Requested => {}
        }
        Ok(())
    }
}

/// Immutable wallet ledger row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub tx_id: WalletTxId,
    pub partner_id: PartnerId,
    pub tx_type: WalletTxType,
    /// Signed amount
    pub amount: Amount,
    /// Running balance including this row
    pub balance_after: Amount,
    pub commission_id: Option<CommissionId>,
    pub payout_id: Option<PayoutId>,
    /// Per-partner sequence number, starting at 1
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

/// Source reference for a wallet row
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WalletRef {
    Commission(CommissionId),
    Payout(PayoutId),
}

/// Wallet view returned to partners
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletSummary {
    /// Sum of all wallet rows
    pub balance: Amount,
    /// PENDING commission total
    pub pending: Amount,
    /// Unpaid AVAILABLE commission total
    pub available: Amount,
    /// Most recent rows first
    pub transactions: Vec<WalletTransaction>,
}
