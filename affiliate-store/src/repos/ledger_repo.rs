//! Ledger Repository Traits

use affiliate_core::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};

/// Commission listing filter
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommissionFilter {
    pub status: Option<CommissionStatus>,
    pub partner_id: Option<PartnerId>,
    pub order_id: Option<OrderId>,
}

impl CommissionFilter {
    pub fn with_status(mut self, status: CommissionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_partner(mut self, partner_id: PartnerId) -> Self {
        self.partner_id = Some(partner_id);
        self
    }

    pub fn matches(&self, c: &Commission) -> bool {
        self.status.map_or(true, |s| c.status == s)
            && self.partner_id.as_ref().map_or(true, |p| &c.partner_id == p)
            && self.order_id.as_ref().map_or(true, |o| &c.order_id == o)
    }
}

/// Payout listing filter
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PayoutFilter {
    pub status: Option<PayoutStatus>,
    pub partner_id: Option<PartnerId>,
}

impl PayoutFilter {
    pub fn matches(&self, p: &PayoutRequest) -> bool {
        self.status.map_or(true, |s| p.status == s)
            && self.partner_id.as_ref().map_or(true, |id| &p.partner_id == id)
    }
}

/// Wallet row to append; balance and sequence are assigned by the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewWalletTx {
    pub partner_id: PartnerId,
    pub tx_type: WalletTxType,
    pub amount: Amount,
    pub reference: Option<WalletRef>,
    pub created_at: DateTime<Utc>,
}

/// Read access, on a consistent snapshot
#[async_trait]
pub trait StoreRead: Send + Sync {
    // Partners and coupons
    async fn get_partner(&self, partner_id: &PartnerId) -> StoreResult<Option<Partner>>;
    async fn list_partners(&self) -> StoreResult<Vec<Partner>>;
    async fn get_coupon(&self, code: &str) -> StoreResult<Option<Coupon>>;
    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>>;

    // Attribution
    /// Sessions matching the session id or the user id
    async fn find_sessions(
        &self,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> StoreResult<Vec<AttributionSession>>;
    async fn get_session(
        &self,
        session_id: &str,
        partner_id: &PartnerId,
    ) -> StoreResult<Option<AttributionSession>>;
    async fn get_referral(&self, order_id: &OrderId) -> StoreResult<Option<OrderReferral>>;

    // Orders
    async fn get_order(&self, order_id: &OrderId) -> StoreResult<Option<OrderSnapshot>>;
    /// Orders credited to a partner created at or after `since`
    async fn list_referred_orders(
        &self,
        partner_id: &PartnerId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<OrderSnapshot>>;

    // Commissions and rules
    async fn get_commission(&self, commission_id: &CommissionId) -> StoreResult<Option<Commission>>;
    async fn get_commission_by_order(&self, order_id: &OrderId) -> StoreResult<Option<Commission>>;
    /// Oldest first
    async fn list_commissions(&self, filter: &CommissionFilter) -> StoreResult<Vec<Commission>>;
    async fn list_rules(&self) -> StoreResult<Vec<CommissionRule>>;
    async fn find_rule_by_key(&self, key: &RuleKey) -> StoreResult<Option<CommissionRule>>;

    // Risk
    async fn get_risk_signal(&self, partner_id: &PartnerId) -> StoreResult<Option<RiskSignal>>;
    async fn list_risk_signals(&self) -> StoreResult<Vec<RiskSignal>>;

    // Wallet
    /// All rows for a partner in insertion order
    async fn wallet_transactions(&self, partner_id: &PartnerId) -> StoreResult<Vec<WalletTransaction>>;
    /// Current running balance (0 for an empty wallet)
    async fn wallet_balance(&self, partner_id: &PartnerId) -> StoreResult<Amount>;
    /// Partners that have at least one wallet row
    async fn wallet_partners(&self) -> StoreResult<Vec<PartnerId>>;

    // Payouts
    async fn get_payout(&self, payout_id: &PayoutId) -> StoreResult<Option<PayoutRequest>>;
    /// Newest first
    async fn list_payouts(&self, filter: &PayoutFilter) -> StoreResult<Vec<PayoutRequest>>;
    /// The REQUESTED payout in flight for a partner, if any
    async fn outstanding_payout(&self, partner_id: &PartnerId) -> StoreResult<Option<PayoutRequest>>;

    // Audit
    async fn list_audit(&self, entity_id: Option<&str>) -> StoreResult<Vec<AuditEvent>>;

    /// Get partner or fail with NotFound
    async fn get_partner_required(&self, partner_id: &PartnerId) -> StoreResult<Partner> {
        self.get_partner(partner_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Partner", partner_id))
    }

    /// Get commission or fail with NotFound
    async fn get_commission_required(&self, commission_id: &CommissionId) -> StoreResult<Commission> {
        self.get_commission(commission_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Commission", commission_id))
    }

    /// Get order or fail with NotFound
    async fn get_order_required(&self, order_id: &OrderId) -> StoreResult<OrderSnapshot> {
        self.get_order(order_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Order", order_id))
    }

    /// Get payout or fail with NotFound
    async fn get_payout_required(&self, payout_id: &PayoutId) -> StoreResult<PayoutRequest> {
        self.get_payout(payout_id)
            .await?
            .ok_or_else(|| StoreError::not_found("PayoutRequest", payout_id))
    }
}

/// Write transaction.
///
/// Writes are visible to reads through the same transaction. Nothing is
/// persisted unless [`StoreTx::commit`] succeeds; dropping an uncommitted
/// transaction rolls every write back.
#[async_trait]
pub trait StoreTx: StoreRead {
    async fn put_partner(&mut self, partner: Partner) -> StoreResult<()>;
    /// Insert a new partner; fails if the id exists
    async fn insert_partner(&mut self, partner: Partner) -> StoreResult<()>;
    async fn put_coupon(&mut self, coupon: Coupon) -> StoreResult<()>;
    async fn put_session(&mut self, session: AttributionSession) -> StoreResult<()>;

    /// Insert a new order snapshot; fails if the id exists
    async fn insert_order(&mut self, order: OrderSnapshot) -> StoreResult<()>;
    async fn put_order(&mut self, order: OrderSnapshot) -> StoreResult<()>;
    /// Insert the referral; at most one per order
    async fn insert_referral(&mut self, referral: OrderReferral) -> StoreResult<()>;

    /// Insert a commission; at most one per order
    async fn insert_commission(&mut self, commission: Commission) -> StoreResult<()>;
    /// Replace a commission, guarded by the status it was read in
    async fn update_commission(
        &mut self,
        commission: Commission,
        expected: CommissionStatus,
    ) -> StoreResult<()>;

    async fn put_rule(&mut self, rule: CommissionRule) -> StoreResult<()>;
    async fn put_risk_signal(&mut self, signal: RiskSignal) -> StoreResult<()>;

    /// Append a wallet row computed from the running balance
    async fn append_wallet(&mut self, tx: NewWalletTx) -> StoreResult<WalletTransaction>;

    async fn insert_payout(&mut self, payout: PayoutRequest) -> StoreResult<()>;
    /// Replace a payout, guarded by the status it was read in
    async fn update_payout(&mut self, payout: PayoutRequest, expected: PayoutStatus) -> StoreResult<()>;

    async fn append_audit(&mut self, event: AuditEvent) -> StoreResult<()>;

    /// Make every write durable
    async fn commit(&mut self) -> StoreResult<()>;
}

/// Store entry point
#[async_trait]
pub trait AffiliateStore: Send + Sync {
    /// Open a read snapshot
    async fn begin_read(&self) -> StoreResult<Box<dyn StoreRead>>;
    /// Open a write transaction. Writers are serialized.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
    /// Backend health
    async fn health_check(&self) -> StoreResult<StoreHealth>;
}

/// Store health report
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreHealth {
    pub backend: String,
    pub healthy: bool,
    pub partners: usize,
    pub commissions: usize,
    pub wallet_rows: usize,
}
