//! Data Transfer Objects
//!
//! Request and response DTOs for the affiliate API. Field names are
//! camelCase on the wire; enum values use the SCREAMING_SNAKE_CASE
//! vocabulary of the domain.

use affiliate_core::*;
use affiliate_ledger::{CommissionPage, OrderUpdateOutcome, PlacedOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================
// Commission DTOs
// ============================================

/// `GET /commissions` query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    /// 1-indexed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// `PATCH /commissions` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionActionRequest {
    pub commission_id: String,
    /// `release` or `reverse`
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Commission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDto {
    pub commission_id: String,
    pub partner_id: String,
    pub order_id: String,
    pub rule_id: String,
    pub status: CommissionStatus,
    pub original_amount: Amount,
    pub amount: Amount,
    pub reversed_amount: Amount,
    pub paid_amount: Amount,
    pub hold_until: DateTime<Utc>,
    pub review_hold: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<Commission> for CommissionDto {
    fn from(c: Commission) -> Self {
        Self {
            commission_id: c.commission_id.0,
            partner_id: c.partner_id.0,
            order_id: c.order_id.0,
            rule_id: c.rule_id.0,
            status: c.status,
            original_amount: c.original_amount,
            amount: c.amount,
            reversed_amount: c.reversed_amount,
            paid_amount: c.paid_amount,
            hold_until: c.hold_until,
            review_hold: c.review_hold,
            created_at: c.created_at,
            released_at: c.released_at,
            note: c.note,
        }
    }
}

/// Per-status aggregates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummaryDto {
    pub pending_count: u64,
    pub pending_amount: Amount,
    pub available_count: u64,
    pub available_amount: Amount,
    pub reversed_count: u64,
    pub reversed_amount: Amount,
    pub paid_count: u64,
    pub paid_amount: Amount,
}

impl From<StatusSummary> for StatusSummaryDto {
    fn from(s: StatusSummary) -> Self {
        Self {
            pending_count: s.pending_count,
            pending_amount: s.pending_amount,
            available_count: s.available_count,
            available_amount: s.available_amount,
            reversed_count: s.reversed_count,
            reversed_amount: s.reversed_amount,
            paid_count: s.paid_count,
            paid_amount: s.paid_amount,
        }
    }
}

/// Paginated commission list with aggregates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionListResponse {
    pub items: Vec<CommissionDto>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub has_more: bool,
    pub summary: StatusSummaryDto,
}

impl CommissionListResponse {
    pub fn from_page(page: CommissionPage, number: u32, page_size: u32) -> Self {
        let shown = (number.max(1) as u64 - 1) * page_size as u64 + page.items.len() as u64;
        Self {
            has_more: shown < page.total,
            items: page.items.into_iter().map(CommissionDto::from).collect(),
            total: page.total,
            page: number,
            page_size,
            summary: page.summary.into(),
        }
    }
}

// ============================================
// Rule DTOs
// ============================================

/// `POST /commission-rules` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpsertRequest {
    pub scope: RuleScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_level: Option<Tier>,
    pub percent: Decimal,
    #[serde(default)]
    pub fixed_bonus: Amount,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl RuleUpsertRequest {
    pub fn into_rule(self, now: DateTime<Utc>) -> CommissionRule {
        let mut rule = CommissionRule::new(self.scope, self.scope_id, self.percent, now)
            .with_fixed_bonus(self.fixed_bonus);
        rule.partner_level = self.partner_level;
        rule.active = self.active;
        rule
    }
}

/// Commission rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDto {
    pub rule_id: String,
    pub scope: RuleScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_level: Option<Tier>,
    pub percent: Decimal,
    pub fixed_bonus: Amount,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<CommissionRule> for RuleDto {
    fn from(r: CommissionRule) -> Self {
        Self {
            rule_id: r.rule_id.0,
            scope: r.scope,
            scope_id: r.scope_id,
            partner_level: r.partner_level,
            percent: r.percent,
            fixed_bonus: r.fixed_bonus,
            active: r.active,
            updated_at: r.updated_at,
        }
    }
}

// ============================================
// Fraud DTOs
// ============================================

/// Flagged partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudSignalDto {
    pub partner_id: String,
    pub flagged_score: u8,
    pub formula: RiskFormula,
    pub return_rate_pct: Decimal,
    pub cancel_rate_pct: Decimal,
    pub same_device_count: u32,
    pub same_address_count: u32,
    pub self_purchase_count: u32,
    pub suspicious_ip_count: u32,
    pub order_count: u32,
    pub computed_at: DateTime<Utc>,
}

impl From<RiskSignal> for FraudSignalDto {
    fn from(s: RiskSignal) -> Self {
        Self {
            partner_id: s.partner_id.0,
            flagged_score: s.score,
            formula: s.formula,
            return_rate_pct: s.inputs.return_rate_pct,
            cancel_rate_pct: s.inputs.cancel_rate_pct,
            same_device_count: s.inputs.same_device_count,
            same_address_count: s.inputs.same_address_count,
            self_purchase_count: s.inputs.self_purchase_count,
            suspicious_ip_count: s.inputs.suspicious_ip_count,
            order_count: s.order_count,
            computed_at: s.computed_at,
        }
    }
}

// ============================================
// Partner DTOs
// ============================================

/// `POST /partners` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerApplyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// `PATCH /partners` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerActionRequest {
    pub partner_id: String,
    /// `approve`, `suspend` or `reactivate`
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDto {
    pub partner_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub tier: Tier,
    pub status: PartnerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Partner> for PartnerDto {
    fn from(p: Partner) -> Self {
        Self {
            partner_id: p.partner_id.0,
            name: p.name,
            user_id: p.user_id,
            tier: p.tier,
            status: p.status,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// `POST /coupons` body and coupon view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponDto {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(default)]
    pub discount_percent: Decimal,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl CouponDto {
    pub fn into_coupon(self) -> Coupon {
        let mut coupon = Coupon::new(&self.code, self.discount_percent);
        coupon.partner_id = self.partner_id.map(PartnerId::new);
        coupon.active = self.active;
        coupon
    }
}

impl From<Coupon> for CouponDto {
    fn from(c: Coupon) -> Self {
        Self {
            code: c.code,
            partner_id: c.partner_id.map(|p| p.0),
            discount_percent: c.discount_percent,
            active: c.active,
        }
    }
}

// ============================================
// Wallet and Payout DTOs
// ============================================

/// Wallet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransactionDto {
    pub tx_id: String,
    #[serde(rename = "type")]
    pub tx_type: WalletTxType,
    pub amount: Amount,
    pub balance_after: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WalletTransaction> for WalletTransactionDto {
    fn from(t: WalletTransaction) -> Self {
        Self {
            tx_id: t.tx_id.0,
            tx_type: t.tx_type,
            amount: t.amount,
            balance_after: t.balance_after,
            commission_id: t.commission_id.map(|c| c.0),
            payout_id: t.payout_id.map(|p| p.0),
            created_at: t.created_at,
        }
    }
}

/// `GET /partner/wallet` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub balance: Amount,
    pub pending: Amount,
    pub available: Amount,
    pub transactions: Vec<WalletTransactionDto>,
}

impl From<WalletSummary> for WalletResponse {
    fn from(w: WalletSummary) -> Self {
        Self {
            balance: w.balance,
            pending: w.pending,
            available: w.available,
            transactions: w.transactions.into_iter().map(Into::into).collect(),
        }
    }
}

/// `POST /partner/wallet` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutCreateRequest {
    pub amount: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_ref: Option<String>,
}

/// `GET /payouts` query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
}

/// `PATCH /payouts` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutActionRequest {
    pub payout_id: String,
    /// `approve`, `pay` or `reject`
    pub action: String,
    /// Bank transfer reference on pay, reason on reject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
}

/// Payout request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutDto {
    pub payout_id: String,
    pub partner_id: String,
    pub amount: Amount,
    pub status: PayoutStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    pub requested_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl From<PayoutRequest> for PayoutDto {
    fn from(p: PayoutRequest) -> Self {
        Self {
            payout_id: p.payout_id.0,
            partner_id: p.partner_id.0,
            amount: p.amount,
            status: p.status,
            bank_ref: p.bank_ref,
            transaction_ref: p.transaction_ref,
            requested_at: p.requested_at,
            paid_at: p.paid_at,
            note: p.note,
        }
    }
}

// ============================================
// Collaborator hook DTOs
// ============================================

/// `POST /referrals/visit` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub partner_id: String,
}

/// Attribution session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub session_id: String,
    pub partner_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub last_touch_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<AttributionSession> for SessionDto {
    fn from(s: AttributionSession) -> Self {
        Self {
            session_id: s.session_id,
            partner_id: s.partner_id.0,
            user_id: s.user_id,
            last_touch_at: s.last_touch_at,
            expires_at: s.expires_at,
        }
    }
}

/// Order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    pub line_total: Amount,
}

/// `POST /orders` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateRequest {
    pub order_id: String,
    pub subtotal: Amount,
    #[serde(default)]
    pub discount_total: Amount,
    #[serde(default)]
    pub shipping_fee: Amount,
    #[serde(default)]
    pub items: Vec<OrderItemDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl OrderCreateRequest {
    /// Split into the snapshot and the attribution inputs
    pub fn into_parts(self, now: DateTime<Utc>) -> (OrderSnapshot, AttributionRequest) {
        let order = OrderSnapshot::new(OrderId::new(self.order_id), self.subtotal, now)
            .with_discount(self.discount_total)
            .with_shipping_fee(self.shipping_fee)
            .with_items(
                self.items
                    .into_iter()
                    .map(|i| OrderItem {
                        product_id: i.product_id,
                        category_id: i.category_id,
                        line_total: i.line_total,
                    })
                    .collect(),
            )
            .with_fingerprint(OrderFingerprint {
                device_id: self.device_id,
                address_hash: self.address_hash,
                ip_address: self.ip_address,
                user_id: self.user_id.clone(),
            });
        let request = AttributionRequest {
            coupon_code: self.coupon_code,
            session_id: self.session_id,
            user_id: self.user_id,
        };
        (order, request)
    }
}

/// Order referral
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralDto {
    pub order_id: String,
    pub partner_id: String,
    pub attribution_type: AttributionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<OrderReferral> for ReferralDto {
    fn from(r: OrderReferral) -> Self {
        Self {
            order_id: r.order_id.0,
            partner_id: r.partner_id.0,
            attribution_type: r.attribution_type,
            coupon_code: r.coupon_code,
            session_id: r.session_id,
            created_at: r.created_at,
        }
    }
}

/// `POST /orders` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateResponse {
    pub order_id: String,
    pub referral: Option<ReferralDto>,
    pub commission: Option<CommissionDto>,
}

impl From<PlacedOrder> for OrderCreateResponse {
    fn from(p: PlacedOrder) -> Self {
        Self {
            order_id: p.order.order_id.0,
            referral: p.referral.map(Into::into),
            commission: p.commission.map(Into::into),
        }
    }
}

/// `PATCH /orders` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateRequest {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returned_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
}

impl OrderUpdateRequest {
    pub fn update(&self) -> OrderUpdate {
        OrderUpdate {
            delivery_status: self.delivery_status,
            returned_amount: self.returned_amount,
            cancelled: self.cancelled,
        }
    }
}

/// `PATCH /orders` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateResponse {
    pub order_id: String,
    pub delivery_status: DeliveryStatus,
    pub returned_amount: Amount,
    pub cancelled: bool,
    /// Commission amount taken back by this update
    pub reversed: Amount,
    pub commission: Option<CommissionDto>,
}

impl From<OrderUpdateOutcome> for OrderUpdateResponse {
    fn from(o: OrderUpdateOutcome) -> Self {
        Self {
            order_id: o.order.order_id.0,
            delivery_status: o.order.delivery_status,
            returned_amount: o.order.returned_amount,
            cancelled: o.order.cancelled,
            reversed: o.reversal.delta(),
            commission: o.commission.map(Into::into),
        }
    }
}

// ============================================
// Audit DTOs
// ============================================

/// `GET /audit` query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

/// Audit event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEventDto {
    pub event_id: String,
    pub action: AuditAction,
    pub entity_type: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

impl From<AuditEvent> for AuditEventDto {
    fn from(e: AuditEvent) -> Self {
        Self {
            event_id: e.event_id.0,
            action: e.action,
            entity_type: e.entity_type,
            entity_id: e.entity_id,
            partner_id: e.partner_id.map(|p| p.0),
            amount: e.amount,
            note: e.note,
            actor: e.actor,
            at: e.at,
        }
    }
}

// ============================================
// Health DTOs
// ============================================

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Uptime seconds
    pub uptime_secs: u64,
    /// Component health
    pub components: Vec<ComponentHealth>,
}

/// Component health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Status
    pub status: String,
    /// Message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Acknowledgement for overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse<T> {
    pub ok: bool,
    pub data: T,
}

impl<T> OkResponse<T> {
    pub fn new(data: T) -> Self {
        Self { ok: true, data }
    }
}

fn default_true() -> bool {
    true
}
