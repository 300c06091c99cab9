//! Table layouts for the affiliate ledger backends
//!
//! [`StoreState`] backs the in-memory store: tables are ordered maps so
//! listings are deterministic, and wallet rows are kept per partner in
//! insertion order with the last row carrying the current balance.
//! [`SQLITE_SCHEMA`] is the durable layout.

use affiliate_core::*;
use std::collections::{BTreeMap, HashMap};

/// Session key: one session row per (session id, partner)
pub type SessionKey = (String, PartnerId);

/// All tables
#[derive(Clone, Debug, Default)]
pub struct StoreState {
    pub partners: BTreeMap<PartnerId, Partner>,
    /// Keyed by normalized code
    pub coupons: BTreeMap<String, Coupon>,
    pub sessions: BTreeMap<SessionKey, AttributionSession>,
    pub orders: BTreeMap<OrderId, OrderSnapshot>,
    pub referrals: BTreeMap<OrderId, OrderReferral>,
    pub commissions: BTreeMap<CommissionId, Commission>,
    /// Unique index: one commission per order
    pub commission_by_order: HashMap<OrderId, CommissionId>,
    pub rules: BTreeMap<RuleId, CommissionRule>,
    pub risk_signals: BTreeMap<PartnerId, RiskSignal>,
    pub wallets: BTreeMap<PartnerId, Vec<WalletTransaction>>,
    pub payouts: BTreeMap<PayoutId, PayoutRequest>,
    /// Append-only
    pub audit: Vec<AuditEvent>,
}

impl StoreState {
    /// Running balance for a partner
    pub fn balance(&self, partner_id: &PartnerId) -> Amount {
        self.wallets
            .get(partner_id)
            .and_then(|rows| rows.last())
            .map_or(0, |row| row.balance_after)
    }

    pub fn wallet_row_count(&self) -> usize {
        self.wallets.values().map(Vec::len).sum()
    }
}

/// SQLite table layout.
///
/// Entities are JSON documents in `body`, next to the columns used for
/// lookups, status guards and ordering. Wallet rows are fully relational.
/// Timestamps used for ordering are unix microseconds.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS partners (
        partner_id TEXT PRIMARY KEY,
        body TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS coupons (
        code TEXT PRIMARY KEY,
        body TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS attribution_sessions (
        session_id TEXT NOT NULL,
        partner_id TEXT NOT NULL,
        user_id TEXT,
        body TEXT NOT NULL,
        PRIMARY KEY (session_id, partner_id)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user ON attribution_sessions(user_id)",
    r#"CREATE TABLE IF NOT EXISTS orders (
        order_id TEXT PRIMARY KEY,
        partner_id TEXT,
        created_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_orders_partner ON orders(partner_id, created_at)",
    r#"CREATE TABLE IF NOT EXISTS order_referrals (
        order_id TEXT PRIMARY KEY,
        body TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS commissions (
        commission_id TEXT PRIMARY KEY,
        order_id TEXT NOT NULL UNIQUE,
        partner_id TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_commissions_status ON commissions(status, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_commissions_partner ON commissions(partner_id, created_at)",
    r#"CREATE TABLE IF NOT EXISTS commission_rules (
        rule_id TEXT PRIMARY KEY,
        body TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS risk_signals (
        partner_id TEXT PRIMARY KEY,
        body TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS wallet_transactions (
        tx_id TEXT PRIMARY KEY,
        partner_id TEXT NOT NULL,
        seq INTEGER NOT NULL,
        tx_type TEXT NOT NULL,
        amount INTEGER NOT NULL,
        balance_after INTEGER NOT NULL,
        commission_id TEXT,
        payout_id TEXT,
        created_at TEXT NOT NULL,
        UNIQUE (partner_id, seq)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS payout_requests (
        payout_id TEXT PRIMARY KEY,
        partner_id TEXT NOT NULL,
        status TEXT NOT NULL,
        requested_at INTEGER NOT NULL,
        body TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_payouts_partner ON payout_requests(partner_id, status)",
    r#"CREATE TABLE IF NOT EXISTS audit_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_id TEXT NOT NULL,
        body TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_events(entity_id)",
];
