//! In-Memory Store Implementation
//!
//! A single `tokio::sync::RwLock` guards every table. Read snapshots hold
//! the read lock; a write transaction holds the write lock from `begin`
//! until it is dropped, so writers are serialized and a balance read inside
//! a transaction cannot go stale. Each write records its inverse in an undo
//! log that is replayed on drop unless the transaction committed.

use affiliate_core::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::repos::{
    AffiliateStore, CommissionFilter, NewWalletTx, PayoutFilter, StoreHealth, StoreRead, StoreTx,
};
use crate::schema::{SessionKey, StoreState};

/// In-memory affiliate store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AffiliateStore for MemoryStore {
    async fn begin_read(&self) -> StoreResult<Box<dyn StoreRead>> {
        let guard = self.state.clone().read_owned().await;
        Ok(Box::new(MemoryReader { guard }))
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = self.state.clone().write_owned().await;
        Ok(Box::new(MemoryTx {
            guard,
            undo: Vec::new(),
            committed: false,
        }))
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        let state = self.state.read().await;
        Ok(StoreHealth {
            backend: "memory".to_string(),
            healthy: true,
            partners: state.partners.len(),
            commissions: state.commissions.len(),
            wallet_rows: state.wallet_row_count(),
        })
    }
}

/// Read snapshot
pub struct MemoryReader {
    guard: OwnedRwLockReadGuard<StoreState>,
}

impl MemoryReader {
    fn state(&self) -> &StoreState {
        &self.guard
    }
}

/// Write transaction
pub struct MemoryTx {
    guard: OwnedRwLockWriteGuard<StoreState>,
    undo: Vec<Undo>,
    committed: bool,
}

impl MemoryTx {
    fn state(&self) -> &StoreState {
        &self.guard
    }
}

/// Inverse of one write
enum Undo {
    Partner(PartnerId, Option<Partner>),
    Coupon(String, Option<Coupon>),
    Session(SessionKey, Option<AttributionSession>),
    Order(OrderId, Option<OrderSnapshot>),
    Referral(OrderId),
    Commission(CommissionId, Option<Commission>),
    Rule(RuleId, Option<CommissionRule>),
    Risk(PartnerId, Option<RiskSignal>),
    Wallet(PartnerId),
    Payout(PayoutId, Option<PayoutRequest>),
    Audit,
}

fn restore<K: Ord, V>(table: &mut BTreeMap<K, V>, key: K, previous: Option<V>) {
    match previous {
        Some(value) => {
            table.insert(key, value);
        }
        None => {
            table.remove(&key);
        }
    }
}

impl Undo {
    fn apply(self, state: &mut StoreState) {
        match self {
            Undo::Partner(k, v) => restore(&mut state.partners, k, v),
            Undo::Coupon(k, v) => restore(&mut state.coupons, k, v),
            Undo::Session(k, v) => restore(&mut state.sessions, k, v),
            Undo::Order(k, v) => restore(&mut state.orders, k, v),
            Undo::Referral(k) => {
                state.referrals.remove(&k);
            }
            Undo::Commission(k, v) => {
                if v.is_none() {
                    state.commission_by_order.retain(|_, id| id != &k);
                }
                restore(&mut state.commissions, k, v)
            }
            Undo::Rule(k, v) => restore(&mut state.rules, k, v),
            Undo::Risk(k, v) => restore(&mut state.risk_signals, k, v),
            Undo::Wallet(partner_id) => {
                if let Some(rows) = state.wallets.get_mut(&partner_id) {
                    rows.pop();
                    if rows.is_empty() {
                        state.wallets.remove(&partner_id);
                    }
                }
            }
            Undo::Payout(k, v) => restore(&mut state.payouts, k, v),
            Undo::Audit => {
                state.audit.pop();
            }
        }
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.committed || self.undo.is_empty() {
            return;
        }
        debug!(writes = self.undo.len(), "rolling back uncommitted transaction");
        while let Some(undo) = self.undo.pop() {
            undo.apply(&mut self.guard);
        }
    }
}

/// Implements [`StoreRead`] for a type exposing `fn state(&self) -> &StoreState`
macro_rules! impl_store_read {
    ($type:ty) => {
        #[async_trait]
        impl StoreRead for $type {
            async fn get_partner(&self, partner_id: &PartnerId) -> StoreResult<Option<Partner>> {
                Ok(self.state().partners.get(partner_id).cloned())
            }

            async fn list_partners(&self) -> StoreResult<Vec<Partner>> {
                Ok(self.state().partners.values().cloned().collect())
            }

            async fn get_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
                Ok(self.state().coupons.get(&Coupon::normalize(code)).cloned())
            }

            async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
                Ok(self.state().coupons.values().cloned().collect())
            }

            async fn find_sessions(
                &self,
                session_id: Option<&str>,
                user_id: Option<&str>,
            ) -> StoreResult<Vec<AttributionSession>> {
                Ok(self
                    .state()
                    .sessions
                    .values()
                    .filter(|s| {
                        session_id.map_or(false, |id| s.session_id == id)
                            || user_id.map_or(false, |u| s.user_id.as_deref() == Some(u))
                    })
                    .cloned()
                    .collect())
            }

            async fn get_session(
                &self,
                session_id: &str,
                partner_id: &PartnerId,
            ) -> StoreResult<Option<AttributionSession>> {
                let key = (session_id.to_string(), partner_id.clone());
                Ok(self.state().sessions.get(&key).cloned())
            }

            async fn get_referral(&self, order_id: &OrderId) -> StoreResult<Option<OrderReferral>> {
                Ok(self.state().referrals.get(order_id).cloned())
            }

            async fn get_order(&self, order_id: &OrderId) -> StoreResult<Option<OrderSnapshot>> {
                Ok(self.state().orders.get(order_id).cloned())
            }

            async fn list_referred_orders(
                &self,
                partner_id: &PartnerId,
                since: DateTime<Utc>,
            ) -> StoreResult<Vec<OrderSnapshot>> {
                Ok(self
                    .state()
                    .orders
                    .values()
                    .filter(|o| o.partner_id.as_ref() == Some(partner_id) && o.created_at >= since)
                    .cloned()
                    .collect())
            }

            async fn get_commission(&self, commission_id: &CommissionId) -> StoreResult<Option<Commission>> {
                Ok(self.state().commissions.get(commission_id).cloned())
            }

            async fn get_commission_by_order(&self, order_id: &OrderId) -> StoreResult<Option<Commission>> {
                let state = self.state();
                Ok(state
                    .commission_by_order
                    .get(order_id)
                    .and_then(|id| state.commissions.get(id))
                    .cloned())
            }

            async fn list_commissions(&self, filter: &CommissionFilter) -> StoreResult<Vec<Commission>> {
                let mut items: Vec<Commission> = self
                    .state()
                    .commissions
                    .values()
                    .filter(|c| filter.matches(c))
                    .cloned()
                    .collect();
                items.sort_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.commission_id.cmp(&b.commission_id))
                });
                Ok(items)
            }

            async fn list_rules(&self) -> StoreResult<Vec<CommissionRule>> {
                Ok(self.state().rules.values().cloned().collect())
            }

            async fn find_rule_by_key(&self, key: &RuleKey) -> StoreResult<Option<CommissionRule>> {
                Ok(self.state().rules.values().find(|r| &r.key() == key).cloned())
            }

            async fn get_risk_signal(&self, partner_id: &PartnerId) -> StoreResult<Option<RiskSignal>> {
                Ok(self.state().risk_signals.get(partner_id).cloned())
            }

            async fn list_risk_signals(&self) -> StoreResult<Vec<RiskSignal>> {
                Ok(self.state().risk_signals.values().cloned().collect())
            }

            async fn wallet_transactions(&self, partner_id: &PartnerId) -> StoreResult<Vec<WalletTransaction>> {
                Ok(self.state().wallets.get(partner_id).cloned().unwrap_or_default())
            }

            async fn wallet_balance(&self, partner_id: &PartnerId) -> StoreResult<Amount> {
                Ok(self.state().balance(partner_id))
            }

            async fn wallet_partners(&self) -> StoreResult<Vec<PartnerId>> {
                Ok(self.state().wallets.keys().cloned().collect())
            }

            async fn get_payout(&self, payout_id: &PayoutId) -> StoreResult<Option<PayoutRequest>> {
                Ok(self.state().payouts.get(payout_id).cloned())
            }

            async fn list_payouts(&self, filter: &PayoutFilter) -> StoreResult<Vec<PayoutRequest>> {
                let mut items: Vec<PayoutRequest> = self
                    .state()
                    .payouts
                    .values()
                    .filter(|p| filter.matches(p))
                    .cloned()
                    .collect();
                items.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
                Ok(items)
            }

            async fn outstanding_payout(&self, partner_id: &PartnerId) -> StoreResult<Option<PayoutRequest>> {
                Ok(self
                    .state()
                    .payouts
                    .values()
                    .find(|p| &p.partner_id == partner_id && p.status == PayoutStatus::Requested)
                    .cloned())
            }

            async fn list_audit(&self, entity_id: Option<&str>) -> StoreResult<Vec<AuditEvent>> {
                Ok(self
                    .state()
                    .audit
                    .iter()
                    .filter(|e| entity_id.map_or(true, |id| e.entity_id == id))
                    .cloned()
                    .collect())
            }
        }
    };
}

impl_store_read!(MemoryReader);
impl_store_read!(MemoryTx);

#[async_trait]
impl StoreTx for MemoryTx {
    async fn put_partner(&mut self, partner: Partner) -> StoreResult<()> {
        let key = partner.partner_id.clone();
        let prev = self.guard.partners.insert(key.clone(), partner);
        self.undo.push(Undo::Partner(key, prev));
        Ok(())
    }

    async fn insert_partner(&mut self, partner: Partner) -> StoreResult<()> {
        if self.guard.partners.contains_key(&partner.partner_id) {
            return Err(StoreError::duplicate("Partner", &partner.partner_id));
        }
        self.put_partner(partner).await
    }

    async fn put_coupon(&mut self, coupon: Coupon) -> StoreResult<()> {
        let key = Coupon::normalize(&coupon.code);
        let prev = self.guard.coupons.insert(key.clone(), coupon);
        self.undo.push(Undo::Coupon(key, prev));
        Ok(())
    }

    async fn put_session(&mut self, session: AttributionSession) -> StoreResult<()> {
        let key = (session.session_id.clone(), session.partner_id.clone());
        let prev = self.guard.sessions.insert(key.clone(), session);
        self.undo.push(Undo::Session(key, prev));
        Ok(())
    }

    async fn insert_order(&mut self, order: OrderSnapshot) -> StoreResult<()> {
        if self.guard.orders.contains_key(&order.order_id) {
            return Err(StoreError::duplicate("Order", &order.order_id));
        }
        self.put_order(order).await
    }

    async fn put_order(&mut self, order: OrderSnapshot) -> StoreResult<()> {
        let key = order.order_id.clone();
        let prev = self.guard.orders.insert(key.clone(), order);
        self.undo.push(Undo::Order(key, prev));
        Ok(())
    }

    async fn insert_referral(&mut self, referral: OrderReferral) -> StoreResult<()> {
        if self.guard.referrals.contains_key(&referral.order_id) {
            return Err(StoreError::duplicate("OrderReferral", &referral.order_id));
        }
        let key = referral.order_id.clone();
        self.guard.referrals.insert(key.clone(), referral);
        self.undo.push(Undo::Referral(key));
        Ok(())
    }

    async fn insert_commission(&mut self, commission: Commission) -> StoreResult<()> {
        if self.guard.commissions.contains_key(&commission.commission_id) {
            return Err(StoreError::duplicate("Commission", &commission.commission_id));
        }
        if self.guard.commission_by_order.contains_key(&commission.order_id) {
            return Err(StoreError::duplicate("Commission", &commission.order_id));
        }
        let key = commission.commission_id.clone();
        self.guard
            .commission_by_order
            .insert(commission.order_id.clone(), key.clone());
        self.guard.commissions.insert(key.clone(), commission);
        self.undo.push(Undo::Commission(key, None));
        Ok(())
    }

    async fn update_commission(
        &mut self,
        commission: Commission,
        expected: CommissionStatus,
    ) -> StoreResult<()> {
        let key = commission.commission_id.clone();
        let current = self
            .guard
            .commissions
            .get(&key)
            .ok_or_else(|| StoreError::not_found("Commission", &key))?;
        if current.status != expected {
            return Err(StoreError::stale("Commission", &key, expected, current.status));
        }
        let prev = self.guard.commissions.insert(key.clone(), commission);
        self.undo.push(Undo::Commission(key, prev));
        Ok(())
    }

    async fn put_rule(&mut self, rule: CommissionRule) -> StoreResult<()> {
        let key = rule.rule_id.clone();
        let prev = self.guard.rules.insert(key.clone(), rule);
        self.undo.push(Undo::Rule(key, prev));
        Ok(())
    }

    async fn put_risk_signal(&mut self, signal: RiskSignal) -> StoreResult<()> {
        let key = signal.partner_id.clone();
        let prev = self.guard.risk_signals.insert(key.clone(), signal);
        self.undo.push(Undo::Risk(key, prev));
        Ok(())
    }

    async fn append_wallet(&mut self, tx: NewWalletTx) -> StoreResult<WalletTransaction> {
        if !tx.tx_type.accepts(tx.amount) {
            return Err(StoreError::invalid_state(format!(
                "{} row cannot carry amount {}",
                tx.tx_type, tx.amount
            )));
        }
        let rows = self.guard.wallets.entry(tx.partner_id.clone()).or_default();
        let prior = rows.last().map_or(0, |r| r.balance_after);
        let balance_after = prior
            .checked_add(tx.amount)
            .ok_or_else(|| StoreError::Internal("wallet balance overflow".to_string()))?;
        let (commission_id, payout_id) = match tx.reference {
            Some(WalletRef::Commission(id)) => (Some(id), None),
            Some(WalletRef::Payout(id)) => (None, Some(id)),
            None => (None, None),
        };
        let row = WalletTransaction {
            tx_id: WalletTxId::generate(),
            partner_id: tx.partner_id.clone(),
            tx_type: tx.tx_type,
            amount: tx.amount,
            balance_after,
            commission_id,
            payout_id,
            seq: rows.len() as u64 + 1,
            created_at: tx.created_at,
        };
        rows.push(row.clone());
        self.undo.push(Undo::Wallet(tx.partner_id));
        Ok(row)
    }

    async fn insert_payout(&mut self, payout: PayoutRequest) -> StoreResult<()> {
        if self.guard.payouts.contains_key(&payout.payout_id) {
            return Err(StoreError::duplicate("PayoutRequest", &payout.payout_id));
        }
        let key = payout.payout_id.clone();
        self.guard.payouts.insert(key.clone(), payout);
        self.undo.push(Undo::Payout(key, None));
        Ok(())
    }

    async fn update_payout(&mut self, payout: PayoutRequest, expected: PayoutStatus) -> StoreResult<()> {
        let key = payout.payout_id.clone();
        let current = self
            .guard
            .payouts
            .get(&key)
            .ok_or_else(|| StoreError::not_found("PayoutRequest", &key))?;
        if current.status != expected {
            return Err(StoreError::stale("PayoutRequest", &key, expected, current.status));
        }
        let prev = self.guard.payouts.insert(key.clone(), payout);
        self.undo.push(Undo::Payout(key, prev));
        Ok(())
    }

    async fn append_audit(&mut self, event: AuditEvent) -> StoreResult<()> {
        self.guard.audit.push(event);
        self.undo.push(Undo::Audit);
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        if self.committed {
            return Err(StoreError::Transaction("already committed".to_string()));
        }
        self.committed = true;
        self.undo.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn partner(id: &str) -> Partner {
        Partner::apply(PartnerId::new(id), "Test", Utc::now())
    }

    fn earn(partner_id: &str, amount: Amount) -> NewWalletTx {
        NewWalletTx {
            partner_id: PartnerId::new(partner_id),
            tx_type: WalletTxType::Earn,
            amount,
            reference: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_partner(partner("ptn_1")).await.unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let read = store.begin_read().await.unwrap();
        assert!(read.get_partner(&PartnerId::new("ptn_1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_drop_rolls_back_every_write() {
        let store = MemoryStore::new();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_partner(partner("ptn_1")).await.unwrap();
            tx.append_wallet(earn("ptn_1", 100)).await.unwrap();
            tx.append_audit(AuditEvent::new(
                AuditAction::PartnerApproved,
                "Partner",
                "ptn_1",
                Actor::System,
                Utc::now(),
            ))
            .await
            .unwrap();
            assert_eq!(tx.wallet_balance(&PartnerId::new("ptn_1")).await.unwrap(), 100);
        }
        let read = store.begin_read().await.unwrap();
        assert!(read.get_partner(&PartnerId::new("ptn_1")).await.unwrap().is_none());
        assert_eq!(read.wallet_balance(&PartnerId::new("ptn_1")).await.unwrap(), 0);
        assert!(read.list_audit(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_rows_chain_balances() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.append_wallet(earn("ptn_1", 50_000)).await.unwrap();
        tx.append_wallet(earn("ptn_1", 20_000)).await.unwrap();
        let row = tx
            .append_wallet(NewWalletTx {
                tx_type: WalletTxType::Reverse,
                amount: -5_000,
                ..earn("ptn_1", 0)
            })
            .await
            .unwrap();
        assert_eq!(row.balance_after, 65_000);
        assert_eq!(row.seq, 3);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_wallet_rejects_wrong_sign() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        assert!(tx.append_wallet(earn("ptn_1", -1)).await.is_err());
        assert!(tx.append_wallet(earn("ptn_1", 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_commission_is_status_guarded() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let c = Commission::new(
            PartnerId::new("ptn_1"),
            OrderId::new("ord_1"),
            RuleId::new("rule_1"),
            1_000,
            now + Duration::days(14),
            now,
        );
        let mut tx = store.begin().await.unwrap();
        tx.insert_commission(c.clone()).await.unwrap();

        let mut released = c.clone();
        released.transition(CommissionStatus::Available, now).unwrap();
        tx.update_commission(released.clone(), CommissionStatus::Pending)
            .await
            .unwrap();

        let err = tx
            .update_commission(released, CommissionStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { .. }));
    }

    #[tokio::test]
    async fn test_one_commission_and_referral_per_order() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mk = || {
            Commission::new(
                PartnerId::new("ptn_1"),
                OrderId::new("ord_1"),
                RuleId::new("rule_1"),
                1_000,
                now,
                now,
            )
        };
        let mut tx = store.begin().await.unwrap();
        tx.insert_commission(mk()).await.unwrap();
        assert!(matches!(
            tx.insert_commission(mk()).await,
            Err(StoreError::Duplicate { .. })
        ));

        let referral = OrderReferral {
            order_id: OrderId::new("ord_1"),
            partner_id: PartnerId::new("ptn_1"),
            attribution_type: AttributionType::Coupon,
            coupon_code: Some("X".into()),
            session_id: None,
            created_at: now,
        };
        tx.insert_referral(referral.clone()).await.unwrap();
        assert!(tx.insert_referral(referral).await.is_err());
    }

    #[tokio::test]
    async fn test_rolled_back_commission_frees_order_index() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let c = Commission::new(
            PartnerId::new("ptn_1"),
            OrderId::new("ord_1"),
            RuleId::new("rule_1"),
            1_000,
            now,
            now,
        );
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_commission(c.clone()).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        assert!(tx.get_commission_by_order(&OrderId::new("ord_1")).await.unwrap().is_none());
        tx.insert_commission(c).await.unwrap();
    }

    #[tokio::test]
    async fn test_writers_are_serialized() {
        let store = MemoryStore::new();
        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = store.begin().await.unwrap();
                tx.append_wallet(earn("ptn_1", 10)).await.unwrap();
                tokio::task::yield_now().await;
                tx.commit().await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let read = store.begin_read().await.unwrap();
        let rows = read.wallet_transactions(&PartnerId::new("ptn_1")).await.unwrap();
        assert_eq!(rows.len(), 20);
        let mut running = 0;
        for row in rows {
            running += row.amount;
            assert_eq!(row.balance_after, running);
        }
    }

    #[tokio::test]
    async fn test_find_sessions_by_user_or_session() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut tx = store.begin().await.unwrap();
        tx.put_session(AttributionSession::new("s1", PartnerId::new("p1"), now, Duration::days(7)))
            .await
            .unwrap();
        tx.put_session(
            AttributionSession::new("s2", PartnerId::new("p2"), now, Duration::days(7))
                .with_user_id(Some("u1".into())),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        drop(tx);

        let read = store.begin_read().await.unwrap();
        assert_eq!(read.find_sessions(Some("s1"), Some("u1")).await.unwrap().len(), 2);
        assert_eq!(read.find_sessions(None, Some("u1")).await.unwrap().len(), 1);
        assert!(read.find_sessions(None, None).await.unwrap().is_empty());
    }
}
