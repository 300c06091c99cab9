//! SQLite Store Implementation
//!
//! Durable backend over a `sqlx` SQLite pool. Every snapshot or write
//! transaction owns one pooled connection inside a database transaction.
//! Write transactions also hold a process-wide writer lock from `begin`
//! until commit or drop, so a wallet balance read inside a transaction
//! cannot go stale. Dropping an uncommitted transaction rolls it back.

use affiliate_core::*;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::repos::{
    AffiliateStore, CommissionFilter, NewWalletTx, PayoutFilter, StoreHealth, StoreRead, StoreTx,
};
use crate::schema::SQLITE_SCHEMA;

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const WALLET_COLUMNS: &str =
    "tx_id, partner_id, seq, tx_type, amount, balance_after, commission_id, payout_id, created_at";

/// SQLite-backed affiliate store
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Open the database file named by `database_url` (created if missing)
    /// and apply the schema.
    ///
    /// Accepts `sqlite://path/to/ledger.db` or `sqlite:ledger.db`. Each
    /// pooled connection to `sqlite::memory:` is a separate database, so
    /// in-memory URLs are only useful with [`crate::MemoryStore`].
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let store = Self::new(pool);
        store.init().await?;
        info!(url = %database_url, "sqlite store ready");
        Ok(store)
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Create tables and indexes that do not exist yet
    pub async fn init(&self) -> StoreResult<()> {
        for statement in SQLITE_SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn count(&self, table: &str) -> StoreResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(n.max(0) as usize)
    }
}

#[async_trait]
impl AffiliateStore for SqliteStore {
    async fn begin_read(&self) -> StoreResult<Box<dyn StoreRead>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx::open(tx, None)))
    }

    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let writer = self.writer.clone().lock_owned().await;
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx::open(tx, Some(writer))))
    }

    async fn health_check(&self) -> StoreResult<StoreHealth> {
        Ok(StoreHealth {
            backend: "sqlite".to_string(),
            healthy: !self.pool.is_closed(),
            partners: self.count("partners").await?,
            commissions: self.count("commissions").await?,
            wallet_rows: self.count("wallet_transactions").await?,
        })
    }
}

/// Snapshot or write transaction on one pooled connection
pub struct SqliteTx {
    conn: Mutex<Option<Transaction<'static, Sqlite>>>,
    writer: Option<OwnedMutexGuard<()>>,
}

impl SqliteTx {
    fn open(tx: Transaction<'static, Sqlite>, writer: Option<OwnedMutexGuard<()>>) -> Self {
        Self {
            conn: Mutex::new(Some(tx)),
            writer,
        }
    }

    async fn fetch_doc<T: DeserializeOwned>(&self, sql: &str, keys: &[&str]) -> StoreResult<Option<T>> {
        let mut slot = self.conn.lock().await;
        let mut query = sqlx::query(sql);
        for key in keys {
            query = query.bind(*key);
        }
        let row = query.fetch_optional(live(&mut slot)?).await?;
        row.as_ref().map(decode).transpose()
    }

    async fn fetch_docs<T: DeserializeOwned>(&self, sql: &str, keys: &[Option<&str>]) -> StoreResult<Vec<T>> {
        let mut slot = self.conn.lock().await;
        let mut query = sqlx::query(sql);
        for key in keys {
            query = query.bind(*key);
        }
        let rows = query.fetch_all(live(&mut slot)?).await?;
        rows.iter().map(decode).collect()
    }

    async fn upsert_doc(&self, sql: &str, key: &str, body: String) -> StoreResult<()> {
        let mut slot = self.conn.lock().await;
        sqlx::query(sql)
            .bind(key)
            .bind(body)
            .execute(live(&mut slot)?)
            .await?;
        Ok(())
    }

    async fn current_status(&self, table: &str, id_column: &str, id: &str) -> StoreResult<Option<String>> {
        let sql = format!("SELECT status FROM {} WHERE {} = ?", table, id_column);
        let mut slot = self.conn.lock().await;
        let status: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(live(&mut slot)?)
            .await?;
        Ok(status)
    }
}

impl Drop for SqliteTx {
    fn drop(&mut self) {
        if self.writer.is_some() && self.conn.get_mut().is_some() {
            debug!("rolling back uncommitted transaction");
        }
    }
}

fn live<'a>(slot: &'a mut Option<Transaction<'static, Sqlite>>) -> StoreResult<&'a mut SqliteConnection> {
    slot.as_deref_mut()
        .ok_or_else(|| StoreError::Transaction("transaction already closed".to_string()))
}

fn encode<T: Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(row: &SqliteRow) -> StoreResult<T> {
    let body: String = row.try_get("body")?;
    Ok(serde_json::from_str(&body)?)
}

fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn wallet_row(row: &SqliteRow) -> StoreResult<WalletTransaction> {
    let tx_type: String = row.try_get("tx_type")?;
    let created_at: String = row.try_get("created_at")?;
    let seq: i64 = row.try_get("seq")?;
    Ok(WalletTransaction {
        tx_id: WalletTxId::new(row.try_get::<String, _>("tx_id")?),
        partner_id: PartnerId::new(row.try_get::<String, _>("partner_id")?),
        tx_type: WalletTxType::from_str(&tx_type)
            .map_err(|e| StoreError::Internal(format!("wallet row type: {}", e)))?,
        amount: row.try_get("amount")?,
        balance_after: row.try_get("balance_after")?,
        commission_id: row
            .try_get::<Option<String>, _>("commission_id")?
            .map(CommissionId::new),
        payout_id: row.try_get::<Option<String>, _>("payout_id")?.map(PayoutId::new),
        seq: seq.max(0) as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| StoreError::Internal(format!("wallet row timestamp: {}", e)))?
            .with_timezone(&Utc),
    })
}

#[async_trait]
impl StoreRead for SqliteTx {
    async fn get_partner(&self, partner_id: &PartnerId) -> StoreResult<Option<Partner>> {
        self.fetch_doc("SELECT body FROM partners WHERE partner_id = ?", &[partner_id.as_str()])
            .await
    }

    async fn list_partners(&self) -> StoreResult<Vec<Partner>> {
        self.fetch_docs("SELECT body FROM partners ORDER BY partner_id", &[]).await
    }

    async fn get_coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
        let key = Coupon::normalize(code);
        self.fetch_doc("SELECT body FROM coupons WHERE code = ?", &[key.as_str()])
            .await
    }

    async fn list_coupons(&self) -> StoreResult<Vec<Coupon>> {
        self.fetch_docs("SELECT body FROM coupons ORDER BY code", &[]).await
    }

    async fn find_sessions(
        &self,
        session_id: Option<&str>,
        user_id: Option<&str>,
    ) -> StoreResult<Vec<AttributionSession>> {
        if session_id.is_none() && user_id.is_none() {
            return Ok(Vec::new());
        }
        self.fetch_docs(
            "SELECT body FROM attribution_sessions WHERE session_id = ? OR user_id = ? \
             ORDER BY session_id, partner_id",
            &[session_id, user_id],
        )
        .await
    }

    async fn get_session(
        &self,
        session_id: &str,
        partner_id: &PartnerId,
    ) -> StoreResult<Option<AttributionSession>> {
        self.fetch_doc(
            "SELECT body FROM attribution_sessions WHERE session_id = ? AND partner_id = ?",
            &[session_id, partner_id.as_str()],
        )
        .await
    }

    async fn get_referral(&self, order_id: &OrderId) -> StoreResult<Option<OrderReferral>> {
        self.fetch_doc("SELECT body FROM order_referrals WHERE order_id = ?", &[order_id.as_str()])
            .await
    }

    async fn get_order(&self, order_id: &OrderId) -> StoreResult<Option<OrderSnapshot>> {
        self.fetch_doc("SELECT body FROM orders WHERE order_id = ?", &[order_id.as_str()])
            .await
    }

    async fn list_referred_orders(
        &self,
        partner_id: &PartnerId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<OrderSnapshot>> {
        let mut slot = self.conn.lock().await;
        let rows = sqlx::query(
            "SELECT body FROM orders WHERE partner_id = ? AND created_at >= ? ORDER BY order_id",
        )
        .bind(partner_id.as_str())
        .bind(micros(since))
        .fetch_all(live(&mut slot)?)
        .await?;
        let orders = rows.iter().map(decode).collect::<StoreResult<Vec<OrderSnapshot>>>()?;
        // The column is truncated to microseconds
        Ok(orders.into_iter().filter(|o| o.created_at >= since).collect())
    }

    async fn get_commission(&self, commission_id: &CommissionId) -> StoreResult<Option<Commission>> {
        self.fetch_doc(
            "SELECT body FROM commissions WHERE commission_id = ?",
            &[commission_id.as_str()],
        )
        .await
    }

    async fn get_commission_by_order(&self, order_id: &OrderId) -> StoreResult<Option<Commission>> {
        self.fetch_doc("SELECT body FROM commissions WHERE order_id = ?", &[order_id.as_str()])
            .await
    }

    async fn list_commissions(&self, filter: &CommissionFilter) -> StoreResult<Vec<Commission>> {
        let status = filter.status.map(|s| s.to_string());
        self.fetch_docs(
            "SELECT body FROM commissions \
             WHERE (?1 IS NULL OR status = ?1) \
               AND (?2 IS NULL OR partner_id = ?2) \
               AND (?3 IS NULL OR order_id = ?3) \
             ORDER BY created_at, commission_id",
            &[
                status.as_deref(),
                filter.partner_id.as_ref().map(|p| p.as_str()),
                filter.order_id.as_ref().map(|o| o.as_str()),
            ],
        )
        .await
    }

    async fn list_rules(&self) -> StoreResult<Vec<CommissionRule>> {
        self.fetch_docs("SELECT body FROM commission_rules ORDER BY rule_id", &[])
            .await
    }

    async fn find_rule_by_key(&self, key: &RuleKey) -> StoreResult<Option<CommissionRule>> {
        Ok(self.list_rules().await?.into_iter().find(|r| &r.key() == key))
    }

    async fn get_risk_signal(&self, partner_id: &PartnerId) -> StoreResult<Option<RiskSignal>> {
        self.fetch_doc("SELECT body FROM risk_signals WHERE partner_id = ?", &[partner_id.as_str()])
            .await
    }

    async fn list_risk_signals(&self) -> StoreResult<Vec<RiskSignal>> {
        self.fetch_docs("SELECT body FROM risk_signals ORDER BY partner_id", &[])
            .await
    }

    async fn wallet_transactions(&self, partner_id: &PartnerId) -> StoreResult<Vec<WalletTransaction>> {
        let sql = format!(
            "SELECT {} FROM wallet_transactions WHERE partner_id = ? ORDER BY seq",
            WALLET_COLUMNS
        );
        let mut slot = self.conn.lock().await;
        let rows = sqlx::query(&sql)
            .bind(partner_id.as_str())
            .fetch_all(live(&mut slot)?)
            .await?;
        rows.iter().map(wallet_row).collect()
    }

    async fn wallet_balance(&self, partner_id: &PartnerId) -> StoreResult<Amount> {
        let mut slot = self.conn.lock().await;
        let balance: Option<i64> = sqlx::query_scalar(
            "SELECT balance_after FROM wallet_transactions WHERE partner_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(partner_id.as_str())
        .fetch_optional(live(&mut slot)?)
        .await?;
        Ok(balance.unwrap_or(0))
    }

    async fn wallet_partners(&self) -> StoreResult<Vec<PartnerId>> {
        let mut slot = self.conn.lock().await;
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT partner_id FROM wallet_transactions ORDER BY partner_id")
                .fetch_all(live(&mut slot)?)
                .await?;
        Ok(ids.into_iter().map(PartnerId::new).collect())
    }

    async fn get_payout(&self, payout_id: &PayoutId) -> StoreResult<Option<PayoutRequest>> {
        self.fetch_doc("SELECT body FROM payout_requests WHERE payout_id = ?", &[payout_id.as_str()])
            .await
    }

    async fn list_payouts(&self, filter: &PayoutFilter) -> StoreResult<Vec<PayoutRequest>> {
        let status = filter.status.map(|s| s.to_string());
        self.fetch_docs(
            "SELECT body FROM payout_requests \
             WHERE (?1 IS NULL OR status = ?1) \
               AND (?2 IS NULL OR partner_id = ?2) \
             ORDER BY requested_at DESC, payout_id",
            &[status.as_deref(), filter.partner_id.as_ref().map(|p| p.as_str())],
        )
        .await
    }

    async fn outstanding_payout(&self, partner_id: &PartnerId) -> StoreResult<Option<PayoutRequest>> {
        self.fetch_doc(
            "SELECT body FROM payout_requests WHERE partner_id = ? AND status = ? \
             ORDER BY requested_at LIMIT 1",
            &[partner_id.as_str(), PayoutStatus::Requested.as_str()],
        )
        .await
    }

    async fn list_audit(&self, entity_id: Option<&str>) -> StoreResult<Vec<AuditEvent>> {
        self.fetch_docs(
            "SELECT body FROM audit_events WHERE (?1 IS NULL OR entity_id = ?1) ORDER BY id",
            &[entity_id],
        )
        .await
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn put_partner(&mut self, partner: Partner) -> StoreResult<()> {
        self.upsert_doc(
            "INSERT INTO partners (partner_id, body) VALUES (?, ?) \
             ON CONFLICT(partner_id) DO UPDATE SET body = excluded.body",
            partner.partner_id.as_str(),
            encode(&partner)?,
        )
        .await
    }

    async fn insert_partner(&mut self, partner: Partner) -> StoreResult<()> {
        if self.get_partner(&partner.partner_id).await?.is_some() {
            return Err(StoreError::duplicate("Partner", &partner.partner_id));
        }
        self.put_partner(partner).await
    }

    async fn put_coupon(&mut self, coupon: Coupon) -> StoreResult<()> {
        let key = Coupon::normalize(&coupon.code);
        self.upsert_doc(
            "INSERT INTO coupons (code, body) VALUES (?, ?) \
             ON CONFLICT(code) DO UPDATE SET body = excluded.body",
            &key,
            encode(&coupon)?,
        )
        .await
    }

    async fn put_session(&mut self, session: AttributionSession) -> StoreResult<()> {
        let body = encode(&session)?;
        let mut slot = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO attribution_sessions (session_id, partner_id, user_id, body) VALUES (?, ?, ?, ?) \
             ON CONFLICT(session_id, partner_id) DO UPDATE SET user_id = excluded.user_id, body = excluded.body",
        )
        .bind(&session.session_id)
        .bind(session.partner_id.as_str())
        .bind(session.user_id.as_deref())
        .bind(body)
        .execute(live(&mut slot)?)
        .await?;
        Ok(())
    }

    async fn insert_order(&mut self, order: OrderSnapshot) -> StoreResult<()> {
        if self.get_order(&order.order_id).await?.is_some() {
            return Err(StoreError::duplicate("Order", &order.order_id));
        }
        self.put_order(order).await
    }

    async fn put_order(&mut self, order: OrderSnapshot) -> StoreResult<()> {
        let body = encode(&order)?;
        let mut slot = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO orders (order_id, partner_id, created_at, body) VALUES (?, ?, ?, ?) \
             ON CONFLICT(order_id) DO UPDATE SET partner_id = excluded.partner_id, body = excluded.body",
        )
        .bind(order.order_id.as_str())
        .bind(order.partner_id.as_ref().map(|p| p.as_str()))
        .bind(micros(order.created_at))
        .bind(body)
        .execute(live(&mut slot)?)
        .await?;
        Ok(())
    }

    async fn insert_referral(&mut self, referral: OrderReferral) -> StoreResult<()> {
        if self.get_referral(&referral.order_id).await?.is_some() {
            return Err(StoreError::duplicate("OrderReferral", &referral.order_id));
        }
        let body = encode(&referral)?;
        let mut slot = self.conn.lock().await;
        sqlx::query("INSERT INTO order_referrals (order_id, body) VALUES (?, ?)")
            .bind(referral.order_id.as_str())
            .bind(body)
            .execute(live(&mut slot)?)
            .await?;
        Ok(())
    }

    async fn insert_commission(&mut self, commission: Commission) -> StoreResult<()> {
        if self.get_commission(&commission.commission_id).await?.is_some() {
            return Err(StoreError::duplicate("Commission", &commission.commission_id));
        }
        if self.get_commission_by_order(&commission.order_id).await?.is_some() {
            return Err(StoreError::duplicate("Commission", &commission.order_id));
        }
        let body = encode(&commission)?;
        let mut slot = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO commissions (commission_id, order_id, partner_id, status, created_at, body) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(commission.commission_id.as_str())
        .bind(commission.order_id.as_str())
        .bind(commission.partner_id.as_str())
        .bind(commission.status.as_str())
        .bind(micros(commission.created_at))
        .bind(body)
        .execute(live(&mut slot)?)
        .await?;
        Ok(())
    }

    async fn update_commission(
        &mut self,
        commission: Commission,
        expected: CommissionStatus,
    ) -> StoreResult<()> {
        let body = encode(&commission)?;
        let updated = {
            let mut slot = self.conn.lock().await;
            sqlx::query(
                "UPDATE commissions SET status = ?, body = ? WHERE commission_id = ? AND status = ?",
            )
            .bind(commission.status.as_str())
            .bind(body)
            .bind(commission.commission_id.as_str())
            .bind(expected.as_str())
            .execute(live(&mut slot)?)
            .await?
            .rows_affected()
        };
        if updated == 1 {
            return Ok(());
        }
        let id = &commission.commission_id;
        match self.current_status("commissions", "commission_id", id.as_str()).await? {
            Some(actual) => Err(StoreError::stale("Commission", id, expected, actual)),
            None => Err(StoreError::not_found("Commission", id)),
        }
    }

    async fn put_rule(&mut self, rule: CommissionRule) -> StoreResult<()> {
        self.upsert_doc(
            "INSERT INTO commission_rules (rule_id, body) VALUES (?, ?) \
             ON CONFLICT(rule_id) DO UPDATE SET body = excluded.body",
            rule.rule_id.as_str(),
            encode(&rule)?,
        )
        .await
    }

    async fn put_risk_signal(&mut self, signal: RiskSignal) -> StoreResult<()> {
        self.upsert_doc(
            "INSERT INTO risk_signals (partner_id, body) VALUES (?, ?) \
             ON CONFLICT(partner_id) DO UPDATE SET body = excluded.body",
            signal.partner_id.as_str(),
            encode(&signal)?,
        )
        .await
    }

    async fn append_wallet(&mut self, tx: NewWalletTx) -> StoreResult<WalletTransaction> {
        if !tx.tx_type.accepts(tx.amount) {
            return Err(StoreError::invalid_state(format!(
                "{} row cannot carry amount {}",
                tx.tx_type, tx.amount
            )));
        }
        let mut slot = self.conn.lock().await;
        let conn = live(&mut slot)?;
        let last: Option<(i64, i64)> = sqlx::query_as(
            "SELECT seq, balance_after FROM wallet_transactions \
             WHERE partner_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(tx.partner_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        let (prior_seq, prior_balance) = last.unwrap_or((0, 0));
        let balance_after = prior_balance
            .checked_add(tx.amount)
            .ok_or_else(|| StoreError::Internal("wallet balance overflow".to_string()))?;
        let (commission_id, payout_id) = match tx.reference {
            Some(WalletRef::Commission(id)) => (Some(id), None),
            Some(WalletRef::Payout(id)) => (None, Some(id)),
            None => (None, None),
        };
        let row = WalletTransaction {
            tx_id: WalletTxId::generate(),
            partner_id: tx.partner_id,
            tx_type: tx.tx_type,
            amount: tx.amount,
            balance_after,
            commission_id,
            payout_id,
            seq: prior_seq.max(0) as u64 + 1,
            created_at: tx.created_at,
        };

        let sql = format!(
            "INSERT INTO wallet_transactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            WALLET_COLUMNS
        );
        sqlx::query(&sql)
            .bind(row.tx_id.as_str())
            .bind(row.partner_id.as_str())
            .bind(prior_seq + 1)
            .bind(row.tx_type.to_string())
            .bind(row.amount)
            .bind(row.balance_after)
            .bind(row.commission_id.as_ref().map(|c| c.as_str()))
            .bind(row.payout_id.as_ref().map(|p| p.as_str()))
            .bind(row.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .execute(&mut *conn)
            .await?;
        Ok(row)
    }

    async fn insert_payout(&mut self, payout: PayoutRequest) -> StoreResult<()> {
        if self.get_payout(&payout.payout_id).await?.is_some() {
            return Err(StoreError::duplicate("PayoutRequest", &payout.payout_id));
        }
        let body = encode(&payout)?;
        let mut slot = self.conn.lock().await;
        sqlx::query(
            "INSERT INTO payout_requests (payout_id, partner_id, status, requested_at, body) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(payout.payout_id.as_str())
        .bind(payout.partner_id.as_str())
        .bind(payout.status.as_str())
        .bind(micros(payout.requested_at))
        .bind(body)
        .execute(live(&mut slot)?)
        .await?;
        Ok(())
    }

    async fn update_payout(&mut self, payout: PayoutRequest, expected: PayoutStatus) -> StoreResult<()> {
        let body = encode(&payout)?;
        let updated = {
            let mut slot = self.conn.lock().await;
            sqlx::query(
                "UPDATE payout_requests SET status = ?, body = ? WHERE payout_id = ? AND status = ?",
            )
            .bind(payout.status.as_str())
            .bind(body)
            .bind(payout.payout_id.as_str())
            .bind(expected.as_str())
            .execute(live(&mut slot)?)
            .await?
            .rows_affected()
        };
        if updated == 1 {
            return Ok(());
        }
        let id = &payout.payout_id;
        match self.current_status("payout_requests", "payout_id", id.as_str()).await? {
            Some(actual) => Err(StoreError::stale("PayoutRequest", id, expected, actual)),
            None => Err(StoreError::not_found("PayoutRequest", id)),
        }
    }

    async fn append_audit(&mut self, event: AuditEvent) -> StoreResult<()> {
        self.upsert_doc(
            "INSERT INTO audit_events (entity_id, body) VALUES (?, ?)",
            &event.entity_id,
            encode(&event)?,
        )
        .await
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self
            .conn
            .get_mut()
            .take()
            .ok_or_else(|| StoreError::Transaction("already committed".to_string()))?;
        tx.commit().await?;
        self.writer = None;
        Ok(())
    }
}
