//! Ledger Service
//!
//! The only code path that writes Commission and WalletTransaction rows.
//! Every operation runs in one store transaction: the status change is
//! guarded by the status it was read in, and any wallet row is computed
//! from the running balance inside the same transaction.

use affiliate_core::commission::{
    check_manual_release, check_release, check_reverse, commission_amount, hold_until,
    plan_reversal, reversible_amount,
};
use affiliate_core::payout::{allocate, available_total};
use affiliate_core::*;
use affiliate_store::{AffiliateStore, CommissionFilter, NewWalletTx, StoreError, StoreTx};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attribution::resolve_attribution;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};

/// Result of recording an order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order: OrderSnapshot,
    pub referral: Option<OrderReferral>,
    pub commission: Option<Commission>,
}

/// Result of an order status update
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdateOutcome {
    pub order: OrderSnapshot,
    pub commission: Option<Commission>,
    pub reversal: ReversalPlan,
}

/// Who triggered a release
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Settlement job: hold window enforced
    Scheduled,
    /// Admin override: hold window skipped
    Manual { actor: Actor, note: Option<String> },
}

/// What settling one commission did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SettleOutcome {
    pub released: bool,
    pub reversed: bool,
    pub partially_reversed: bool,
    /// Eligible but held for review
    pub held: bool,
    /// No longer PENDING when settled
    pub skipped: bool,
}

/// One page of commissions plus aggregates
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommissionPage {
    pub items: Vec<Commission>,
    pub total: u64,
    /// Aggregates over every status for the same partner filter
    pub summary: StatusSummary,
}

/// Wallet chain defect found by [`LedgerService::verify_balances`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMismatch {
    pub partner_id: PartnerId,
    pub seq: u64,
    pub expected_balance: Amount,
    pub stored_balance: Amount,
}

/// Ledger service
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn AffiliateStore>,
    config: Arc<LedgerConfig>,
    resolver: AttributionResolver,
}

impl LedgerService {
    pub fn new(store: Arc<dyn AffiliateStore>, config: Arc<LedgerConfig>) -> Self {
        let resolver = AttributionResolver::new().with_session_ttl(config.session_ttl());
        Self {
            store,
            config,
            resolver,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ============================================================
    // Creation
    // ============================================================

    /// Record a new order, attribute it and create its PENDING commission.
    ///
    /// Attribution, referral and commission are written atomically. A
    /// repeated order id is a conflict.
    pub async fn place_order(
        &self,
        mut order: OrderSnapshot,
        request: AttributionRequest,
        now: DateTime<Utc>,
    ) -> LedgerResult<PlacedOrder> {
        order.validate()?;
        let mut tx = self.store.begin().await?;

        if tx.get_order(&order.order_id).await?.is_some() {
            return Err(AffiliateError::Duplicate {
                entity: "Order".to_string(),
                id: order.order_id.to_string(),
            }
            .into());
        }

        let attribution = resolve_attribution(tx.as_ref(), &self.resolver, &request, now).await?;
        let Some(attribution) = attribution else {
            tx.insert_order(order.clone()).await?;
            tx.commit().await?;
            debug!(order_id = %order.order_id, "organic order recorded");
            return Ok(PlacedOrder {
                order,
                referral: None,
                commission: None,
            });
        };

        order.partner_id = Some(attribution.partner_id.clone());
        tx.insert_order(order.clone()).await?;

        let referral = attribution.into_referral(order.order_id.clone(), now);
        tx.insert_referral(referral.clone())
            .await
            .map_err(|e| duplicate_referral(e, &order.order_id))?;

        let commission = self.create_commission_in(tx.as_mut(), &referral, &order, now).await?;
        tx.commit().await?;

        info!(
            order_id = %order.order_id,
            partner_id = %referral.partner_id,
            attribution = %referral.attribution_type,
            commission = commission.as_ref().map_or(0, |c| c.amount),
            "order attributed"
        );
        Ok(PlacedOrder {
            order,
            referral: Some(referral),
            commission,
        })
    }

    /// Create the commission for an attributed order that has none yet.
    ///
    /// Returns the existing commission when one was already created.
    pub async fn create_commission(
        &self,
        order_id: &OrderId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Commission>> {
        let mut tx = self.store.begin().await?;
        if let Some(existing) = tx.get_commission_by_order(order_id).await? {
            return Ok(Some(existing));
        }
        let referral = tx
            .get_referral(order_id)
            .await?
            .ok_or_else(|| AffiliateError::not_found("OrderReferral", order_id))?;
        let order = tx.get_order_required(order_id).await?;
        let commission = self.create_commission_in(tx.as_mut(), &referral, &order, now).await?;
        tx.commit().await?;
        Ok(commission)
    }

    async fn create_commission_in(
        &self,
        tx: &mut dyn StoreTx,
        referral: &OrderReferral,
        order: &OrderSnapshot,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Commission>> {
        let partner = tx.get_partner_required(&referral.partner_id).await?;
        partner.require_active()?;

        let matcher = RuleMatcher::new(tx.list_rules().await?);
        let Some(rule) = matcher.find_for_order(partner.tier, order) else {
            debug!(order_id = %order.order_id, tier = %partner.tier, "no commission rule matched");
            return Ok(None);
        };
        let amount = commission_amount(order.net_base(), rule);
        if amount == 0 {
            debug!(order_id = %order.order_id, rule_id = %rule.rule_id, "commission priced at zero");
            return Ok(None);
        }

        let held = tx
            .get_risk_signal(&partner.partner_id)
            .await?
            .map_or(false, |s| self.config.risk_thresholds.holds(s.score));

        let commission = Commission::new(
            partner.partner_id.clone(),
            order.order_id.clone(),
            rule.rule_id.clone(),
            amount,
            hold_until(now, self.config.hold_days),
            now,
        )
        .with_review_hold(held);

        tx.insert_commission(commission.clone()).await?;
        tx.append_audit(
            AuditEvent::new(
                AuditAction::CommissionCreated,
                "Commission",
                &commission.commission_id,
                Actor::System,
                now,
            )
            .with_partner(&partner.partner_id)
            .with_amount(amount),
        )
        .await?;
        counter!("affiliate_commissions_created_total").increment(1);
        Ok(Some(commission))
    }

    // ============================================================
    // Release
    // ============================================================

    /// PENDING -> AVAILABLE, crediting an EARN row
    pub async fn release(
        &self,
        commission_id: &CommissionId,
        mode: ReleaseMode,
        now: DateTime<Utc>,
    ) -> LedgerResult<Commission> {
        let mut tx = self.store.begin().await?;
        let commission = tx.get_commission_required(commission_id).await?;
        let order = tx.get_order_required(&commission.order_id).await?;

        let (actor, note) = match mode {
            ReleaseMode::Scheduled => {
                check_release(&commission, &order, now)?;
                (Actor::System, None)
            }
            ReleaseMode::Manual { actor, note } => {
                check_manual_release(&commission, &order)?;
                (actor, note)
            }
        };

        let released = self.release_in(tx.as_mut(), commission, actor, note, now).await?;
        tx.commit().await?;
        Ok(released)
    }

    async fn release_in(
        &self,
        tx: &mut dyn StoreTx,
        mut commission: Commission,
        actor: Actor,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Commission> {
        let expected = commission.status;
        commission.transition(CommissionStatus::Available, now)?;
        if note.is_some() {
            commission.note = note.clone();
        }
        tx.update_commission(commission.clone(), expected).await?;

        let row = tx
            .append_wallet(NewWalletTx {
                partner_id: commission.partner_id.clone(),
                tx_type: WalletTxType::Earn,
                amount: commission.amount,
                reference: Some(WalletRef::Commission(commission.commission_id.clone())),
                created_at: now,
            })
            .await?;
        tx.append_audit(
            AuditEvent::new(
                AuditAction::CommissionReleased,
                "Commission",
                &commission.commission_id,
                actor,
                now,
            )
            .with_partner(&commission.partner_id)
            .with_amount(commission.amount)
            .with_note(note),
        )
        .await?;

        counter!("affiliate_commissions_released_total").increment(1);
        info!(
            commission_id = %commission.commission_id,
            partner_id = %commission.partner_id,
            amount = commission.amount,
            balance_after = row.balance_after,
            "commission released"
        );
        Ok(commission)
    }

    // ============================================================
    // Reversal
    // ============================================================

    /// Admin override: PENDING or AVAILABLE -> REVERSED
    pub async fn reverse(
        &self,
        commission_id: &CommissionId,
        actor: Actor,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Commission> {
        let mut tx = self.store.begin().await?;
        let commission = tx.get_commission_required(commission_id).await?;
        check_reverse(&commission)?;
        let delta = reversible_amount(&commission);
        let reversed = self
            .reverse_full_in(tx.as_mut(), commission, delta, actor, note, now)
            .await?;
        tx.commit().await?;
        Ok(reversed)
    }

    async fn reverse_full_in(
        &self,
        tx: &mut dyn StoreTx,
        mut commission: Commission,
        delta: Amount,
        actor: Actor,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Commission> {
        let expected = commission.status;
        commission.transition(CommissionStatus::Reversed, now)?;
        commission.amount -= delta;
        commission.reversed_amount += delta;
        if note.is_some() {
            commission.note = note.clone();
        }
        tx.update_commission(commission.clone(), expected).await?;

        if expected == CommissionStatus::Available && delta > 0 {
            self.debit_reversal(tx, &commission, delta, now).await?;
        }
        tx.append_audit(
            AuditEvent::new(
                AuditAction::CommissionReversed,
                "Commission",
                &commission.commission_id,
                actor,
                now,
            )
            .with_partner(&commission.partner_id)
            .with_amount(delta)
            .with_note(note),
        )
        .await?;

        counter!("affiliate_commissions_reversed_total", "kind" => "full").increment(1);
        info!(
            commission_id = %commission.commission_id,
            partner_id = %commission.partner_id,
            amount = delta,
            credited = expected == CommissionStatus::Available,
            "commission reversed"
        );
        Ok(commission)
    }

    async fn reverse_partial_in(
        &self,
        tx: &mut dyn StoreTx,
        mut commission: Commission,
        delta: Amount,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<Commission> {
        let expected = commission.status;
        commission.amount -= delta;
        commission.reversed_amount += delta;
        tx.update_commission(commission.clone(), expected).await?;

        if expected == CommissionStatus::Available {
            self.debit_reversal(tx, &commission, delta, now).await?;
        }
        tx.append_audit(
            AuditEvent::new(
                AuditAction::CommissionPartiallyReversed,
                "Commission",
                &commission.commission_id,
                actor,
                now,
            )
            .with_partner(&commission.partner_id)
            .with_amount(delta),
        )
        .await?;

        counter!("affiliate_commissions_reversed_total", "kind" => "partial").increment(1);
        debug!(
            commission_id = %commission.commission_id,
            amount = delta,
            remaining = commission.amount,
            "commission partially reversed"
        );
        Ok(commission)
    }

    async fn debit_reversal(
        &self,
        tx: &mut dyn StoreTx,
        commission: &Commission,
        delta: Amount,
        now: DateTime<Utc>,
    ) -> LedgerResult<WalletTransaction> {
        Ok(tx
            .append_wallet(NewWalletTx {
                partner_id: commission.partner_id.clone(),
                tx_type: WalletTxType::Reverse,
                amount: -delta,
                reference: Some(WalletRef::Commission(commission.commission_id.clone())),
                created_at: now,
            })
            .await?)
    }

    async fn apply_plan_in(
        &self,
        tx: &mut dyn StoreTx,
        commission: Commission,
        plan: ReversalPlan,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<Commission> {
        match plan {
            ReversalPlan::Nothing => Ok(commission),
            ReversalPlan::Partial { delta } => {
                self.reverse_partial_in(tx, commission, delta, actor, now).await
            }
            ReversalPlan::Full { delta } => {
                self.reverse_full_in(tx, commission, delta, actor, None, now).await
            }
        }
    }

    /// Apply a delivery/return/cancel update and the reversal it implies
    pub async fn apply_order_update(
        &self,
        order_id: &OrderId,
        update: OrderUpdate,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<OrderUpdateOutcome> {
        let mut tx = self.store.begin().await?;
        let mut order = tx.get_order_required(order_id).await?;
        update.apply_to(&mut order, now)?;
        tx.put_order(order.clone()).await?;

        let mut reversal = ReversalPlan::Nothing;
        let commission = match tx.get_commission_by_order(order_id).await? {
            Some(commission) => {
                reversal = plan_reversal(&commission, &order);
                Some(
                    self.apply_plan_in(tx.as_mut(), commission, reversal, actor, now)
                        .await?,
                )
            }
            None => None,
        };
        tx.commit().await?;

        Ok(OrderUpdateOutcome {
            order,
            commission,
            reversal,
        })
    }

    // ============================================================
    // Settlement
    // ============================================================

    /// Settle one commission: reverse what returns require, then release if
    /// the hold has passed and the order is DELIVERED. Commissions flagged for
    /// review, or whose partner is `held`, are counted but not released.
    ///
    /// A commission no longer PENDING is skipped, so re-runs never double-credit.
    pub async fn settle(
        &self,
        commission_id: &CommissionId,
        held: bool,
        now: DateTime<Utc>,
    ) -> LedgerResult<SettleOutcome> {
        let mut outcome = SettleOutcome::default();
        let mut tx = self.store.begin().await?;
        let commission = tx.get_commission_required(commission_id).await?;
        if commission.status != CommissionStatus::Pending {
            outcome.skipped = true;
            return Ok(outcome);
        }
        let order = tx.get_order_required(&commission.order_id).await?;

        let plan = plan_reversal(&commission, &order);
        let commission = self
            .apply_plan_in(tx.as_mut(), commission, plan, Actor::System, now)
            .await?;
        match plan {
            ReversalPlan::Full { .. } => outcome.reversed = true,
            ReversalPlan::Partial { .. } => outcome.partially_reversed = true,
            ReversalPlan::Nothing => {}
        }

        if commission.status == CommissionStatus::Pending
            && check_release(&commission, &order, now).is_ok()
        {
            if held || commission.review_hold {
                outcome.held = true;
            } else {
                self.release_in(tx.as_mut(), commission, Actor::System, None, now)
                    .await?;
                outcome.released = true;
            }
        }
        tx.commit().await?;
        Ok(outcome)
    }

    // ============================================================
    // Payout payment
    // ============================================================

    /// APPROVED -> PAID: PAYOUT wallet row, commissions marked PAID, audit.
    pub async fn pay(
        &self,
        payout_id: &PayoutId,
        transaction_ref: Option<String>,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> LedgerResult<PayoutRequest> {
        let mut tx = self.store.begin().await?;
        let mut payout = tx.get_payout_required(payout_id).await?;
        let expected = payout.status;
        payout.transition(PayoutStatus::Paid, now)?;

        let partner = tx.get_partner_required(&payout.partner_id).await?;
        partner.require_active()?;

        let balance = tx.wallet_balance(&payout.partner_id).await?;
        if payout.amount > balance {
            return Err(AffiliateError::InsufficientFunds {
                requested: payout.amount,
                available: balance,
            }
            .into());
        }

        let available = tx
            .list_commissions(
                &CommissionFilter::default()
                    .with_partner(payout.partner_id.clone())
                    .with_status(CommissionStatus::Available),
            )
            .await?;
        let allocations = allocate(&available, payout.amount, self.config.payout_settlement)?;

        for allocation in &allocations {
            let Some(mut commission) = available
                .iter()
                .find(|c| c.commission_id == allocation.commission_id)
                .cloned()
            else {
                continue;
            };
            commission.paid_amount += allocation.amount;
            if allocation.settles {
                commission.transition(CommissionStatus::Paid, now)?;
            }
            tx.update_commission(commission.clone(), CommissionStatus::Available)
                .await?;
            if allocation.settles {
                tx.append_audit(
                    AuditEvent::new(
                        AuditAction::CommissionPaid,
                        "Commission",
                        &commission.commission_id,
                        actor.clone(),
                        now,
                    )
                    .with_partner(&commission.partner_id)
                    .with_amount(commission.amount),
                )
                .await?;
            }
        }

        let row = tx
            .append_wallet(NewWalletTx {
                partner_id: payout.partner_id.clone(),
                tx_type: WalletTxType::Payout,
                amount: -payout.amount,
                reference: Some(WalletRef::Payout(payout.payout_id.clone())),
                created_at: now,
            })
            .await?;

        payout.transaction_ref = transaction_ref;
        tx.update_payout(payout.clone(), expected).await?;
        tx.append_audit(
            AuditEvent::new(AuditAction::PayoutPaid, "PayoutRequest", &payout.payout_id, actor, now)
                .with_partner(&payout.partner_id)
                .with_amount(payout.amount)
                .with_note(payout.transaction_ref.clone()),
        )
        .await?;
        tx.commit().await?;

        counter!("affiliate_payouts_paid_total").increment(1);
        info!(
            payout_id = %payout.payout_id,
            partner_id = %payout.partner_id,
            amount = payout.amount,
            commissions = allocations.len(),
            balance_after = row.balance_after,
            "payout paid"
        );
        Ok(payout)
    }

    // ============================================================
    // Reads
    // ============================================================

    /// Wallet view with the `limit` most recent rows
    pub async fn wallet_summary(&self, partner_id: &PartnerId, limit: usize) -> LedgerResult<WalletSummary> {
        let reader = self.store.begin_read().await?;
        reader.get_partner_required(partner_id).await?;
        let commissions = reader
            .list_commissions(&CommissionFilter::default().with_partner(partner_id.clone()))
            .await?;
        let mut transactions = reader.wallet_transactions(partner_id).await?;
        transactions.reverse();
        transactions.truncate(limit);

        Ok(WalletSummary {
            balance: reader.wallet_balance(partner_id).await?,
            pending: commissions
                .iter()
                .filter(|c| c.status == CommissionStatus::Pending)
                .map(|c| c.amount)
                .sum(),
            available: available_total(&commissions),
            transactions,
        })
    }

    /// Unpaid AVAILABLE total for a partner
    pub async fn available_balance(&self, partner_id: &PartnerId) -> LedgerResult<Amount> {
        let reader = self.store.begin_read().await?;
        let commissions = reader
            .list_commissions(
                &CommissionFilter::default()
                    .with_partner(partner_id.clone())
                    .with_status(CommissionStatus::Available),
            )
            .await?;
        Ok(available_total(&commissions))
    }

    /// Filtered, paginated commissions. `page` starts at 1.
    pub async fn list_commissions(
        &self,
        filter: &CommissionFilter,
        page: u32,
        page_size: u32,
    ) -> LedgerResult<CommissionPage> {
        let reader = self.store.begin_read().await?;
        let summary_filter = CommissionFilter {
            status: None,
            ..filter.clone()
        };
        let all = reader.list_commissions(&summary_filter).await?;
        let summary = StatusSummary::from_commissions(&all);

        let matching: Vec<Commission> = all.into_iter().filter(|c| filter.matches(c)).collect();
        let total = matching.len() as u64;
        let offset = (page.max(1) as usize - 1) * page_size as usize;
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        Ok(CommissionPage {
            items,
            total,
            summary,
        })
    }

    pub async fn get_commission(&self, commission_id: &CommissionId) -> LedgerResult<Commission> {
        let reader = self.store.begin_read().await?;
        Ok(reader.get_commission_required(commission_id).await?)
    }

    /// Balance reconstructed from the log as of `at`
    pub async fn balance_at(&self, partner_id: &PartnerId, at: DateTime<Utc>) -> LedgerResult<Amount> {
        let reader = self.store.begin_read().await?;
        Ok(reader
            .wallet_transactions(partner_id)
            .await?
            .iter()
            .filter(|row| row.created_at <= at)
            .map(|row| row.amount)
            .sum())
    }

    /// Check every wallet chain: each row's balance equals the running sum
    /// and sequence numbers are contiguous.
    pub async fn verify_balances(&self) -> LedgerResult<Vec<BalanceMismatch>> {
        let reader = self.store.begin_read().await?;
        let mut mismatches = Vec::new();
        for partner_id in reader.wallet_partners().await? {
            let mut running: Amount = 0;
            for (index, row) in reader.wallet_transactions(&partner_id).await?.iter().enumerate() {
                running += row.amount;
                if row.balance_after != running || row.seq != index as u64 + 1 {
                    mismatches.push(BalanceMismatch {
                        partner_id: partner_id.clone(),
                        seq: row.seq,
                        expected_balance: running,
                        stored_balance: row.balance_after,
                    });
                }
            }
        }
        if !mismatches.is_empty() {
            warn!(count = mismatches.len(), "wallet balance chain mismatches found");
        }
        Ok(mismatches)
    }

    /// Audit events, optionally for one entity, in write order
    pub async fn audit_trail(&self, entity_id: Option<&str>) -> LedgerResult<Vec<AuditEvent>> {
        let reader = self.store.begin_read().await?;
        Ok(reader.list_audit(entity_id).await?)
    }
}

fn duplicate_referral(err: StoreError, order_id: &OrderId) -> LedgerError {
    match err {
        StoreError::Duplicate { .. } => AffiliateError::DuplicateReferral {
            order_id: order_id.to_string(),
        }
        .into(),
        other => other.into(),
    }
}
