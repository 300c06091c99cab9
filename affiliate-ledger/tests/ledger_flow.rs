//! Ledger flow tests over the in-memory store, plus restart checks over SQLite.

use affiliate_core::*;
use affiliate_ledger::*;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

struct Harness {
    engine: AffiliateEngine,
    now: DateTime<Utc>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(LedgerConfig::default()).await
    }

    async fn with_config(config: LedgerConfig) -> Self {
        Self::with_engine(AffiliateEngine::in_memory(config)).await
    }

    async fn with_engine(engine: AffiliateEngine) -> Self {
        let now = Utc::now();
        engine.bootstrap(now).await.unwrap();
        Self { engine, now }
    }

    /// ACTIVE partner owning coupon `<id>CODE`
    async fn partner(&self, id: &str) -> PartnerId {
        let partner_id = PartnerId::new(id);
        self.engine
            .partners
            .apply(Partner::apply(partner_id.clone(), id, self.now).with_user_id(format!("user_{}", id)))
            .await
            .unwrap();
        self.engine
            .partners
            .act(&partner_id, PartnerAction::Approve, Actor::System, None, self.now)
            .await
            .unwrap();
        self.engine
            .partners
            .register_coupon(Coupon::new(&format!("{}CODE", id), Decimal::from(10)).owned_by(partner_id.clone()))
            .await
            .unwrap();
        partner_id
    }

    async fn coupon_order(&self, order_id: &str, subtotal: Amount, partner: &str) -> PlacedOrder {
        self.order_with(OrderSnapshot::new(OrderId::new(order_id), subtotal, self.now), partner)
            .await
    }

    async fn order_with(&self, order: OrderSnapshot, partner: &str) -> PlacedOrder {
        self.engine
            .ledger
            .place_order(
                order,
                AttributionRequest::default().with_coupon(format!("{}code", partner)),
                self.now,
            )
            .await
            .unwrap()
    }

    async fn update(&self, order_id: &str, update: OrderUpdate) -> OrderUpdateOutcome {
        self.engine
            .ledger
            .apply_order_update(&OrderId::new(order_id), update, Actor::System, self.now)
            .await
            .unwrap()
    }

    async fn deliver(&self, order_id: &str) {
        self.update(
            order_id,
            OrderUpdate {
                delivery_status: Some(DeliveryStatus::Delivered),
                ..Default::default()
            },
        )
        .await;
    }

    fn after_hold(&self) -> DateTime<Utc> {
        self.now + Duration::days(15)
    }

    async fn wallet(&self, partner_id: &PartnerId) -> WalletSummary {
        self.engine.ledger.wallet_summary(partner_id, 100).await.unwrap()
    }

    async fn assert_balances_consistent(&self) {
        let mismatches = self.engine.ledger.verify_balances().await.unwrap();
        assert!(mismatches.is_empty(), "{:?}", mismatches);
    }
}

#[tokio::test]
async fn test_order_to_release_end_to_end() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;

    let placed = h.coupon_order("ord_1", 1_000_000, "alice").await;
    let referral = placed.referral.unwrap();
    assert_eq!(referral.attribution_type, AttributionType::Coupon);
    assert_eq!(referral.partner_id, partner);

    let commission = placed.commission.unwrap();
    assert_eq!(commission.amount, 50_000);
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.hold_until, h.now + Duration::days(14));

    // Inside the hold window nothing moves
    h.deliver("ord_1").await;
    let report = h.engine.settlement.run(h.now + Duration::days(1)).await.unwrap();
    assert_eq!(report.processed_total, 1);
    assert_eq!(report.released, 0);

    let report = h.engine.settlement.run(h.after_hold()).await.unwrap();
    assert_eq!(report.released, 1);

    let commission = h.engine.ledger.get_commission(&commission.commission_id).await.unwrap();
    assert_eq!(commission.status, CommissionStatus::Available);

    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.balance, 50_000);
    assert_eq!(wallet.available, 50_000);
    assert_eq!(wallet.transactions.len(), 1);
    let row = &wallet.transactions[0];
    assert_eq!(row.tx_type, WalletTxType::Earn);
    assert_eq!(row.amount, 50_000);
    assert_eq!(row.balance_after, 50_000);
    h.assert_balances_consistent().await;
}

#[tokio::test]
async fn test_release_requires_delivery() {
    let h = Harness::new().await;
    h.partner("alice").await;
    let commission = h.coupon_order("ord_1", 1_000_000, "alice").await.commission.unwrap();
    h.update(
        "ord_1",
        OrderUpdate {
            delivery_status: Some(DeliveryStatus::Shipping),
            ..Default::default()
        },
    )
    .await;

    let report = h.engine.settlement.run(h.after_hold()).await.unwrap();
    assert_eq!(report.released, 0);

    let err = h
        .engine
        .ledger
        .release(&commission.commission_id, ReleaseMode::Scheduled, h.after_hold())
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ILLEGAL_TRANSITION");
}

#[tokio::test]
async fn test_full_return_before_release_reverses_without_wallet_row() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    h.coupon_order("ord_1", 1_000_000, "alice").await;

    let outcome = h
        .update(
            "ord_1",
            OrderUpdate {
                returned_amount: Some(1_000_000),
                ..Default::default()
            },
        )
        .await;
    let commission = outcome.commission.unwrap();
    assert_eq!(commission.status, CommissionStatus::Reversed);
    assert!(matches!(outcome.reversal, ReversalPlan::Full { delta: 50_000 }));

    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.balance, 0);
    assert!(wallet.transactions.is_empty());

    // Reversed is terminal
    let err = h
        .engine
        .ledger
        .release(
            &commission.commission_id,
            ReleaseMode::Manual {
                actor: Actor::Admin("ops".into()),
                note: None,
            },
            h.after_hold(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ILLEGAL_TRANSITION");
}

#[tokio::test]
async fn test_partial_return_after_release_debits_delta() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    let commission = h.coupon_order("ord_1", 1_000_000, "alice").await.commission.unwrap();
    h.deliver("ord_1").await;
    h.engine.settlement.run(h.after_hold()).await.unwrap();

    let returned = OrderUpdate {
        returned_amount: Some(250_000),
        ..Default::default()
    };
    let outcome = h.update("ord_1", returned.clone()).await;
    assert_eq!(outcome.reversal, ReversalPlan::Partial { delta: 12_500 });
    let c = outcome.commission.unwrap();
    assert_eq!(c.status, CommissionStatus::Available);
    assert_eq!(c.amount, 37_500);
    assert_eq!(c.reversed_amount, 12_500);
    assert_eq!(c.original_amount, 50_000);

    // Same update again changes nothing
    let outcome = h.update("ord_1", returned).await;
    assert_eq!(outcome.reversal, ReversalPlan::Nothing);

    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.balance, 37_500);
    assert_eq!(wallet.transactions[0].tx_type, WalletTxType::Reverse);
    assert_eq!(wallet.transactions[0].amount, -12_500);

    // Cancelling reverses the remainder
    let outcome = h
        .update(
            "ord_1",
            OrderUpdate {
                cancelled: Some(true),
                ..Default::default()
            },
        )
        .await;
    assert_eq!(outcome.commission.unwrap().status, CommissionStatus::Reversed);
    assert_eq!(h.wallet(&partner).await.balance, 0);
    assert_eq!(
        h.engine
            .ledger
            .get_commission(&commission.commission_id)
            .await
            .unwrap()
            .reversed_amount,
        50_000
    );
    h.assert_balances_consistent().await;
}

#[tokio::test]
async fn test_partial_return_while_pending_shrinks_only() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    h.coupon_order("ord_1", 1_000_000, "alice").await;
    h.update(
        "ord_1",
        OrderUpdate {
            returned_amount: Some(500_000),
            delivery_status: Some(DeliveryStatus::Delivered),
            ..Default::default()
        },
    )
    .await;

    h.engine.settlement.run(h.after_hold()).await.unwrap();
    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.transactions.len(), 1);
    assert_eq!(wallet.balance, 25_000);
}

#[tokio::test]
async fn test_settlement_is_idempotent() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    for i in 0..5 {
        let id = format!("ord_{}", i);
        h.coupon_order(&id, 1_000_000, "alice").await;
        h.deliver(&id).await;
    }

    let first = h.engine.settlement.run(h.after_hold()).await.unwrap();
    assert_eq!(first.released, 5);
    let second = h.engine.settlement.run(h.after_hold()).await.unwrap();
    assert_eq!(second.processed_total, 0);
    assert_eq!(second.released, 0);

    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.transactions.len(), 5);
    assert_eq!(wallet.balance, 250_000);
    h.assert_balances_consistent().await;
}

#[tokio::test]
async fn test_concurrent_releases_credit_once() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    let commission = h.coupon_order("ord_1", 1_000_000, "alice").await.commission.unwrap();
    h.deliver("ord_1").await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = h.engine.ledger.clone();
        let id = commission.commission_id.clone();
        let at = h.after_hold();
        handles.push(tokio::spawn(async move {
            ledger.release(&id, ReleaseMode::Scheduled, at).await
        }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(h.wallet(&partner).await.balance, 50_000);
}

#[tokio::test]
async fn test_manual_override_rules() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    let commission = h.coupon_order("ord_1", 1_000_000, "alice").await.commission.unwrap();
    h.deliver("ord_1").await;

    // Admin release skips the hold window
    let released = h
        .engine
        .ledger
        .release(
            &commission.commission_id,
            ReleaseMode::Manual {
                actor: Actor::Admin("ops".into()),
                note: Some("early".into()),
            },
            h.now,
        )
        .await
        .unwrap();
    assert_eq!(released.status, CommissionStatus::Available);
    assert_eq!(released.note.as_deref(), Some("early"));

    // Admin reverse of an AVAILABLE commission writes the compensating row
    let reversed = h
        .engine
        .ledger
        .reverse(&commission.commission_id, Actor::Admin("ops".into()), None, h.now)
        .await
        .unwrap();
    assert_eq!(reversed.status, CommissionStatus::Reversed);
    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.transactions.len(), 2);

    let err = h
        .engine
        .ledger
        .reverse(&commission.commission_id, Actor::Admin("ops".into()), None, h.now)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ILLEGAL_TRANSITION");

    let audit = h
        .engine
        .store()
        .begin_read()
        .await
        .unwrap()
        .list_audit(Some(commission.commission_id.as_str()))
        .await
        .unwrap();
    let actions: Vec<AuditAction> = audit.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::CommissionCreated,
            AuditAction::CommissionReleased,
            AuditAction::CommissionReversed
        ]
    );
}

#[tokio::test]
async fn test_coupon_beats_recent_session() {
    let h = Harness::new().await;
    let alice = h.partner("alice").await;
    let bob = h.partner("bob").await;

    h.engine
        .attribution
        .record_visit("sess_1", Some("buyer".into()), &bob, h.now)
        .await
        .unwrap();

    let placed = h
        .engine
        .ledger
        .place_order(
            OrderSnapshot::new(OrderId::new("ord_1"), 1_000_000, h.now),
            AttributionRequest::default()
                .with_coupon("ALICECODE")
                .with_session("sess_1")
                .with_user("buyer"),
            h.now,
        )
        .await
        .unwrap();
    assert_eq!(placed.referral.unwrap().partner_id, alice);

    // Without the coupon the session wins
    let placed = h
        .engine
        .ledger
        .place_order(
            OrderSnapshot::new(OrderId::new("ord_2"), 1_000_000, h.now),
            AttributionRequest::default().with_user("buyer"),
            h.now,
        )
        .await
        .unwrap();
    let referral = placed.referral.unwrap();
    assert_eq!(referral.partner_id, bob);
    assert_eq!(referral.attribution_type, AttributionType::LastClick);
}

#[tokio::test]
async fn test_expired_session_is_organic() {
    let h = Harness::new().await;
    let bob = h.partner("bob").await;
    h.engine
        .attribution
        .record_visit("sess_1", None, &bob, h.now - Duration::days(8))
        .await
        .unwrap();

    let placed = h
        .engine
        .ledger
        .place_order(
            OrderSnapshot::new(OrderId::new("ord_1"), 1_000_000, h.now),
            AttributionRequest::default().with_session("sess_1"),
            h.now,
        )
        .await
        .unwrap();
    assert!(placed.referral.is_none());
    assert!(placed.commission.is_none());
}

#[tokio::test]
async fn test_duplicate_order_conflicts() {
    let h = Harness::new().await;
    h.partner("alice").await;
    h.coupon_order("ord_1", 1_000_000, "alice").await;

    let err = h
        .engine
        .ledger
        .place_order(
            OrderSnapshot::new(OrderId::new("ord_1"), 1_000_000, h.now),
            AttributionRequest::default().with_coupon("ALICECODE"),
            h.now,
        )
        .await
        .unwrap_err();
    assert_eq!(err.code(), "CONFLICT");
}

#[tokio::test]
async fn test_rule_cascade_and_bonus() {
    let h = Harness::new().await;
    h.partner("alice").await;
    h.engine
        .rules
        .upsert(
            CommissionRule::new(RuleScope::Category, Some("shoes".into()), Decimal::from(10), h.now)
                .with_fixed_bonus(1_000),
            Actor::Admin("ops".into()),
            h.now,
        )
        .await
        .unwrap();

    let order = OrderSnapshot::new(OrderId::new("ord_1"), 1_000_000, h.now)
        .with_discount(200_000)
        .with_shipping_fee(30_000)
        .with_items(vec![OrderItem {
            product_id: "sku_1".into(),
            category_id: Some("shoes".into()),
            line_total: 1_000_000,
        }]);
    let commission = h.order_with(order, "alice").await.commission.unwrap();
    assert_eq!(commission.amount, 80_000 + 1_000);
}

#[tokio::test]
async fn test_no_rule_means_no_commission() {
    let h = Harness::with_config(LedgerConfig {
        seed_default_rules: false,
        ..Default::default()
    })
    .await;
    h.partner("alice").await;
    let placed = h.coupon_order("ord_1", 1_000_000, "alice").await;
    assert!(placed.referral.is_some());
    assert!(placed.commission.is_none());
}

#[tokio::test]
async fn test_payout_earmarks_oldest_first() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    // ord_1 is released first, so it is the oldest AVAILABLE commission
    for (offset, (id, subtotal)) in [("ord_1", 2_000_000), ("ord_2", 4_000_000)].into_iter().enumerate() {
        let commission = h.coupon_order(id, subtotal, "alice").await.commission.unwrap();
        h.deliver(id).await;
        h.engine
            .ledger
            .release(
                &commission.commission_id,
                ReleaseMode::Scheduled,
                h.after_hold() + Duration::hours(offset as i64),
            )
            .await
            .unwrap();
    }
    assert_eq!(h.wallet(&partner).await.available, 300_000);

    // Limits and single outstanding request
    let payouts = &h.engine.payouts;
    let err = payouts.request(&partner, 99_999, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
    let err = payouts.request(&partner, 300_001, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");

    let payout = payouts.request(&partner, 150_000, Some("bank_1".into()), h.now).await.unwrap();
    let err = payouts.request(&partner, 100_000, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "ILLEGAL_TRANSITION");

    // Paying before approval is illegal
    let admin = Actor::Admin("ops".into());
    let err = payouts
        .act(&payout.payout_id, PayoutAction::Pay, None, admin.clone(), h.now)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "ILLEGAL_TRANSITION");

    payouts
        .act(&payout.payout_id, PayoutAction::Approve, None, admin.clone(), h.now)
        .await
        .unwrap();
    let paid = payouts
        .act(&payout.payout_id, PayoutAction::Pay, Some("txn_9".into()), admin, h.now)
        .await
        .unwrap();
    assert_eq!(paid.status, PayoutStatus::Paid);
    assert_eq!(paid.transaction_ref.as_deref(), Some("txn_9"));

    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.balance, 150_000);
    assert_eq!(wallet.available, 150_000);
    assert_eq!(wallet.transactions[0].tx_type, WalletTxType::Payout);
    assert_eq!(wallet.transactions[0].amount, -150_000);

    // 100,000 from ord_1 settles it; 50,000 comes from ord_2
    let page = h
        .engine
        .ledger
        .list_commissions(&CommissionFilter::default().with_partner(partner.clone()), 1, 10)
        .await
        .unwrap();
    assert_eq!(page.summary.paid_count, 1);
    assert_eq!(page.summary.available_count, 1);
    let open = page
        .items
        .iter()
        .find(|c| c.status == CommissionStatus::Available)
        .unwrap();
    assert_eq!(open.paid_amount, 50_000);
    h.assert_balances_consistent().await;
}

#[tokio::test]
async fn test_payout_all_available_mode_marks_every_commission() {
    let h = Harness::with_config(LedgerConfig {
        payout_settlement: PayoutSettlement::AllAvailable,
        ..Default::default()
    })
    .await;
    let partner = h.partner("alice").await;
    for id in ["ord_1", "ord_2"] {
        h.coupon_order(id, 2_000_000, "alice").await;
        h.deliver(id).await;
    }
    h.engine.settlement.run(h.after_hold()).await.unwrap();

    let admin = Actor::Admin("ops".into());
    let payout = h.engine.payouts.request(&partner, 150_000, None, h.now).await.unwrap();
    h.engine.payouts.approve(&payout.payout_id, admin.clone(), h.now).await.unwrap();
    h.engine.ledger.pay(&payout.payout_id, None, admin, h.now).await.unwrap();

    let page = h
        .engine
        .ledger
        .list_commissions(&CommissionFilter::default().with_status(CommissionStatus::Paid), 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(h.wallet(&partner).await.balance, 50_000);
}

#[tokio::test]
async fn test_rejected_payout_frees_the_slot() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    h.coupon_order("ord_1", 4_000_000, "alice").await;
    h.deliver("ord_1").await;
    h.engine.settlement.run(h.after_hold()).await.unwrap();

    let admin = Actor::Admin("ops".into());
    let payout = h.engine.payouts.request(&partner, 100_000, None, h.now).await.unwrap();
    let rejected = h
        .engine
        .payouts
        .reject(&payout.payout_id, Some("bank details".into()), admin, h.now)
        .await
        .unwrap();
    assert_eq!(rejected.status, PayoutStatus::Rejected);
    assert_eq!(h.wallet(&partner).await.balance, 200_000);
    assert!(h.engine.payouts.request(&partner, 100_000, None, h.now).await.is_ok());
}

#[tokio::test]
async fn test_approved_payout_funds_cannot_be_requested_again() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    h.coupon_order("ord_1", 4_000_000, "alice").await;
    h.deliver("ord_1").await;
    h.engine.settlement.run(h.after_hold()).await.unwrap();
    assert_eq!(h.wallet(&partner).await.available, 200_000);

    let admin = Actor::Admin("ops".into());
    let first = h.engine.payouts.request(&partner, 200_000, None, h.now).await.unwrap();
    h.engine.payouts.approve(&first.payout_id, admin.clone(), h.now).await.unwrap();

    // The approved payout already claims the whole balance
    let err = h.engine.payouts.request(&partner, 200_000, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    let err = h.engine.payouts.request(&partner, 100_000, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");

    h.engine.ledger.pay(&first.payout_id, Some("txn_1".into()), admin, h.now).await.unwrap();
    assert_eq!(h.wallet(&partner).await.balance, 0);
    let err = h.engine.payouts.request(&partner, 100_000, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    h.assert_balances_consistent().await;
}

#[tokio::test]
async fn test_tier_promotion_after_revenue_threshold() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    for i in 0..15 {
        let id = format!("ord_{}", i);
        h.coupon_order(&id, 800_000, "alice").await;
        h.deliver(&id).await;
    }

    let report = h.engine.settlement.run(h.now + Duration::days(1)).await.unwrap();
    assert_eq!(
        report.tier_upgrades,
        vec![TierUpgrade {
            partner_id: partner.clone(),
            from: Tier::Affiliate,
            to: Tier::Agent,
        }]
    );
    assert_eq!(h.engine.partners.get(&partner).await.unwrap().tier, Tier::Agent);

    // Agent rate applies to new orders
    let commission = h.coupon_order("ord_next", 1_000_000, "alice").await.commission.unwrap();
    assert_eq!(commission.amount, 80_000);

    // Not enough for LEADER on the next run
    let report = h.engine.settlement.run(h.now + Duration::days(1)).await.unwrap();
    assert!(report.tier_upgrades.is_empty());
}

#[tokio::test]
async fn test_fraud_hold_blocks_auto_release_only() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    for i in 0..5 {
        let id = format!("ord_{}", i);
        let order = OrderSnapshot::new(OrderId::new(id.as_str()), 1_000_000, h.now).with_fingerprint(OrderFingerprint {
            user_id: Some("user_alice".into()),
            ..Default::default()
        });
        h.order_with(order, "alice").await;
        h.deliver(&id).await;
    }

    let report = h.engine.fraud.recompute_all(h.now).await.unwrap();
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.flagged, 1);
    assert!(report.suspended.is_empty());
    let flagged = h.engine.fraud.flagged().await.unwrap();
    assert_eq!(flagged[0].score, 50);

    let settled = h.engine.settlement.run(h.after_hold()).await.unwrap();
    assert_eq!(settled.held, 5);
    assert_eq!(settled.released, 0);

    // Admin can still release a held commission
    let held = h
        .engine
        .ledger
        .list_commissions(&CommissionFilter::default().with_partner(partner.clone()), 1, 1)
        .await
        .unwrap()
        .items
        .remove(0);
    h.engine
        .ledger
        .release(
            &held.commission_id,
            ReleaseMode::Manual {
                actor: Actor::Admin("ops".into()),
                note: Some("reviewed".into()),
            },
            h.after_hold(),
        )
        .await
        .unwrap();
    assert_eq!(h.wallet(&partner).await.balance, 50_000);

    // New commissions carry the review flag
    let c = h.coupon_order("ord_new", 1_000_000, "alice").await.commission.unwrap();
    assert!(c.review_hold);
}

#[tokio::test]
async fn test_fraud_suspension_blocks_attribution_and_payout() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    for i in 0..9 {
        let order = OrderSnapshot::new(OrderId::new(format!("ord_{}", i)), 1_000_000, h.now).with_fingerprint(
            OrderFingerprint {
                user_id: Some("user_alice".into()),
                ..Default::default()
            },
        );
        h.order_with(order, "alice").await;
    }

    let report = h.engine.fraud.recompute_all(h.now).await.unwrap();
    assert_eq!(report.suspended, vec![partner.clone()]);
    let suspended = h.engine.partners.get(&partner).await.unwrap();
    assert_eq!(suspended.status, PartnerStatus::Suspended);

    let placed = h.coupon_order("ord_after", 1_000_000, "alice").await;
    assert!(placed.referral.is_none());

    let err = h.engine.payouts.request(&partner, 100_000, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "ILLEGAL_TRANSITION");

    // Suspended partners are skipped by the next recompute
    let report = h.engine.fraud.recompute_all(h.now).await.unwrap();
    assert_eq!(report.evaluated, 0);
}

#[tokio::test]
async fn test_banded_formula_recompute_stores_banded_signal() {
    let h = Harness::with_config(LedgerConfig {
        risk_formula: RiskFormula::Banded,
        ..Default::default()
    })
    .await;
    let partner = h.partner("alice").await;
    for i in 0..7 {
        let order = OrderSnapshot::new(OrderId::new(format!("ord_{}", i)), 1_000_000, h.now).with_fingerprint(
            OrderFingerprint {
                device_id: Some("dev_1".into()),
                ip_address: Some("10.0.0.1".into()),
                user_id: Some("user_alice".into()),
                ..Default::default()
            },
        );
        h.order_with(order, "alice").await;
    }

    let report = h.engine.fraud.recompute_all(h.now).await.unwrap();
    assert_eq!(report.evaluated, 1);
    assert_eq!(report.flagged, 0);
    assert!(report.suspended.is_empty());

    // Six repeat devices band to 20 and six repeat IPs to 15; self purchases
    // only count under the weighted formula
    let signal = h.engine.fraud.recompute_partner(&partner, h.now).await.unwrap();
    assert_eq!(signal.formula, RiskFormula::Banded);
    assert_eq!(signal.inputs.same_device_count, 6);
    assert_eq!(signal.inputs.self_purchase_count, 7);
    assert_eq!(signal.score, 35);
    assert_eq!(signal.order_count, 7);
    assert!(!h.engine.fraud.is_held(&partner).await.unwrap());
    assert!(h.engine.fraud.flagged().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sqlite_ledger_survives_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = LedgerConfig {
        database_url: Some(format!("sqlite://{}", dir.path().join("affiliate.db").display())),
        ..Default::default()
    };

    let partner = {
        let h = Harness::with_engine(AffiliateEngine::open(config.clone()).await.unwrap()).await;
        let partner = h.partner("alice").await;
        for id in ["ord_1", "ord_2"] {
            h.coupon_order(id, 1_000_000, "alice").await;
            h.deliver(id).await;
        }
        let report = h.engine.settlement.run(h.after_hold()).await.unwrap();
        assert_eq!(report.released, 2);
        h.update(
            "ord_2",
            OrderUpdate {
                returned_amount: Some(400_000),
                ..Default::default()
            },
        )
        .await;
        partner
    };

    let h = Harness::with_engine(AffiliateEngine::open(config).await.unwrap()).await;
    assert_eq!(h.engine.health().await.unwrap().backend, "sqlite");

    let wallet = h.wallet(&partner).await;
    assert_eq!(wallet.balance, 80_000);
    assert_eq!(wallet.available, 80_000);
    assert_eq!(wallet.transactions.len(), 3);
    assert_eq!(wallet.transactions[0].tx_type, WalletTxType::Reverse);
    assert_eq!(wallet.transactions[0].balance_after, 80_000);
    h.assert_balances_consistent().await;

    let page = h
        .engine
        .ledger
        .list_commissions(&CommissionFilter::default().with_partner(partner.clone()), 1, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.summary.available_count, 2);

    // Rules seeded on first start are not duplicated
    assert_eq!(h.engine.rules.matcher().await.unwrap().len(), 3);
    let err = h.engine.payouts.request(&partner, 100_000, None, h.now).await.unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
}

#[tokio::test]
async fn test_balance_reconstruction_from_log() {
    let h = Harness::new().await;
    let partner = h.partner("alice").await;
    for id in ["ord_1", "ord_2"] {
        h.coupon_order(id, 1_000_000, "alice").await;
        h.deliver(id).await;
    }
    let first = h.now + Duration::days(15);
    let second = h.now + Duration::days(20);
    let ids: Vec<CommissionId> = h
        .engine
        .ledger
        .list_commissions(&CommissionFilter::default(), 1, 10)
        .await
        .unwrap()
        .items
        .into_iter()
        .map(|c| c.commission_id)
        .collect();
    h.engine.ledger.release(&ids[0], ReleaseMode::Scheduled, first).await.unwrap();
    h.engine.ledger.release(&ids[1], ReleaseMode::Scheduled, second).await.unwrap();

    let ledger = &h.engine.ledger;
    assert_eq!(ledger.balance_at(&partner, h.now).await.unwrap(), 0);
    assert_eq!(ledger.balance_at(&partner, first).await.unwrap(), 50_000);
    assert_eq!(ledger.balance_at(&partner, second).await.unwrap(), 100_000);
}

#[tokio::test]
async fn test_commission_listing_paginates_with_full_summary() {
    let h = Harness::new().await;
    h.partner("alice").await;
    for i in 0..5 {
        h.coupon_order(&format!("ord_{}", i), 1_000_000, "alice").await;
    }
    h.update(
        "ord_0",
        OrderUpdate {
            cancelled: Some(true),
            ..Default::default()
        },
    )
    .await;

    let filter = CommissionFilter::default().with_status(CommissionStatus::Pending);
    let page = h.engine.ledger.list_commissions(&filter, 2, 3).await.unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.summary.pending_count, 4);
    assert_eq!(page.summary.reversed_count, 1);
}
