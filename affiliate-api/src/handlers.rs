//! API Handlers
//!
//! HTTP handler implementations for the affiliate endpoints. Handlers parse
//! and map; every rule lives in `affiliate-ledger`.

use affiliate_core::*;
use affiliate_ledger::{
    BalanceMismatch, CommissionFilter, FraudRefreshReport, PartnerAction, PayoutAction, PayoutFilter,
    ReleaseMode, SettlementReport,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{AuthInfo, PartnerIdentity};
use crate::dto::*;
use crate::error::{ApiError, ApiResult};
use crate::metrics::MetricsSummary;
use crate::state::{AppState, ComponentHealthCheck, HealthStatus};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const WALLET_ROWS: usize = 50;

/// Health check handler
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut components = vec![];

    match state.engine.health().await {
        Ok(health) if health.healthy => components.push(ComponentHealthCheck::healthy(format!(
            "store:{}",
            health.backend
        ))),
        Ok(health) => components.push(ComponentHealthCheck::unhealthy(
            format!("store:{}", health.backend),
            "store reported unhealthy",
        )),
        Err(err) => components.push(ComponentHealthCheck::unhealthy("store", err.to_string())),
    }

    match state.engine.ledger.verify_balances().await {
        Ok(mismatches) if mismatches.is_empty() => {
            components.push(ComponentHealthCheck::healthy("wallet_ledger"))
        }
        Ok(mismatches) => components.push(ComponentHealthCheck::degraded(
            "wallet_ledger",
            format!("{} balance chain mismatches", mismatches.len()),
        )),
        Err(err) => components.push(ComponentHealthCheck::unhealthy("wallet_ledger", err.to_string())),
    }

    let overall_status = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
        "healthy"
    } else if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        "unhealthy"
    } else {
        "degraded"
    };

    Ok(Json(HealthResponse {
        status: overall_status.to_string(),
        version: state.config.version.clone(),
        uptime_secs: state.uptime_secs(),
        components: components
            .into_iter()
            .map(|c| ComponentHealth {
                name: c.name,
                status: c.status.as_str().to_string(),
                message: c.message,
            })
            .collect(),
    }))
}

/// Request counters
pub async fn get_stats(State(state): State<Arc<AppState>>) -> ApiResult<Json<MetricsSummary>> {
    Ok(Json(MetricsSummary {
        total_requests: state.request_count().await,
        active_requests: state.active_requests(),
        uptime_seconds: state.uptime_secs(),
        metrics_enabled: state.config.metrics_enabled,
    }))
}

// ============================================
// Commissions
// ============================================

/// `GET /commissions`
pub async fn list_commissions(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CommissionListQuery>, QueryRejection>,
) -> ApiResult<Json<CommissionListResponse>> {
    let Query(query) = query?;
    let mut filter = CommissionFilter::default();
    if let Some(status) = query.status.as_deref() {
        filter = filter.with_status(status.parse::<CommissionStatus>()?);
    }
    if let Some(partner_id) = query.partner_id {
        filter = filter.with_partner(PartnerId::new(partner_id));
    }
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let result = state
        .engine
        .ledger
        .list_commissions(&filter, page, page_size)
        .await?;
    Ok(Json(CommissionListResponse::from_page(result, page, page_size)))
}

/// `PATCH /commissions`: manual release or reverse
pub async fn update_commission(
    State(state): State<Arc<AppState>>,
    auth: AuthInfo,
    payload: Result<Json<CommissionActionRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse<CommissionDto>>> {
    let Json(request) = payload?;
    let commission_id = CommissionId::new(request.commission_id);
    let now = Utc::now();

    let commission = match request.action.trim().to_lowercase().as_str() {
        "release" => {
            state
                .engine
                .ledger
                .release(
                    &commission_id,
                    ReleaseMode::Manual {
                        actor: auth.actor(),
                        note: request.note,
                    },
                    now,
                )
                .await?
        }
        "reverse" => {
            state
                .engine
                .ledger
                .reverse(&commission_id, auth.actor(), request.note, now)
                .await?
        }
        other => {
            return Err(ApiError::validation(format!(
                "unknown commission action {}, expected release or reverse",
                other
            )))
        }
    };
    Ok(Json(OkResponse::new(commission.into())))
}

/// `POST /commissions/release`: one settlement run
pub async fn run_settlement(State(state): State<Arc<AppState>>) -> ApiResult<Json<SettlementReport>> {
    let report = state.engine.settlement.run(Utc::now()).await?;
    Ok(Json(report))
}

// ============================================
// Rules
// ============================================

/// `GET /commission-rules`
pub async fn list_rules(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<RuleDto>>> {
    let rules = state.engine.rules.list().await?;
    Ok(Json(rules.into_iter().map(RuleDto::from).collect()))
}

/// `POST /commission-rules`: upsert by (scope, scopeId, partnerLevel)
pub async fn upsert_rule(
    State(state): State<Arc<AppState>>,
    auth: AuthInfo,
    payload: Result<Json<RuleUpsertRequest>, JsonRejection>,
) -> ApiResult<Json<RuleDto>> {
    let Json(request) = payload?;
    let now = Utc::now();
    let rule = state
        .engine
        .rules
        .upsert(request.into_rule(now), auth.actor(), now)
        .await?;
    Ok(Json(rule.into()))
}

// ============================================
// Fraud
// ============================================

/// `GET /fraud/signals`: partners at or above the hold score
pub async fn list_fraud_signals(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<FraudSignalDto>>> {
    let flagged = state.engine.fraud.flagged().await?;
    Ok(Json(flagged.into_iter().map(FraudSignalDto::from).collect()))
}

/// `POST /fraud/signals`: recompute every ACTIVE partner
pub async fn refresh_fraud_signals(State(state): State<Arc<AppState>>) -> ApiResult<Json<FraudRefreshReport>> {
    let report = state.engine.fraud.recompute_all(Utc::now()).await?;
    Ok(Json(report))
}

// ============================================
// Partners and coupons
// ============================================

/// `GET /partners`
pub async fn list_partners(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<PartnerDto>>> {
    let partners = state.engine.partners.list().await?;
    Ok(Json(partners.into_iter().map(PartnerDto::from).collect()))
}

/// `POST /partners`: application, starts PENDING
pub async fn apply_partner(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PartnerApplyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PartnerDto>)> {
    let Json(request) = payload?;
    let partner_id = request
        .partner_id
        .map(PartnerId::new)
        .unwrap_or_else(PartnerId::generate);
    let mut partner = Partner::apply(partner_id, request.name, Utc::now());
    partner.user_id = request.user_id;

    let partner = state.engine.partners.apply(partner).await?;
    Ok((StatusCode::CREATED, Json(partner.into())))
}

/// `PATCH /partners`: approve, suspend or reactivate
pub async fn update_partner(
    State(state): State<Arc<AppState>>,
    auth: AuthInfo,
    payload: Result<Json<PartnerActionRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse<PartnerDto>>> {
    let Json(request) = payload?;
    let action: PartnerAction = request.action.parse()?;
    let partner = state
        .engine
        .partners
        .act(
            &PartnerId::new(request.partner_id),
            action,
            auth.actor(),
            request.note,
            Utc::now(),
        )
        .await?;
    Ok(Json(OkResponse::new(partner.into())))
}

/// `GET /coupons`
pub async fn list_coupons(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<CouponDto>>> {
    let coupons = state.engine.partners.list_coupons().await?;
    Ok(Json(coupons.into_iter().map(CouponDto::from).collect()))
}

/// `POST /coupons`
pub async fn register_coupon(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CouponDto>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<CouponDto>)> {
    let Json(request) = payload?;
    let coupon = state
        .engine
        .partners
        .register_coupon(request.into_coupon())
        .await?;
    Ok((StatusCode::CREATED, Json(coupon.into())))
}

// ============================================
// Partner self-service
// ============================================

/// `GET /partner/wallet` query
#[derive(Debug, Default, Deserialize)]
pub struct WalletQuery {
    pub limit: Option<usize>,
}

/// `GET /partner/wallet`
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    PartnerIdentity(partner_id): PartnerIdentity,
    query: Result<Query<WalletQuery>, QueryRejection>,
) -> ApiResult<Json<WalletResponse>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(WALLET_ROWS).min(500);
    let wallet = state.engine.ledger.wallet_summary(&partner_id, limit).await?;
    Ok(Json(wallet.into()))
}

/// `POST /partner/wallet`: request a payout
pub async fn request_payout(
    State(state): State<Arc<AppState>>,
    PartnerIdentity(partner_id): PartnerIdentity,
    payload: Result<Json<PayoutCreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PayoutDto>)> {
    let Json(request) = payload?;
    let payout = state
        .engine
        .payouts
        .request(&partner_id, request.amount, request.bank_ref, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(payout.into())))
}

// ============================================
// Payouts
// ============================================

/// `GET /payouts`
pub async fn list_payouts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PayoutListQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<PayoutDto>>> {
    let Query(query) = query?;
    let filter = PayoutFilter {
        status: query
            .status
            .as_deref()
            .map(str::parse::<PayoutStatus>)
            .transpose()?,
        partner_id: query.partner_id.map(PartnerId::new),
    };
    let payouts = state.engine.payouts.list(&filter).await?;
    Ok(Json(payouts.into_iter().map(PayoutDto::from).collect()))
}

/// `PATCH /payouts`: approve, pay or reject
pub async fn update_payout(
    State(state): State<Arc<AppState>>,
    auth: AuthInfo,
    payload: Result<Json<PayoutActionRequest>, JsonRejection>,
) -> ApiResult<Json<OkResponse<PayoutDto>>> {
    let Json(request) = payload?;
    let action: PayoutAction = request.action.parse()?;
    let payout = state
        .engine
        .payouts
        .act(
            &PayoutId::new(request.payout_id),
            action,
            request.transaction_ref,
            auth.actor(),
            Utc::now(),
        )
        .await?;
    Ok(Json(OkResponse::new(payout.into())))
}

// ============================================
// Collaborator hooks
// ============================================

/// `POST /referrals/visit`
pub async fn record_visit(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VisitRequest>, JsonRejection>,
) -> ApiResult<Json<SessionDto>> {
    let Json(request) = payload?;
    let session = state
        .engine
        .attribution
        .record_visit(
            &request.session_id,
            request.user_id,
            &PartnerId::new(request.partner_id),
            Utc::now(),
        )
        .await?;
    Ok(Json(session.into()))
}

/// `POST /orders`: snapshot, attribution and commission creation
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OrderCreateRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<OrderCreateResponse>)> {
    let Json(request) = payload?;
    let now = Utc::now();
    let (order, attribution) = request.into_parts(now);

    let placed = state.engine.ledger.place_order(order, attribution, now).await?;
    Ok((StatusCode::CREATED, Json(placed.into())))
}

/// `PATCH /orders`: delivery, return and cancel updates
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    auth: AuthInfo,
    payload: Result<Json<OrderUpdateRequest>, JsonRejection>,
) -> ApiResult<Json<OrderUpdateResponse>> {
    let Json(request) = payload?;
    let outcome = state
        .engine
        .ledger
        .apply_order_update(
            &OrderId::new(&request.order_id),
            request.update(),
            auth.collaborator(),
            Utc::now(),
        )
        .await?;
    Ok(Json(outcome.into()))
}

// ============================================
// Audit
// ============================================

/// `GET /audit`
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AuditQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AuditEventDto>>> {
    let Query(query) = query?;
    let events = state
        .engine
        .ledger
        .audit_trail(query.entity_id.as_deref())
        .await?;
    Ok(Json(events.into_iter().map(AuditEventDto::from).collect()))
}

/// `GET /ledger/verify`: wallet balance chain check
pub async fn verify_ledger(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<BalanceMismatch>>> {
    Ok(Json(state.engine.ledger.verify_balances().await?))
}
