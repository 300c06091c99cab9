//! API Routes
//!
//! Route definitions for the affiliate API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers::*;
use crate::metrics::metrics_middleware;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let enable_cors = state.config.enable_cors;
    let auth_enabled = state.auth_config.enabled;
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let body_limit = state.config.max_body_size;

    let mut router = Router::new()
        // Health and status
        .route("/health", get(health_check))
        .route("/stats", get(get_stats))
        // Commission ledger
        .route("/commissions", get(list_commissions).patch(update_commission))
        .route("/commissions/release", post(run_settlement))
        .route("/commission-rules", get(list_rules).post(upsert_rule))
        .route("/ledger/verify", get(verify_ledger))
        // Fraud
        .route("/fraud/signals", get(list_fraud_signals).post(refresh_fraud_signals))
        // Partners
        .route(
            "/partners",
            get(list_partners).post(apply_partner).patch(update_partner),
        )
        .route("/coupons", get(list_coupons).post(register_coupon))
        // Partner self-service
        .route("/partner/wallet", get(get_wallet).post(request_payout))
        // Payouts
        .route("/payouts", get(list_payouts).patch(update_payout))
        // Collaborator hooks
        .route("/referrals/visit", post(record_visit))
        .route("/orders", post(create_order).patch(update_order))
        // Audit
        .route("/audit", get(list_audit))
        .with_state(state.clone());

    router = router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout));

    // Add metrics middleware
    router = router.layer(middleware::from_fn_with_state(state.clone(), metrics_middleware));

    // Add authentication middleware (if enabled)
    if auth_enabled {
        router = router.layer(middleware::from_fn_with_state(state, auth_middleware));
    }

    // Add CORS middleware
    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router = router.layer(TraceLayer::new_for_http());

    router
}

/// Create a router for the V1 API with /api/v1 prefix
pub fn create_v1_router(state: Arc<AppState>) -> Router {
    Router::new().nest("/api/v1", create_router(state))
}

/// Build the full application router
pub fn build_app(state: AppState) -> Router {
    build_app_shared(Arc::new(state))
}

/// Build the router around state the caller keeps a handle to
pub fn build_app_shared(state: Arc<AppState>) -> Router {
    let root_router = Router::new().route("/", get(|| async { "Affiliate Ledger API" }));

    let health_router = Router::new()
        .route("/healthz", get(health_check))
        .with_state(state.clone());

    root_router
        .merge(health_router)
        .merge(create_v1_router(state))
}
