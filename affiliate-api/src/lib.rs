//! Affiliate API - HTTP Interface Layer
//!
//! This crate provides the HTTP interface for the affiliate attribution and
//! commission ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Affiliate API                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │              HTTP Routes               │  │
//! │  │  /commissions, /payouts, /partners     │  │
//! │  │  /orders, /referrals/visit, /fraud     │  │
//! │  └────────────────────────────────────────┘  │
//! │          │              │            │       │
//! │          ▼              ▼            ▼       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌────────┐  │
//! │  │  Handlers   │ │    DTOs     │ │ State  │  │
//! │  └─────────────┘ └─────────────┘ └────────┘  │
//! └──────────────────────────────────────────────┘
//!                         │
//!                         ▼
//!          affiliate-ledger (AffiliateEngine)
//! ```
//!
//! # Endpoints
//!
//! All routes live under `/api/v1`.
//!
//! ## Health & Status
//! - `GET /health` - Component health
//! - `GET /stats` - Request counters
//!
//! ## Commissions
//! - `GET /commissions?status&partnerId&page&pageSize` - Paginated list with status summary
//! - `PATCH /commissions` - Manual release or reverse
//! - `POST /commissions/release` - Run the settlement job once
//! - `GET/POST /commission-rules` - List / upsert rules
//! - `GET /ledger/verify` - Wallet balance chain check
//!
//! ## Fraud
//! - `GET /fraud/signals` - Flagged partners
//! - `POST /fraud/signals` - Recompute all ACTIVE partners
//!
//! ## Partners
//! - `GET/POST/PATCH /partners` - List, apply, approve/suspend/reactivate
//! - `GET/POST /coupons` - List / register coupons
//! - `GET/POST /partner/wallet` - Wallet view and payout request (`X-Partner-Id`)
//!
//! ## Payouts
//! - `GET /payouts?status&partnerId` / `PATCH /payouts` - Approve, pay, reject
//!
//! ## Collaborator Hooks
//! - `POST /referrals/visit` - Referral-link visit (public)
//! - `POST /orders` / `PATCH /orders` - Order placement and updates
//!
//! ## Audit
//! - `GET /audit?entityId` - Audit events
//!
//! # Usage Example
//!
//! ```ignore
//! use affiliate_api::{ApiConfig, AppState, start_server};
//! use affiliate_ledger::{AffiliateEngine, LedgerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = AffiliateEngine::in_memory(LedgerConfig::default());
//!     engine.bootstrap(chrono::Utc::now()).await.unwrap();
//!
//!     let state = AppState::with_config(ApiConfig::default(), engine);
//!     start_server(state).await.unwrap();
//! }
//! ```

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

// Re-export main types
pub use auth::{AuthConfig, AuthErrorResponse, AuthInfo, AuthMethod, PartnerIdentity, PARTNER_HEADER};
pub use dto::*;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use metrics::{init_metrics, MetricsConfig, MetricsSummary};
pub use routes::{build_app, build_app_shared, create_router, create_v1_router};
pub use state::{ApiConfig, AppState, ComponentHealthCheck, HealthStatus};

/// Affiliate API version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default API port
pub const DEFAULT_PORT: u16 = 3000;

/// Start the API server
pub async fn start_server(state: AppState) -> Result<(), std::io::Error> {
    let addr = state.config.listen_addr.clone();
    let app = build_app(state);

    tracing::info!("Starting affiliate API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}
