//! Affiliate Ledger - Service Layer
//!
//! This crate coordinates the domain rules in `affiliate-core` with the
//! transactional store in `affiliate-store`.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                AffiliateEngine                 │
//! │  ┌──────────────────────────────────────────┐  │
//! │  │              LedgerService               │  │
//! │  │  place_order / release / reverse / pay   │  │
//! │  │  (only writer of Commission + Wallet)    │  │
//! │  └──────────────────────────────────────────┘  │
//! │     ▲            ▲            ▲          ▲     │
//! │ Settlement   Payouts     Attribution   Fraud   │
//! │   + Tiers                               Rules  │
//! └────────────────────────────────────────────────┘
//!           │                         │
//!           ▼                         ▼
//!     affiliate-core           affiliate-store
//! ```
//!
//! # Modules
//!
//! - [`ledger`] - Commission lifecycle and wallet posting
//! - [`settlement`] - Batch release/reversal job and scheduler
//! - [`payout`] - Payout request workflow
//! - [`fraud`] - Periodic risk recompute and auto-suspension
//! - [`tier`] - Tier promotion
//! - [`attribution`] - Referral visits and attribution lookup
//! - [`partner`] - Partner applications and status changes
//! - [`rules`] - Commission rule upserts
//! - [`config`] - Business constants
//!
//! # Usage Example
//!
//! ```ignore
//! use affiliate_ledger::{AffiliateEngine, LedgerConfig};
//! use affiliate_core::{AttributionRequest, OrderId, OrderSnapshot};
//! use chrono::Utc;
//!
//! async fn example() {
//!     let engine = AffiliateEngine::in_memory(LedgerConfig::default());
//!     engine.bootstrap(Utc::now()).await.unwrap();
//!
//!     let order = OrderSnapshot::new(OrderId::new("ord_1"), 1_000_000, Utc::now());
//!     let placed = engine
//!         .ledger
//!         .place_order(order, AttributionRequest::default().with_coupon("SAVE10"), Utc::now())
//!         .await
//!         .unwrap();
//!     let report = engine.settlement.run(Utc::now()).await.unwrap();
//! }
//! ```

pub mod attribution;
pub mod config;
pub mod engine;
pub mod error;
pub mod fraud;
pub mod ledger;
pub mod partner;
pub mod payout;
pub mod rules;
pub mod settlement;
pub mod tier;

pub use attribution::{resolve_attribution, AttributionService};
pub use config::LedgerConfig;
pub use engine::AffiliateEngine;
pub use error::{LedgerError, LedgerResult};
pub use fraud::{FraudRefreshReport, FraudService};
pub use ledger::{
    BalanceMismatch, CommissionPage, LedgerService, OrderUpdateOutcome, PlacedOrder, ReleaseMode,
    SettleOutcome,
};
pub use partner::{PartnerAction, PartnerService};
pub use payout::{PayoutAction, PayoutService};
pub use rules::RuleService;
pub use settlement::{SettlementJob, SettlementReport};
pub use tier::{TierPromotionService, TierUpgrade};

// Re-export the store seam used by callers
pub use affiliate_store::{
    AffiliateStore, CommissionFilter, MemoryStore, PayoutFilter, SqliteStore, StoreHealth, StoreRead,
    StoreTx,
};
