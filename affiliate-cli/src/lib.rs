//! Affiliate CLI - Command Line Interface
//!
//! Runs the affiliate ledger API in-process, or operates a running one over
//! HTTP.
//!
//! # Usage
//!
//! ```text
//! affiliate [OPTIONS] <COMMAND>
//!
//! Commands:
//!   serve          Start the API server with the settlement scheduler
//!   settle         Run one settlement pass on the server
//!   fraud-refresh  Recompute risk signals for every active partner
//!   verify         Check wallet balances against their transaction chains
//!   health         Check health of the API
//!   stats          Show request statistics
//!   commissions    Commission queries and overrides
//!   payouts        Payout review
//!
//! Options:
//!   -a, --api-url <URL>    API endpoint URL [default: http://localhost:3000]
//!   -k, --api-key <KEY>    Admin API key
//!   -f, --format <FORMAT>  Output format (json, table, plain) [default: table]
//!   -v, --verbose          Enable verbose output
//! ```
//!
//! # Examples
//!
//! ## Serve with a five minute settlement cadence
//! ```text
//! AFFILIATE_SETTLEMENT_INTERVAL_SECS=300 affiliate serve --port 3000
//! ```
//!
//! ## Pending commissions for one partner
//! ```text
//! affiliate commissions list --status pending --partner ptn_42
//! ```
//!
//! ## Pay an approved payout
//! ```text
//! affiliate payouts pay po_9f2c --transaction-ref BANK-2024-118
//! ```

pub mod client;
pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use client::AffiliateClient;
pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// Affiliate CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
