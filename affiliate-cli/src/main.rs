//! Affiliate CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   affiliate serve          - Start the API server and settlement scheduler
//!   affiliate settle         - Run one settlement pass
//!   affiliate fraud-refresh  - Recompute partner risk signals
//!   affiliate commissions    - List, release or reverse commissions
//!   affiliate payouts        - Review payout requests

use affiliate_cli::{handler, Cli};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // The server always logs; operator commands only with --verbose
    if cli.verbose || cli.command.is_serve() {
        init_logging();
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Initialize logging with tracing
fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "affiliate_cli=info,affiliate_api=info,affiliate_ledger=info,tower_http=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
