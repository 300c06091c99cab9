//! CLI Commands Module
//!
//! Command definitions for the affiliate CLI.

pub mod commissions;
pub mod payouts;

use clap::{Parser, Subcommand};

/// Affiliate ledger CLI
#[derive(Parser, Debug)]
#[command(name = "affiliate")]
#[command(version)]
#[command(about = "Affiliate attribution and commission ledger")]
#[command(long_about = "Run the affiliate ledger API server, or operate a running one.\n\n\
    Operator commands talk to the HTTP API; `serve` starts it in-process.")]
pub struct Cli {
    /// API endpoint URL
    #[arg(short, long, env = "AFFILIATE_API_URL", default_value = "http://localhost:3000")]
    pub api_url: String,

    /// Admin API key sent as X-API-Key
    #[arg(short = 'k', long, env = "AFFILIATE_API_KEY")]
    pub api_key: Option<String>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,

    /// Output format (json, table, plain)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
    /// Plain text
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the API server with the settlement scheduler
    Serve {
        /// Host to bind to (env: AFFILIATE_API_HOST)
        #[arg(short = 'H', long, env = "AFFILIATE_API_HOST", default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on (env: AFFILIATE_API_PORT)
        #[arg(short, long, env = "AFFILIATE_API_PORT", default_value = "3000")]
        port: u16,
    },

    /// Run one settlement pass on the server
    Settle,

    /// Recompute risk signals for every active partner
    FraudRefresh,

    /// Check wallet balances against their transaction chains
    Verify,

    /// Check health of the API
    Health,

    /// Show request statistics
    Stats,

    /// Commission queries and overrides
    #[command(subcommand)]
    Commissions(commissions::CommissionCommands),

    /// Payout review
    #[command(subcommand)]
    Payouts(payouts::PayoutCommands),
}

impl Commands {
    /// Whether the command runs the server in this process
    pub fn is_serve(&self) -> bool {
        matches!(self, Commands::Serve { .. })
    }
}
