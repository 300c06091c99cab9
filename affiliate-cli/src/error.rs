//! CLI Error Types
//!
//! Every failure maps to a distinct process exit code so scripts driving
//! settlement or payouts can branch on it.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    /// Bad `AFFILIATE_*` setting or flag combination
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Bad argument: {0}")]
    InvalidArgument(String),

    /// API unreachable
    #[error("Cannot reach {url}: {reason}")]
    Connection { url: String, reason: String },

    /// API answered with an error body
    #[error("{code} ({status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Wallet balances disagree with their transaction chains
    #[error("{0} wallet balance mismatch(es)")]
    BalanceMismatch(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// In-process engine failure under `serve`
    #[error(transparent)]
    Ledger(#[from] affiliate_ledger::LedgerError),

    #[error("Server stopped: {0}")]
    Server(String),
}

pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn connection(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Error body without a recognised `code`
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            code: "HTTP_ERROR".to_string(),
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::Server(message.into())
    }

    /// Process exit code
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 1,
            Self::InvalidArgument(_) => 2,
            Self::Connection { .. } => 3,
            Self::Api { .. } => 4,
            Self::Io(_) => 5,
            Self::Json(_) => 6,
            Self::Http(_) => 7,
            Self::Ledger(_) => 10,
            Self::NotFound(_) => 21,
            Self::BalanceMismatch(_) => 25,
            Self::Server(_) => 30,
        }
    }
}
