//! Payout Commands

use clap::Subcommand;

/// Payout subcommands
#[derive(Subcommand, Debug)]
pub enum PayoutCommands {
    /// List payout requests
    List {
        /// Filter by status (REQUESTED, APPROVED, PAID, REJECTED)
        #[arg(long)]
        status: Option<String>,

        /// Filter by partner
        #[arg(long)]
        partner: Option<String>,
    },

    /// Approve a requested payout
    Approve {
        /// Payout ID
        id: String,
    },

    /// Mark an approved payout as paid
    Pay {
        /// Payout ID
        id: String,

        /// Bank transfer reference
        #[arg(short, long)]
        transaction_ref: String,
    },

    /// Reject a payout
    Reject {
        /// Payout ID
        id: String,

        /// Rejection reason
        #[arg(short, long)]
        reason: Option<String>,
    },
}

impl PayoutCommands {
    /// Payout id, action and reference for `PATCH /payouts`
    pub fn action(&self) -> Option<(&str, &'static str, Option<&str>)> {
        match self {
            PayoutCommands::List { .. } => None,
            PayoutCommands::Approve { id } => Some((id, "approve", None)),
            PayoutCommands::Pay { id, transaction_ref } => Some((id, "pay", Some(transaction_ref))),
            PayoutCommands::Reject { id, reason } => Some((id, "reject", reason.as_deref())),
        }
    }
}
