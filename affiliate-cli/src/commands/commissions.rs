//! Commission Commands

use clap::Subcommand;

/// Commission subcommands
#[derive(Subcommand, Debug)]
pub enum CommissionCommands {
    /// List commissions
    List {
        /// Filter by status (PENDING, AVAILABLE, REVERSED, PAID)
        #[arg(long)]
        status: Option<String>,

        /// Filter by partner
        #[arg(long)]
        partner: Option<String>,

        /// Page number (1-indexed)
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size
        #[arg(short = 's', long, default_value = "20")]
        page_size: u32,
    },

    /// Release a pending commission before its hold ends
    Release {
        /// Commission ID
        id: String,

        /// Reason recorded in the audit log
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Reverse a commission
    Reverse {
        /// Commission ID
        id: String,

        /// Reason recorded in the audit log
        #[arg(short, long)]
        note: Option<String>,
    },
}

impl CommissionCommands {
    /// Action name sent to `PATCH /commissions`
    pub fn action(&self) -> Option<&'static str> {
        match self {
            CommissionCommands::List { .. } => None,
            CommissionCommands::Release { .. } => Some("release"),
            CommissionCommands::Reverse { .. } => Some("reverse"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn test_parse_list_filters() {
        let cli = Cli::try_parse_from([
            "affiliate", "commissions", "list", "--status", "pending", "--partner", "ptn_1", "-p", "2",
        ])
        .unwrap();
        match cli.command {
            Commands::Commissions(CommissionCommands::List { status, partner, page, page_size }) => {
                assert_eq!(status.as_deref(), Some("pending"));
                assert_eq!(partner.as_deref(), Some("ptn_1"));
                assert_eq!(page, 2);
                assert_eq!(page_size, 20);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_action_names() {
        let release = CommissionCommands::Release { id: "cm_1".into(), note: None };
        let reverse = CommissionCommands::Reverse { id: "cm_1".into(), note: Some("fraud".into()) };
        assert_eq!(release.action(), Some("release"));
        assert_eq!(reverse.action(), Some("reverse"));
    }
}
