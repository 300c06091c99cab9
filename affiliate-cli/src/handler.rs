//! Command Handlers
//!
//! Handler functions for CLI commands.

use affiliate_api::{
    ApiConfig, AppState, AuthConfig, CommissionActionRequest, MetricsConfig, PayoutActionRequest,
};
use affiliate_ledger::{AffiliateEngine, LedgerConfig};
use chrono::Utc;
use tracing::{info, warn};

use crate::client::AffiliateClient;
use crate::commands::{
    commissions::CommissionCommands, payouts::PayoutCommands, Cli, Commands, OutputFormat,
};
use crate::error::{CliError, CliResult};
use crate::output;

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> CliResult<()> {
    if let Commands::Serve { host, port } = &cli.command {
        return handle_serve(host, *port).await;
    }

    let client = AffiliateClient::with_timeout(&cli.api_url, cli.timeout)?.with_api_key(cli.api_key.clone());
    let format = cli.format;
    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            output::print_health(&health, format);
        }
        Commands::Stats => {
            let stats = client.stats().await?;
            output::print_stats(&stats, format);
        }
        Commands::Settle => {
            let report = client.settle().await?;
            output::print_settlement(&report, format);
        }
        Commands::FraudRefresh => {
            let report = client.refresh_fraud().await?;
            output::print_fraud_refresh(&report, format);
        }
        Commands::Verify => {
            let mismatches = client.verify_ledger().await?;
            output::print_mismatches(&mismatches, format);
            if !mismatches.is_empty() {
                return Err(CliError::BalanceMismatch(mismatches.len()));
            }
        }
        Commands::Commissions(cmd) => handle_commissions(&client, cmd, format).await?,
        Commands::Payouts(cmd) => handle_payouts(&client, cmd, format).await?,
        Commands::Serve { .. } => {}
    }
    Ok(())
}

/// Start the API server over an in-process engine, persisted to
/// `AFFILIATE_DATABASE_URL` when set
async fn handle_serve(host: &str, port: u16) -> CliResult<()> {
    let ledger_config = LedgerConfig::from_env()?;
    let engine = AffiliateEngine::open(ledger_config).await?;
    engine.bootstrap(Utc::now()).await?;

    if engine.settlement.clone().spawn_scheduler().is_none() {
        info!("settlement scheduler disabled; trigger runs with `affiliate settle`");
    }

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = affiliate_api::init_metrics(&metrics_config) {
        warn!(error = %e, "continuing without Prometheus exporter");
    }

    let mut api_config = ApiConfig::from_env()
        .map_err(|e| CliError::config(e.to_string()))?
        .with_listen_addr(format!("{}:{}", host, port));
    api_config.metrics_enabled = metrics_config.enabled;

    let auth_config = AuthConfig::from_env();
    if !auth_config.enabled {
        warn!("API authentication is disabled");
    }

    info!(
        addr = %api_config.listen_addr,
        hold_days = engine.config().hold_days,
        "starting affiliate ledger"
    );

    let state = AppState::with_config(api_config, engine).with_auth(auth_config);
    affiliate_api::start_server(state)
        .await
        .map_err(|e| CliError::server(e.to_string()))
}

/// Handle commission commands
async fn handle_commissions(
    client: &AffiliateClient,
    cmd: CommissionCommands,
    format: OutputFormat,
) -> CliResult<()> {
    let action = cmd.action();
    match cmd {
        CommissionCommands::List {
            status,
            partner,
            page,
            page_size,
        } => {
            let list = client
                .list_commissions(status.as_deref(), partner.as_deref(), page, page_size)
                .await?;
            output::print_commission_list(&list, format);
        }
        CommissionCommands::Release { id, note } | CommissionCommands::Reverse { id, note } => {
            let action = action.ok_or_else(|| CliError::invalid_arg("missing commission action"))?;
            let request = CommissionActionRequest {
                commission_id: id,
                action: action.to_string(),
                note,
            };
            let commission = client.commission_action(&request).await?;
            output::print_commission(&commission, format);
        }
    }
    Ok(())
}

/// Handle payout commands
async fn handle_payouts(
    client: &AffiliateClient,
    cmd: PayoutCommands,
    format: OutputFormat,
) -> CliResult<()> {
    if let PayoutCommands::List { status, partner } = &cmd {
        let payouts = client.list_payouts(status.as_deref(), partner.as_deref()).await?;
        output::print_payouts(&payouts, format);
        return Ok(());
    }

    let request = payout_request(&cmd)?;
    let payout = client.payout_action(&request).await?;
    output::print_payout(&payout, format);
    Ok(())
}

fn payout_request(cmd: &PayoutCommands) -> CliResult<PayoutActionRequest> {
    let (payout_id, action, reference) = cmd
        .action()
        .ok_or_else(|| CliError::invalid_arg("listing is not a payout action"))?;
    if payout_id.trim().is_empty() {
        return Err(CliError::invalid_arg("payout id must not be empty"));
    }
    Ok(PayoutActionRequest {
        payout_id: payout_id.to_string(),
        action: action.to_string(),
        transaction_ref: reference.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_request_construction() {
        let cmd = PayoutCommands::Pay {
            id: "po_1".to_string(),
            transaction_ref: "tx_1".to_string(),
        };
        let request = payout_request(&cmd).unwrap();
        assert_eq!(request.payout_id, "po_1");
        assert_eq!(request.action, "pay");
        assert_eq!(request.transaction_ref.as_deref(), Some("tx_1"));
    }

    #[test]
    fn test_payout_request_rejects_list_and_blank_id() {
        let list = PayoutCommands::List { status: None, partner: None };
        assert!(matches!(payout_request(&list), Err(CliError::InvalidArgument(_))));

        let blank = PayoutCommands::Approve { id: " ".to_string() };
        assert!(payout_request(&blank).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_api_is_connection_error() {
        let cli = <Cli as clap::Parser>::try_parse_from([
            "affiliate",
            "--api-url",
            "http://127.0.0.1:1",
            "--timeout",
            "2",
            "health",
        ])
        .unwrap();
        let err = run(cli).await.unwrap_err();
        assert!(matches!(err, CliError::Connection { .. } | CliError::Http(_)));
    }
}
