//! Output Formatting
//!
//! Utilities for formatting CLI output in various formats.

use affiliate_api::{CommissionDto, CommissionListResponse, HealthResponse, MetricsSummary, PayoutDto};
use affiliate_ledger::{BalanceMismatch, FraudRefreshReport, SettlementReport};
use serde::Serialize;

use crate::commands::OutputFormat;

/// Print as JSON
fn print_json<T: Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error formatting JSON: {}", e),
    }
}

/// Print health response
pub fn print_health(health: &HealthResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(health),
        OutputFormat::Plain => println!("{}", health.status),
        OutputFormat::Table => {
            println!("Affiliate API Health");
            println!("====================");
            print_row("Status:", &health.status);
            print_row("Version:", &health.version);
            print_row("Uptime:", &format!("{}s", health.uptime_secs));
            println!();
            println!("Components:");
            for component in &health.components {
                print!("  - {}: {}", component.name, component.status);
                if let Some(msg) = &component.message {
                    print!(" ({})", msg);
                }
                println!();
            }
        }
    }
}

/// Print request statistics
pub fn print_stats(stats: &MetricsSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(stats),
        OutputFormat::Table | OutputFormat::Plain => {
            print_row("Total Requests:", &stats.total_requests.to_string());
            print_row("Active Requests:", &stats.active_requests.to_string());
            print_row("Uptime:", &format!("{}s", stats.uptime_seconds));
            print_row("Metrics:", if stats.metrics_enabled { "enabled" } else { "disabled" });
        }
    }
}

/// Print a settlement report
pub fn print_settlement(report: &SettlementReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Plain => println!(
            "processed={} released={} reversed={} partially_reversed={} held={} failed={}",
            report.processed_total,
            report.released,
            report.reversed,
            report.partially_reversed,
            report.held,
            report.failed
        ),
        OutputFormat::Table => {
            println!("Settlement Run");
            println!("==============");
            print_row("Processed:", &report.processed_total.to_string());
            print_row("Released:", &report.released.to_string());
            print_row("Reversed:", &report.reversed.to_string());
            print_row("Partially Reversed:", &report.partially_reversed.to_string());
            print_row("Held for Review:", &report.held.to_string());
            print_row("Failed:", &report.failed.to_string());
            if !report.tier_upgrades.is_empty() {
                println!();
                println!("Tier Upgrades:");
                for upgrade in &report.tier_upgrades {
                    println!("  - {:?}", upgrade);
                }
            }
        }
    }
}

/// Print a fraud refresh report
pub fn print_fraud_refresh(report: &FraudRefreshReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table | OutputFormat::Plain => {
            print_row("Evaluated:", &report.evaluated.to_string());
            print_row("Flagged:", &report.flagged.to_string());
            print_row("Failed:", &report.failed.to_string());
            let suspended: Vec<&str> = report.suspended.iter().map(|p| p.as_str()).collect();
            print_row("Suspended:", &if suspended.is_empty() { "-".to_string() } else { suspended.join(", ") });
        }
    }
}

/// Print wallet chain mismatches
pub fn print_mismatches(mismatches: &[BalanceMismatch], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&mismatches),
        OutputFormat::Table | OutputFormat::Plain => {
            if mismatches.is_empty() {
                println!("All wallet balances match their transaction chains.");
                return;
            }
            println!("{:<24} {:>8} {:>14} {:>14}", "PARTNER", "SEQ", "EXPECTED", "STORED");
            print_separator();
            for m in mismatches {
                println!(
                    "{:<24} {:>8} {:>14} {:>14}",
                    m.partner_id.as_str(), m.seq, m.expected_balance, m.stored_balance
                );
            }
        }
    }
}

/// Print a page of commissions
pub fn print_commission_list(list: &CommissionListResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(list),
        OutputFormat::Plain => {
            for c in &list.items {
                println!("{}\t{}\t{}\t{}", c.commission_id, c.partner_id, c.status, c.amount);
            }
        }
        OutputFormat::Table => {
            println!(
                "{:<38} {:<20} {:<10} {:>12}",
                "COMMISSION", "PARTNER", "STATUS", "AMOUNT"
            );
            print_separator();
            for c in &list.items {
                println!(
                    "{:<38} {:<20} {:<10} {:>12}",
                    c.commission_id,
                    c.partner_id,
                    c.status.to_string(),
                    c.amount
                );
            }
            print_separator();
            println!(
                "Page {} ({} of {} total){}",
                list.page,
                list.items.len(),
                list.total,
                if list.has_more { ", more available" } else { "" }
            );
            let s = &list.summary;
            println!(
                "Pending {} ({}) | Available {} ({}) | Reversed {} ({}) | Paid {} ({})",
                s.pending_count,
                s.pending_amount,
                s.available_count,
                s.available_amount,
                s.reversed_count,
                s.reversed_amount,
                s.paid_count,
                s.paid_amount
            );
        }
    }
}

/// Print one commission
pub fn print_commission(commission: &CommissionDto, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(commission),
        OutputFormat::Plain => println!("{}\t{}", commission.commission_id, commission.status),
        OutputFormat::Table => {
            print_row("Commission:", &commission.commission_id);
            print_row("Partner:", &commission.partner_id);
            print_row("Order:", &commission.order_id);
            print_row("Status:", &commission.status.to_string());
            print_row("Amount:", &commission.amount.to_string());
            print_row("Reversed:", &commission.reversed_amount.to_string());
            if let Some(note) = &commission.note {
                print_row("Note:", note);
            }
        }
    }
}

/// Print payout requests
pub fn print_payouts(payouts: &[PayoutDto], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&payouts),
        OutputFormat::Plain => {
            for p in payouts {
                println!("{}\t{}\t{}\t{}", p.payout_id, p.partner_id, p.status, p.amount);
            }
        }
        OutputFormat::Table => {
            println!("{:<38} {:<20} {:<10} {:>12}", "PAYOUT", "PARTNER", "STATUS", "AMOUNT");
            print_separator();
            for p in payouts {
                println!(
                    "{:<38} {:<20} {:<10} {:>12}",
                    p.payout_id,
                    p.partner_id,
                    p.status.to_string(),
                    p.amount
                );
            }
        }
    }
}

/// Print one payout
pub fn print_payout(payout: &PayoutDto, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(payout),
        OutputFormat::Plain => println!("{}\t{}", payout.payout_id, payout.status),
        OutputFormat::Table => {
            print_row("Payout:", &payout.payout_id);
            print_row("Partner:", &payout.partner_id);
            print_row("Status:", &payout.status.to_string());
            print_row("Amount:", &payout.amount.to_string());
            if let Some(tx) = &payout.transaction_ref {
                print_row("Transaction:", tx);
            }
        }
    }
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{}", message);
}

/// Print a table row
pub fn print_row(key: &str, value: &str) {
    println!("{:<20} {}", key, value);
}

/// Print a separator line
pub fn print_separator() {
    println!("{}", "-".repeat(84));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_row_format() {
        print_row("Key", "Value");
    }

    #[test]
    fn test_empty_mismatches_table() {
        print_mismatches(&[], OutputFormat::Table);
        print_payouts(&[], OutputFormat::Plain);
    }
}
