//! Prometheus Metrics
//!
//! HTTP metrics for the affiliate API. Ledger counters
//! (`affiliate_commissions_*`, `affiliate_settlement_*`, ...) are emitted by
//! `affiliate-ledger` through the same recorder.
//!
//! # Metrics
//!
//! ## Counters
//! - `affiliate_http_requests_total` - HTTP requests by method, path, status
//! - `affiliate_errors_total` - Error responses by code
//!
//! ## Histograms
//! - `affiliate_http_request_duration_seconds` - HTTP request duration
//!
//! ## Gauges
//! - `affiliate_active_requests` - Requests in flight
//! - `affiliate_uptime_seconds` - Service uptime
//!
//! # Configuration
//!
//! - `AFFILIATE_METRICS_ENABLED`: Enable metrics (default: true)
//! - `AFFILIATE_METRICS_PORT`: Prometheus scrape port (default: 9090)

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled
    pub enabled: bool,
    /// Port for the scrape endpoint
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

impl MetricsConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let enabled = std::env::var("AFFILIATE_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let port = std::env::var("AFFILIATE_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090);

        Self { enabled, port }
    }
}

/// Install the Prometheus recorder and its scrape listener.
///
/// Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), String> {
    if !config.enabled {
        tracing::info!("Metrics disabled");
        return Ok(());
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install metrics recorder: {}", e))?;

    tracing::info!(port = config.port, "Metrics initialized");
    Ok(())
}

/// Record a request metric
pub fn record_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", normalize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("affiliate_http_requests_total", &labels).increment(1);
    histogram!("affiliate_http_request_duration_seconds", &labels).record(duration_secs);
}

/// Record an error response
pub fn record_error(code: &str) {
    counter!("affiliate_errors_total", "code" => code.to_string()).increment(1);
}

/// Update active requests gauge
pub fn set_active_requests(count: u64) {
    gauge!("affiliate_active_requests").set(count as f64);
}

/// Update uptime gauge
pub fn set_uptime(seconds: u64) {
    gauge!("affiliate_uptime_seconds").set(seconds as f64);
}

/// Normalize path for metric labels (remove dynamic segments)
fn normalize_path(path: &str) -> String {
    let path = regex_replace_ids(path);
    if path.len() > 50 {
        path[..50].to_string()
    } else {
        path
    }
}

/// Replace id-looking segments with `:id`
fn regex_replace_ids(path: &str) -> String {
    path.split('/')
        .map(|part| if looks_like_id(part) { ":id" } else { part })
        .collect::<Vec<_>>()
        .join("/")
}

fn looks_like_id(part: &str) -> bool {
    // Entity ids are `<prefix>_<uuid>`
    let body = match part.split_once('_') {
        Some((prefix, rest)) if prefix.len() <= 4 && prefix.chars().all(|c| c.is_ascii_lowercase()) => rest,
        _ => part,
    };
    body.len() >= 8
        && (body.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
            || body.chars().all(|c| c.is_ascii_digit()))
}

/// Metrics middleware for tracking HTTP requests
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = crate::auth::request_path(&request);

    state.increment_requests().await;
    set_active_requests(state.begin_request());
    set_uptime(state.uptime_secs());

    let response = next.run(request).await;

    set_active_requests(state.end_request());
    let status = response.status().as_u16();
    record_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}

/// Request counters for `/stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_requests: u64,
    pub active_requests: u64,
    pub uptime_seconds: u64,
    pub metrics_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/orders/12345678"), "/api/v1/orders/:id");
        assert_eq!(
            normalize_path("/api/v1/commissions/cm_550e8400-e29b-41d4-a716-446655440000"),
            "/api/v1/commissions/:id"
        );
    }

    #[test]
    fn test_short_segments_are_kept() {
        assert_eq!(regex_replace_ids("/api/v1/partner/wallet"), "/api/v1/partner/wallet");
        assert_eq!(regex_replace_ids("/api/v1/commission-rules"), "/api/v1/commission-rules");
    }
}
