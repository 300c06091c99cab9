//! Application State
//!
//! Shared state for the affiliate API service.

use affiliate_ledger::AffiliateEngine;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use crate::auth::AuthConfig;
use crate::error::ApiError;

/// Application configuration
///
/// # Environment
///
/// - `AFFILIATE_API_HOST` (default: 0.0.0.0)
/// - `AFFILIATE_API_PORT` (default: 3000)
/// - `AFFILIATE_API_CORS` (default: true)
/// - `AFFILIATE_API_TIMEOUT_SECS` (default: 30)
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Service name
    pub service_name: String,
    /// Service version
    pub version: String,
    /// Listen address
    pub listen_addr: String,
    /// Enable CORS
    pub enable_cors: bool,
    /// Request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Max request body size (bytes)
    pub max_body_size: usize,
    /// Whether a Prometheus recorder is installed
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            service_name: "affiliate-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: format!("0.0.0.0:{}", crate::DEFAULT_PORT),
            enable_cors: true,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024, // 1MB
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self, ApiError> {
        let mut config = Self::default();
        let host = std::env::var("AFFILIATE_API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = match std::env::var("AFFILIATE_API_PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::internal(format!("AFFILIATE_API_PORT is not a port: {}", raw)))?,
            Err(_) => crate::DEFAULT_PORT,
        };
        config.listen_addr = format!("{}:{}", host, port);

        if let Ok(v) = std::env::var("AFFILIATE_API_CORS") {
            config.enable_cors = v.to_lowercase() != "false" && v != "0";
        }
        if let Ok(v) = std::env::var("AFFILIATE_API_TIMEOUT_SECS") {
            config.request_timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| ApiError::internal(format!("AFFILIATE_API_TIMEOUT_SECS is not a number: {}", v)))?;
        }
        Ok(config)
    }

    /// Override the listen address
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }
}

/// Application state shared across handlers
pub struct AppState {
    /// Configuration
    pub config: ApiConfig,
    /// Authentication configuration
    pub auth_config: AuthConfig,
    /// Ledger services
    pub engine: AffiliateEngine,
    /// Service start time
    pub started_at: DateTime<Utc>,
    /// Request counter
    request_counter: RwLock<u64>,
    /// Requests in flight
    active_requests: AtomicU64,
}

impl AppState {
    /// Create new application state with default config
    pub fn new(engine: AffiliateEngine) -> Self {
        Self::with_config(ApiConfig::default(), engine)
    }

    /// Create with configuration
    pub fn with_config(config: ApiConfig, engine: AffiliateEngine) -> Self {
        Self {
            config,
            auth_config: AuthConfig::default(),
            engine,
            started_at: Utc::now(),
            request_counter: RwLock::new(0),
            active_requests: AtomicU64::new(0),
        }
    }

    /// Set authentication configuration
    pub fn with_auth(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    /// Get service uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        let now = Utc::now();
        (now - self.started_at).num_seconds().max(0) as u64
    }

    /// Increment request counter
    pub async fn increment_requests(&self) -> u64 {
        let mut counter = self.request_counter.write().await;
        *counter += 1;
        *counter
    }

    /// Get request count
    pub async fn request_count(&self) -> u64 {
        *self.request_counter.read().await
    }

    /// Mark a request in flight, returning the new count
    pub fn begin_request(&self) -> u64 {
        self.active_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Mark a request finished, returning the new count
    pub fn end_request(&self) -> u64 {
        self.active_requests.fetch_sub(1, Ordering::Relaxed).saturating_sub(1)
    }

    pub fn active_requests(&self) -> u64 {
        self.active_requests.load(Ordering::Relaxed)
    }
}

/// Health status of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Service is healthy
    Healthy,
    /// Service is degraded but functional
    Degraded,
    /// Service is unhealthy
    Unhealthy,
}

impl HealthStatus {
    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Component health check result
#[derive(Debug, Clone)]
pub struct ComponentHealthCheck {
    /// Component name
    pub name: String,
    /// Health status
    pub status: HealthStatus,
    /// Optional message
    pub message: Option<String>,
}

impl ComponentHealthCheck {
    /// Create a healthy result
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    /// Create a degraded result
    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    /// Create an unhealthy result
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affiliate_ledger::LedgerConfig;

    fn state() -> AppState {
        AppState::new(AffiliateEngine::in_memory(LedgerConfig::default()))
    }

    #[test]
    fn test_api_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.service_name, "affiliate-api");
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert!(config.enable_cors);
    }

    #[test]
    fn test_app_state_creation() {
        assert!(state().uptime_secs() < 2);
    }

    #[tokio::test]
    async fn test_request_counter() {
        let state = state();
        assert_eq!(state.request_count().await, 0);
        assert_eq!(state.increment_requests().await, 1);
        assert_eq!(state.increment_requests().await, 2);
        assert_eq!(state.request_count().await, 2);
    }

    #[test]
    fn test_active_requests() {
        let state = state();
        assert_eq!(state.begin_request(), 1);
        assert_eq!(state.begin_request(), 2);
        assert_eq!(state.end_request(), 1);
        assert_eq!(state.active_requests(), 1);
    }

    #[test]
    fn test_component_health_check() {
        let healthy = ComponentHealthCheck::healthy("store");
        assert_eq!(healthy.status, HealthStatus::Healthy);
        assert!(healthy.message.is_none());

        let degraded = ComponentHealthCheck::degraded("ledger", "balance mismatch");
        assert_eq!(degraded.status, HealthStatus::Degraded);
        assert_eq!(degraded.status.as_str(), "degraded");
    }
}
