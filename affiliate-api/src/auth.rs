//! Authentication and Authorization
//!
//! Admin and collaborator routes take an API key or bearer token. Partner
//! routes under `/api/v1/partner/` are reached through the storefront
//! gateway, which forwards the authenticated partner in `X-Partner-Id`.
//!
//! # Authentication Methods
//!
//! ## API Key (Header)
//! ```text
//! X-API-Key: your-api-key-here
//! ```
//!
//! ## Bearer Token
//! ```text
//! Authorization: Bearer your-token-here
//! ```
//!
//! ## Partner Identity
//! ```text
//! X-Partner-Id: ptn_123
//! ```
//!
//! # Configuration
//!
//! - `AFFILIATE_AUTH_ENABLED`: Enable/disable authentication (default: false)
//! - `AFFILIATE_ADMIN_API_KEYS`: Comma separated admin API keys
//! - `AFFILIATE_BEARER_TOKENS`: Comma separated bearer tokens

use affiliate_core::{Actor, PartnerId};
use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the gateway-authenticated partner
pub const PARTNER_HEADER: &str = "X-Partner-Id";

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Whether authentication is enabled
    pub enabled: bool,
    /// Admin API keys
    pub api_keys: Vec<String>,
    /// Bearer tokens (optional)
    pub bearer_tokens: Vec<String>,
    /// Paths that don't require authentication
    pub public_paths: Vec<String>,
    /// Paths authenticated by partner identity instead of admin credentials
    pub partner_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_keys: Vec::new(),
            bearer_tokens: Vec::new(),
            public_paths: vec![
                "/".to_string(),
                "/health".to_string(),
                "/healthz".to_string(),
                "/api/v1/health".to_string(),
                "/api/v1/referrals/visit".to_string(),
            ],
            partner_paths: vec!["/api/v1/partner".to_string()],
        }
    }
}

impl AuthConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let enabled = std::env::var("AFFILIATE_AUTH_ENABLED")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(false);

        let api_keys = split_env("AFFILIATE_ADMIN_API_KEYS");
        let bearer_tokens = split_env("AFFILIATE_BEARER_TOKENS");

        Self {
            enabled,
            api_keys,
            bearer_tokens,
            ..Default::default()
        }
    }

    /// Check if a path is public (doesn't require authentication)
    pub fn is_public_path(&self, path: &str) -> bool {
        // "/" only matches itself
        self.public_paths
            .iter()
            .any(|p| path == p || (p != "/" && path.starts_with(&format!("{}/", p))))
    }

    /// Check if a path is a partner self-service path
    pub fn is_partner_path(&self, path: &str) -> bool {
        self.partner_paths
            .iter()
            .any(|p| path == p || path.starts_with(&format!("{}/", p)))
    }

    /// Validate an API key
    pub fn validate_api_key(&self, key: &str) -> bool {
        !key.is_empty() && self.api_keys.iter().any(|k| k == key)
    }

    /// Validate a bearer token
    pub fn validate_bearer_token(&self, token: &str) -> bool {
        !token.is_empty() && self.bearer_tokens.iter().any(|t| t == token)
    }
}

fn split_env(key: &str) -> Vec<String> {
    std::env::var(key)
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Authentication error response
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
    pub message: String,
}

impl AuthErrorResponse {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            error: "Unauthorized".to_string(),
            error_code: "AUTH_UNAUTHORIZED".to_string(),
            message: message.to_string(),
        }
    }

    pub fn forbidden(message: &str) -> Self {
        Self {
            error: "Forbidden".to_string(),
            error_code: "AUTH_FORBIDDEN".to_string(),
            message: message.to_string(),
        }
    }
}

fn reject(status: StatusCode, body: AuthErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

/// Authentication middleware
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_config = &state.auth_config;

    if !auth_config.enabled {
        request.extensions_mut().insert(AuthInfo::anonymous());
        return next.run(request).await;
    }

    let path = request_path(&request);
    if auth_config.is_public_path(&path) {
        request.extensions_mut().insert(AuthInfo::anonymous());
        return next.run(request).await;
    }

    if auth_config.is_partner_path(&path) {
        let partner = request
            .headers()
            .get(PARTNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        return match partner {
            Some(partner_id) => {
                request.extensions_mut().insert(AuthInfo {
                    method: AuthMethod::Partner,
                    credential_hint: partner_id,
                });
                next.run(request).await
            }
            None => reject(
                StatusCode::UNAUTHORIZED,
                AuthErrorResponse::unauthorized("Partner identity required"),
            ),
        };
    }

    // Try API Key authentication (X-API-Key header)
    if let Some(api_key) = request.headers().get("X-API-Key") {
        let key = api_key.to_str().unwrap_or_default().to_string();
        if auth_config.validate_api_key(&key) {
            request.extensions_mut().insert(AuthInfo {
                method: AuthMethod::ApiKey,
                credential_hint: hint(&key),
            });
            return next.run(request).await;
        }
        return reject(
            StatusCode::UNAUTHORIZED,
            AuthErrorResponse::unauthorized("Invalid API key"),
        );
    }

    // Try Bearer Token authentication
    let bearer = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    if let Some(token) = bearer {
        if auth_config.validate_bearer_token(&token) {
            request.extensions_mut().insert(AuthInfo {
                method: AuthMethod::BearerToken,
                credential_hint: hint(&token),
            });
            return next.run(request).await;
        }
        return reject(
            StatusCode::UNAUTHORIZED,
            AuthErrorResponse::unauthorized("Invalid bearer token"),
        );
    }

    // A partner header alone never reaches admin routes
    if request.headers().contains_key(PARTNER_HEADER) {
        return reject(
            StatusCode::FORBIDDEN,
            AuthErrorResponse::forbidden("Admin credentials required"),
        );
    }

    reject(
        StatusCode::UNAUTHORIZED,
        AuthErrorResponse::unauthorized(
            "Authentication required. Provide X-API-Key header or Authorization: Bearer <token>",
        ),
    )
}

/// Path before any `nest` prefix stripping
pub(crate) fn request_path(request: &Request) -> String {
    request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string())
}

/// First characters of a credential, for audit logging
fn hint(credential: &str) -> String {
    let prefix: String = credential.chars().take(4).collect();
    format!("{}***", prefix)
}

/// Extracted authentication info (for use in handlers)
#[derive(Debug, Clone)]
pub struct AuthInfo {
    /// Authentication method used
    pub method: AuthMethod,
    /// Masked key or token, or the partner id
    pub credential_hint: String,
}

impl AuthInfo {
    pub fn anonymous() -> Self {
        Self {
            method: AuthMethod::None,
            credential_hint: "anonymous".to_string(),
        }
    }

    /// Audit actor for admin writes
    pub fn actor(&self) -> Actor {
        match self.method {
            AuthMethod::Partner => Actor::Partner(PartnerId::new(&self.credential_hint)),
            _ => Actor::Admin(self.credential_hint.clone()),
        }
    }

    /// Audit actor for order hooks called by checkout and shipping
    pub fn collaborator(&self) -> Actor {
        Actor::Collaborator(self.credential_hint.clone())
    }
}

/// Authentication method
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// API Key authentication
    ApiKey,
    /// Bearer token authentication
    BearerToken,
    /// Gateway-forwarded partner identity
    Partner,
    /// No authentication (public endpoint or auth disabled)
    None,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthInfo {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthInfo>()
            .cloned()
            .unwrap_or_else(AuthInfo::anonymous))
    }
}

/// Partner calling a self-service route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerIdentity(pub PartnerId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for PartnerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(PARTNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| PartnerIdentity(PartnerId::new(v)))
            .ok_or_else(|| ApiError::unauthorized("Partner identity required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_config_default() {
        let config = AuthConfig::default();
        assert!(!config.enabled);
        assert!(config.api_keys.is_empty());
        assert!(config.is_public_path("/health"));
        assert!(config.is_public_path("/healthz"));
    }

    #[test]
    fn test_auth_config_public_paths() {
        let config = AuthConfig::default();
        assert!(config.is_public_path("/"));
        assert!(config.is_public_path("/api/v1/health"));
        assert!(config.is_public_path("/api/v1/referrals/visit"));
        assert!(!config.is_public_path("/api/v1/commissions"));
        assert!(!config.is_public_path("/api/v1/payouts"));
    }

    #[test]
    fn test_partner_paths() {
        let config = AuthConfig::default();
        assert!(config.is_partner_path("/api/v1/partner/wallet"));
        assert!(!config.is_partner_path("/api/v1/partners"));
    }

    #[test]
    fn test_api_key_validation() {
        let config = AuthConfig {
            enabled: true,
            api_keys: vec!["key1".to_string(), "key2".to_string()],
            ..Default::default()
        };

        assert!(config.validate_api_key("key1"));
        assert!(config.validate_api_key("key2"));
        assert!(!config.validate_api_key("key3"));
        assert!(!config.validate_api_key(""));
    }

    #[test]
    fn test_actor_from_auth_info() {
        let info = AuthInfo {
            method: AuthMethod::ApiKey,
            credential_hint: hint("secret-key"),
        };
        assert_eq!(info.actor(), Actor::Admin("secr***".to_string()));

        let info = AuthInfo {
            method: AuthMethod::Partner,
            credential_hint: "ptn_1".to_string(),
        };
        assert_eq!(info.actor(), Actor::Partner(PartnerId::new("ptn_1")));
    }

    #[test]
    fn test_auth_error_response() {
        let err = AuthErrorResponse::unauthorized("Test message");
        assert_eq!(err.error, "Unauthorized");
        assert_eq!(err.error_code, "AUTH_UNAUTHORIZED");

        let err = AuthErrorResponse::forbidden("Forbidden message");
        assert_eq!(err.error_code, "AUTH_FORBIDDEN");
    }
}
