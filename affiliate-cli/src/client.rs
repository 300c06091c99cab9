//! API Client
//!
//! HTTP client for operating a running affiliate API.

use crate::error::{CliError, CliResult};
use affiliate_api::{
    CommissionActionRequest, CommissionDto, CommissionListResponse, ErrorResponse, HealthResponse,
    MetricsSummary, OkResponse, PayoutActionRequest, PayoutDto,
};
use affiliate_ledger::{BalanceMismatch, FraudRefreshReport, SettlementReport};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Affiliate API client
pub struct AffiliateClient {
    /// HTTP client
    client: Client,
    /// Base URL, without trailing slash
    base_url: String,
    /// Admin key sent as `X-API-Key`
    api_key: Option<String>,
}

impl AffiliateClient {
    /// Create a new client
    pub fn new(base_url: impl Into<String>) -> CliResult<Self> {
        Self::with_timeout(base_url, 30)
    }

    /// Create with custom timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout_secs: u64) -> CliResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CliError::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    /// Attach an admin API key
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("X-API-Key", key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> CliResult<T> {
        let response = self.authorize(builder).send().await.map_err(|e| {
            if e.is_connect() {
                CliError::connection(&self.base_url, e)
            } else {
                CliError::Http(e)
            }
        })?;
        decode(response).await
    }

    /// Get health status
    pub async fn health(&self) -> CliResult<HealthResponse> {
        self.send(self.client.get(self.url("/health"))).await
    }

    /// Get request statistics
    pub async fn stats(&self) -> CliResult<MetricsSummary> {
        self.send(self.client.get(self.url("/stats"))).await
    }

    /// Run one settlement pass
    pub async fn settle(&self) -> CliResult<SettlementReport> {
        self.send(self.client.post(self.url("/commissions/release"))).await
    }

    /// Recompute fraud signals
    pub async fn refresh_fraud(&self) -> CliResult<FraudRefreshReport> {
        self.send(self.client.post(self.url("/fraud/signals"))).await
    }

    /// Wallet chain check
    pub async fn verify_ledger(&self) -> CliResult<Vec<BalanceMismatch>> {
        self.send(self.client.get(self.url("/ledger/verify"))).await
    }

    /// List commissions
    pub async fn list_commissions(
        &self,
        status: Option<&str>,
        partner_id: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> CliResult<CommissionListResponse> {
        let mut query: Vec<(&str, String)> = vec![
            ("page", page.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        if let Some(partner_id) = partner_id {
            query.push(("partnerId", partner_id.to_string()));
        }
        self.send(self.client.get(self.url("/commissions")).query(&query)).await
    }

    /// Manual release or reverse
    pub async fn commission_action(&self, request: &CommissionActionRequest) -> CliResult<CommissionDto> {
        let response: OkResponse<CommissionDto> = self
            .send(self.client.patch(self.url("/commissions")).json(request))
            .await?;
        Ok(response.data)
    }

    /// List payouts
    pub async fn list_payouts(&self, status: Option<&str>, partner_id: Option<&str>) -> CliResult<Vec<PayoutDto>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(status) = status {
            query.push(("status", status));
        }
        if let Some(partner_id) = partner_id {
            query.push(("partnerId", partner_id));
        }
        self.send(self.client.get(self.url("/payouts")).query(&query)).await
    }

    /// Approve, pay or reject a payout
    pub async fn payout_action(&self, request: &PayoutActionRequest) -> CliResult<PayoutDto> {
        let response: OkResponse<PayoutDto> = self
            .send(self.client.patch(self.url("/payouts")).json(request))
            .await?;
        Ok(response.data)
    }
}

/// Decode a success body, or turn the API error body into a [`CliError`]
async fn decode<T: DeserializeOwned>(response: Response) -> CliResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let text = response.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &text))
}

fn api_error(status: u16, body: &str) -> CliError {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) if err.code == "NOT_FOUND" => CliError::NotFound(err.message),
        Ok(err) => CliError::Api {
            status,
            code: err.code,
            message: err.message,
        },
        Err(_) => CliError::api(status, body.to_string()),
    }
}
