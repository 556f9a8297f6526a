use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::config::AppConfig;
use crate::core::models::credit::CreditInfo;

pub const DEFAULT_CREDITS_URL: &str = "https://openrouter.ai/api/v1/credits";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("No API key configured")]
    NoCredential,
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Unexpected response: {0}")]
    Parse(String),
}

#[derive(Deserialize)]
struct CreditsResponse {
    data: serde_json::Map<String, serde_json::Value>,
}

/// Read a numeric field; missing, null or non-numeric counts as zero.
fn lenient_f64(data: &serde_json::Map<String, serde_json::Value>, key: &str) -> f64 {
    data.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0)
}

fn parse_credits(body: &str) -> Result<CreditInfo, FetchError> {
    let response: CreditsResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(CreditInfo::from_totals(
        lenient_f64(&response.data, "total_usage"),
        lenient_f64(&response.data, "total_credits"),
        Utc::now(),
    ))
}

/// Validate that an endpoint URL is safe to send a bearer token to.
///
/// Requires HTTPS. Plain HTTP is accepted only for loopback hosts.
pub fn validate_endpoint(url: &str) -> anyhow::Result<Url> {
    let parsed = Url::parse(url).with_context(|| format!("invalid URL: {}", url))?;
    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if is_loopback(&parsed) => Ok(parsed),
        _ => anyhow::bail!("endpoint must use HTTPS, got: {}", url),
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

/// Fetches the credits endpoint. Holds no state besides the HTTP client.
#[derive(Debug, Clone)]
pub struct CreditFetcher {
    client: reqwest::Client,
    endpoint: Url,
}

impl CreditFetcher {
    pub fn new(endpoint: &str, timeout: Duration) -> anyhow::Result<Self> {
        let endpoint = validate_endpoint(endpoint)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("creditbar/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            &config.api.endpoint,
            Duration::from_secs(config.api.timeout_secs.max(1)),
        )
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Fetch the current balance with the given API key.
    ///
    /// An absent or empty key fails with [`FetchError::NoCredential`] before
    /// any request is made.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn fetch_credit_usage(
        &self,
        credential: Option<&str>,
    ) -> Result<CreditInfo, FetchError> {
        let api_key = match credential {
            Some(key) if !key.is_empty() => key,
            _ => return Err(FetchError::NoCredential),
        };

        let response = self
            .client
            .get(self.endpoint.clone())
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::Transport(
                "HTTP 401 Unauthorized - check your API key".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Transport(format!(
                "HTTP {} from credits endpoint: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        let info = parse_credits(&body)?;
        debug!(remaining = info.remaining, "fetched credits");
        Ok(info)
    }
}
