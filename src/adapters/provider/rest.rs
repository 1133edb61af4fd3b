//! Signed REST Client - Authenticated Provider Requests
//!
//! Wraps reqwest with HMAC-SHA256 request signing, a concurrency cap,
//! and bounded retries on transient errors. Every call carries its own
//! timeout so a stuck provider can never outlive caller-side
//! cancellation.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::ProviderClientConfig;
use crate::ports::credentials::ProviderCredentials;

/// Configuration for one provider REST session.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
    /// REST API base URL.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Maximum retries on transient errors.
    pub max_retries: u32,
    /// Base delay between retries (exponential backoff).
    pub retry_base_delay: Duration,
    /// Maximum concurrent requests.
    pub max_concurrent: usize,
}

impl RestClientConfig {
    /// Build from the process-level provider client config.
    pub fn from_config(base_url: &str, config: &ProviderClientConfig) -> Self {
        Self {
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(200),
            max_concurrent: config.max_concurrent,
        }
    }
}

/// HMAC-signed REST client for one account session on one provider.
pub struct SignedRestClient {
    /// Underlying HTTP client.
    http: Client,
    /// API key sent in headers.
    api_key: String,
    /// API secret, used only to compute signatures.
    api_secret: String,
    /// Client configuration.
    config: RestClientConfig,
    /// Concurrency limiter.
    semaphore: Arc<Semaphore>,
}

impl SignedRestClient {
    /// Create a client for one credential pair.
    pub fn new(credentials: &ProviderCredentials, config: RestClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .build()
            .context("Failed to build HTTP client")?;

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

        Ok(Self {
            http,
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            config,
            semaphore,
        })
    }

    /// Current Unix timestamp in seconds, as the signing string.
    fn timestamp() -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
            .to_string()
    }

    /// Sign a request: HMAC-SHA256(secret, timestamp + method + path).
    fn sign(&self, timestamp: &str, method: &str, path: &str) -> String {
        let message = format!("{timestamp}{method}{path}");
        let mac = hmac_sha256::HMAC::mac(message.as_bytes(), self.api_secret.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac)
    }

    /// Execute a signed GET and parse the JSON body.
    pub async fn get(&self, path: &str) -> Result<Value> {
        let _permit = self.semaphore.acquire().await.context("Semaphore closed")?;

        let url = format!("{}{}", self.config.base_url, path);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying request");
                sleep(delay).await;
            }

            let timestamp = Self::timestamp();
            let signature = self.sign(&timestamp, "GET", path);

            let request = self
                .http
                .get(&url)
                .header("X-API-KEY", &self.api_key)
                .header("X-TIMESTAMP", &timestamp)
                .header("X-SIGNATURE", signature);

            match request.send().await {
                Ok(response) => match response.status() {
                    StatusCode::OK => {
                        return response.json::<Value>().await.context("Invalid JSON body");
                    }
                    StatusCode::TOO_MANY_REQUESTS => {
                        warn!(path, "Rate limited by provider, backing off");
                        last_error = Some(anyhow::anyhow!("Rate limited"));
                        continue;
                    }
                    status if status.is_server_error() => {
                        warn!(path, status = %status, "Server error, retrying");
                        last_error = Some(anyhow::anyhow!("Server error: {status}"));
                        continue;
                    }
                    status => {
                        let body = response.text().await.unwrap_or_default();
                        return Err(anyhow::anyhow!("API error {status}: {body}"));
                    }
                },
                Err(e) => {
                    warn!(path, error = %e, attempt, "Request failed");
                    last_error = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SignedRestClient {
        SignedRestClient::new(
            &ProviderCredentials {
                provider_id: "binance".to_string(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            },
            RestClientConfig {
                base_url: "https://example.invalid".to_string(),
                timeout: Duration::from_secs(1),
                max_retries: 0,
                retry_base_delay: Duration::from_millis(1),
                max_concurrent: 2,
            },
        )
        .unwrap()
    }

    #[test]
    fn signature_is_deterministic_per_input() {
        let client = client();
        let a = client.sign("1700000000", "GET", "/api/v3/account");
        let b = client.sign("1700000000", "GET", "/api/v3/account");
        let c = client.sign("1700000001", "GET", "/api/v3/account");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
