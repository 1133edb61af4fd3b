//! Exchange Provider - Combined Fetch + Watch Session
//!
//! Binds one profile, one credential pair, a signed REST client, and a
//! lazily-opened stream connection into a `DataProvider`. Polling tasks
//! never pay the WebSocket cost; the stream is only opened on the first
//! `watch` call.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ProviderClientConfig;
use crate::domain::{BalanceRecord, CollectorError, DataKind, StreamKind};
use crate::ports::credentials::ProviderCredentials;
use crate::ports::provider::{DataProvider, ProviderCapabilities, ProviderFactory};

use super::profiles::ProviderProfile;
use super::rest::{RestClientConfig, SignedRestClient};
use super::stream::StreamConnection;

/// One authenticated session against one exchange.
pub struct ExchangeProvider {
    profile: &'static ProviderProfile,
    capabilities: ProviderCapabilities,
    credentials: ProviderCredentials,
    rest: SignedRestClient,
    stream: OnceCell<StreamConnection>,
}

impl ExchangeProvider {
    /// Open a session for one credential pair.
    pub fn new(
        profile: &'static ProviderProfile,
        credentials: &ProviderCredentials,
        config: &ProviderClientConfig,
    ) -> anyhow::Result<Self> {
        let rest = SignedRestClient::new(
            credentials,
            RestClientConfig::from_config(profile.rest_url, config),
        )?;
        Ok(Self {
            profile,
            capabilities: profile.capabilities(),
            credentials: credentials.clone(),
            rest,
            stream: OnceCell::new(),
        })
    }
}

#[async_trait]
impl DataProvider for ExchangeProvider {
    fn provider_id(&self) -> &str {
        self.profile.provider_id
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.capabilities
    }

    async fn fetch(&self, kind: DataKind) -> anyhow::Result<Option<Value>> {
        let Some(path) = self.profile.fetch_path(kind) else {
            debug!(provider = self.profile.provider_id, %kind, "Fetch kind unsupported");
            return Ok(None);
        };
        let raw = self.rest.get(path).await?;
        Ok(normalize(kind, raw))
    }

    async fn watch(&self, kind: StreamKind) -> anyhow::Result<Option<Value>> {
        if !self.capabilities.can_watch(kind) {
            anyhow::bail!("stream kind {kind} not supported by {}", self.profile.provider_id);
        }
        let stream = self
            .stream
            .get_or_init(|| async { StreamConnection::open(self.profile, &self.credentials) })
            .await;
        stream.next(kind).await
    }

    async fn close(&self) {
        if let Some(stream) = self.stream.get() {
            stream.close().await;
        }
    }
}

/// Factory resolving credentials to live provider sessions.
pub struct ExchangeProviderRegistry {
    config: ProviderClientConfig,
}

impl ExchangeProviderRegistry {
    /// Create a registry using the process-level client config.
    pub fn new(config: &ProviderClientConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ProviderFactory for ExchangeProviderRegistry {
    async fn connect(
        &self,
        credentials: &ProviderCredentials,
    ) -> anyhow::Result<Arc<dyn DataProvider>> {
        let profile = ProviderProfile::lookup(&credentials.provider_id)
            .ok_or_else(|| CollectorError::UnknownProvider(credentials.provider_id.clone()))?;
        let provider = ExchangeProvider::new(profile, credentials, &self.config)?;
        Ok(Arc::new(provider))
    }
}

/// Normalize a raw REST body: empty results become `None`, balances
/// lose their zero entries.
fn normalize(kind: DataKind, raw: Value) -> Option<Value> {
    match kind {
        DataKind::Balance | DataKind::EarnBalance => normalize_balances(raw),
        DataKind::Positions | DataKind::OptionPositions | DataKind::FundingFees => non_empty(raw),
    }
}

/// `None` for null/empty containers, otherwise the value unchanged.
fn non_empty(raw: Value) -> Option<Value> {
    match &raw {
        Value::Null => None,
        Value::Array(entries) if entries.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        _ => Some(raw),
    }
}

/// Drop zero-total balance entries; providers report dust-filled
/// accounts and downstream only wants funded assets.
fn normalize_balances(raw: Value) -> Option<Value> {
    match raw {
        Value::Array(entries) => {
            let kept: Vec<Value> = entries.into_iter().filter(has_nonzero_total).collect();
            if kept.is_empty() { None } else { Some(Value::Array(kept)) }
        }
        Value::Object(map) => {
            let kept: serde_json::Map<String, Value> = map
                .into_iter()
                .filter(|(_, entry)| has_nonzero_total(entry))
                .collect();
            if kept.is_empty() { None } else { Some(Value::Object(kept)) }
        }
        other => non_empty(other),
    }
}

/// Whether a balance entry carries a non-zero total. Entries that don't
/// look like balances at all are kept as-is.
fn has_nonzero_total(entry: &Value) -> bool {
    if let Ok(record) = serde_json::from_value::<BalanceRecord>(entry.clone()) {
        return !record.is_empty();
    }
    match entry.get("total") {
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => s.parse::<Decimal>().map_or(true, |d| !d.is_zero()),
        _ => true,
    }
}
