//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Cadence
//! intervals, worker count, stream timeouts, bus address, and account
//! credentials are all externalized here - nothing is hardcoded in the
//! orchestration core.

pub mod loader;

use serde::Deserialize;

/// Top-level collector configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any component starts.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Service identity and logging.
    pub service: ServiceConfig,
    /// Registration/health/metrics HTTP API.
    #[serde(default)]
    pub api: ApiConfig,
    /// Message bus connection.
    pub bus: BusConfig,
    /// Polling cadences.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Worker pool sizing.
    #[serde(default)]
    pub workers: WorkerConfig,
    /// Stream session behavior.
    #[serde(default)]
    pub stream: StreamConfig,
    /// Provider REST/WS client behavior.
    #[serde(default)]
    pub provider: ProviderClientConfig,
    /// Account credentials served by the static credential store.
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Human-readable service name.
    pub name: String,
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bind address for the registration/health/metrics server.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

/// Message bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    /// Bus connection URL (e.g. "redis://127.0.0.1:6379").
    pub url: String,
}

/// Polling cadence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Fast cadence (balances/positions) interval in seconds.
    #[serde(default = "default_fast_interval")]
    pub fast_interval_secs: u64,
    /// Slow cadence (funding fees) interval in seconds.
    #[serde(default = "default_slow_interval")]
    pub slow_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            fast_interval_secs: default_fast_interval(),
            slow_interval_secs: default_slow_interval(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent task consumers.
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

/// Stream session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Per-watch timeout in seconds; a lapse only signals staleness.
    #[serde(default = "default_watch_timeout")]
    pub watch_timeout_secs: u64,
    /// Backoff after a transient stream error, in seconds.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            watch_timeout_secs: default_watch_timeout(),
            error_backoff_secs: default_error_backoff(),
        }
    }
}

/// Provider client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderClientConfig {
    /// REST request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum retries on transient REST errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Maximum concurrent REST requests per provider session.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ProviderClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// One account's credentials, served by the static credential store.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    /// Account identifier used by the registration surface.
    pub account_id: String,
    /// Provider the account lives on (e.g. "binance", "deribit").
    pub provider: String,
    /// API key.
    pub api_key: String,
    /// API secret.
    pub api_secret: String,
}

// Default value functions for serde

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_fast_interval() -> u64 {
    30
}

fn default_slow_interval() -> u64 {
    28_800 // 8 hours
}

fn default_worker_count() -> usize {
    4
}

fn default_watch_timeout() -> u64 {
    60
}

fn default_error_backoff() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_concurrent() -> usize {
    10
}
