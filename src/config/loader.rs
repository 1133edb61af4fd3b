//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
    let path = Path::new(path);

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: AppConfig =
        toml::from_str(&content).with_context(|| "Failed to parse config.toml")?;

    validate_config(&config)?;

    info!(
        workers = config.workers.count,
        fast_secs = config.scheduler.fast_interval_secs,
        slow_secs = config.scheduler.slow_interval_secs,
        credentials = config.credentials.len(),
        "Configuration loaded successfully"
    );

    Ok(config)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
    anyhow::ensure!(
        !config.service.name.is_empty(),
        "service.name must not be empty"
    );

    anyhow::ensure!(!config.bus.url.is_empty(), "bus.url must not be empty");

    anyhow::ensure!(
        config.api.bind_address.parse::<std::net::SocketAddr>().is_ok(),
        "api.bind_address is not a valid socket address: {}",
        config.api.bind_address
    );

    anyhow::ensure!(
        config.scheduler.fast_interval_secs > 0,
        "scheduler.fast_interval_secs must be positive"
    );
    anyhow::ensure!(
        config.scheduler.slow_interval_secs > 0,
        "scheduler.slow_interval_secs must be positive"
    );

    anyhow::ensure!(
        config.workers.count > 0 && config.workers.count <= 64,
        "workers.count must be in (0, 64], got {}",
        config.workers.count
    );

    anyhow::ensure!(
        config.stream.watch_timeout_secs > 0,
        "stream.watch_timeout_secs must be positive"
    );
    anyhow::ensure!(
        config.stream.error_backoff_secs > 0,
        "stream.error_backoff_secs must be positive"
    );

    anyhow::ensure!(
        config.provider.request_timeout_secs > 0,
        "provider.request_timeout_secs must be positive"
    );
    anyhow::ensure!(
        config.provider.max_concurrent > 0,
        "provider.max_concurrent must be positive"
    );

    for (i, entry) in config.credentials.iter().enumerate() {
        anyhow::ensure!(
            !entry.account_id.is_empty(),
            "credentials[{i}] has empty account_id"
        );
        anyhow::ensure!(
            !entry.provider.is_empty(),
            "credentials[{i}] ({}) has empty provider",
            entry.account_id
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_nonexistent_file_fails() {
        let result = load_config("nonexistent.toml");
        assert!(result.is_err());
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [service]
            name = "balance-aggregator"

            [bus]
            url = "redis://127.0.0.1:6379"
            "#,
        )
        .unwrap();

        assert!(validate_config(&config).is_ok());
        assert_eq!(config.workers.count, 4);
        assert_eq!(config.scheduler.fast_interval_secs, 30);
        assert_eq!(config.scheduler.slow_interval_secs, 28_800);
        assert_eq!(config.stream.watch_timeout_secs, 60);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config: AppConfig = toml::from_str(
            r#"
            [service]
            name = "balance-aggregator"

            [bus]
            url = "redis://127.0.0.1:6379"

            [workers]
            count = 0
            "#,
        )
        .unwrap();

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn credential_entries_parse() {
        let config: AppConfig = toml::from_str(
            r#"
            [service]
            name = "balance-aggregator"

            [bus]
            url = "redis://127.0.0.1:6379"

            [[credentials]]
            account_id = "demo-binance-account-123"
            provider = "binance"
            api_key = "key"
            api_secret = "secret"
            "#,
        )
        .unwrap();

        assert!(validate_config(&config).is_ok());
        assert_eq!(config.credentials.len(), 1);
        assert_eq!(config.credentials[0].provider, "binance");
    }
}
