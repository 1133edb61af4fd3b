//! Credential Store Port - Account Credential Lookup
//!
//! Maps an account id to the provider it lives on plus its API
//! credentials. An absent entry is a routine skip-and-log condition for
//! the core, never an error.

use async_trait::async_trait;

use crate::domain::AccountId;

/// API credentials for one account on one provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// Provider identifier (e.g. "binance", "deribit").
    pub provider_id: String,
    /// API key.
    pub api_key: String,
    /// API secret, used only for request signing.
    pub api_secret: String,
}

/// Trait for credential lookup backends.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up credentials for an account. `None` means the account is
    /// unknown to the store.
    async fn get(&self, account_id: &AccountId) -> Option<ProviderCredentials>;
}
