//! Static Credential Store - Config-backed Credential Lookup
//!
//! Serves credentials straight from `[[credentials]]` entries in
//! config.toml. Stands in for a real credentials service; the core only
//! sees the `CredentialStore` port.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::config::CredentialEntry;
use crate::domain::AccountId;
use crate::ports::credentials::{CredentialStore, ProviderCredentials};

/// In-memory credential store built once from config.
pub struct StaticCredentialStore {
    entries: HashMap<AccountId, ProviderCredentials>,
}

impl StaticCredentialStore {
    /// Build the store from config entries. Later duplicates win.
    pub fn from_config(entries: &[CredentialEntry]) -> Self {
        let entries = entries
            .iter()
            .map(|entry| {
                (
                    entry.account_id.clone(),
                    ProviderCredentials {
                        provider_id: entry.provider.clone(),
                        api_key: entry.api_key.clone(),
                        api_secret: entry.api_secret.clone(),
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn get(&self, account_id: &AccountId) -> Option<ProviderCredentials> {
        let found = self.entries.get(account_id).cloned();
        if found.is_none() {
            debug!(account = %account_id, "Account unknown to credential store");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_configured_entry() {
        let store = StaticCredentialStore::from_config(&[CredentialEntry {
            account_id: "demo-deribit-account-123".to_string(),
            provider: "deribit".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        }]);

        let creds = store.get(&"demo-deribit-account-123".to_string()).await.unwrap();
        assert_eq!(creds.provider_id, "deribit");
        assert!(store.get(&"other".to_string()).await.is_none());
    }
}
