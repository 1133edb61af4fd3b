//! Account Registry - Process-wide Membership
//!
//! Single source of truth for which accounts are active in which
//! delivery mode. Mutated only by the registration surface; the
//! scheduler and stream supervisor take read-only snapshots. An account
//! may be registered for polling and streaming at the same time; the
//! two registrations are independent.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::{AccountId, AccountMode, AccountRegistration};

/// Concurrency-safe registry of (account, mode) registrations.
///
/// Created once at process start and shared by handle. Not persisted:
/// a restart starts empty.
pub struct AccountRegistry {
    accounts: RwLock<HashMap<(AccountId, AccountMode), AccountRegistration>>,
}

impl AccountRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Register an account for a mode.
    ///
    /// Returns false (and leaves the existing registration untouched)
    /// if the (account, mode) pair is already present.
    pub async fn add(&self, account_id: &AccountId, mode: AccountMode) -> bool {
        let mut accounts = self.accounts.write().await;
        let key = (account_id.clone(), mode);
        if accounts.contains_key(&key) {
            return false;
        }
        accounts.insert(key, AccountRegistration::new(account_id.clone(), mode));
        debug!(account = %account_id, %mode, "Account registered");
        true
    }

    /// Remove an account's registration for a mode.
    ///
    /// Returns false if no such registration existed.
    pub async fn remove(&self, account_id: &AccountId, mode: AccountMode) -> bool {
        let removed = self
            .accounts
            .write()
            .await
            .remove(&(account_id.clone(), mode))
            .is_some();
        if removed {
            debug!(account = %account_id, %mode, "Account deregistered");
        }
        removed
    }

    /// Whether a registration exists.
    pub async fn contains(&self, account_id: &AccountId, mode: AccountMode) -> bool {
        self.accounts
            .read()
            .await
            .contains_key(&(account_id.clone(), mode))
    }

    /// Snapshot of all polling account ids, in no particular order.
    pub async fn polling_accounts(&self) -> Vec<AccountId> {
        self.snapshot(AccountMode::Polling).await
    }

    /// Snapshot of all streaming account ids, in no particular order.
    pub async fn streaming_accounts(&self) -> Vec<AccountId> {
        self.snapshot(AccountMode::Streaming).await
    }

    async fn snapshot(&self, mode: AccountMode) -> Vec<AccountId> {
        self.accounts
            .read()
            .await
            .keys()
            .filter(|(_, m)| *m == mode)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Snapshot of every registration, for the listing endpoint.
    pub async fn registrations(&self) -> Vec<AccountRegistration> {
        self.accounts.read().await.values().cloned().collect()
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_is_rejected_for_duplicates() {
        let registry = AccountRegistry::new();
        assert!(registry.add(&"acct-1".to_string(), AccountMode::Polling).await);
        assert!(!registry.add(&"acct-1".to_string(), AccountMode::Polling).await);
    }

    #[tokio::test]
    async fn modes_are_tracked_independently() {
        let registry = AccountRegistry::new();
        let id = "acct-1".to_string();
        assert!(registry.add(&id, AccountMode::Polling).await);
        assert!(registry.add(&id, AccountMode::Streaming).await);

        assert!(registry.remove(&id, AccountMode::Streaming).await);
        assert!(registry.contains(&id, AccountMode::Polling).await);
        assert!(!registry.contains(&id, AccountMode::Streaming).await);
    }

    #[tokio::test]
    async fn remove_of_unknown_account_is_a_noop() {
        let registry = AccountRegistry::new();
        assert!(!registry.remove(&"ghost".to_string(), AccountMode::Polling).await);
    }

    #[tokio::test]
    async fn snapshots_filter_by_mode() {
        let registry = AccountRegistry::new();
        registry.add(&"a".to_string(), AccountMode::Polling).await;
        registry.add(&"b".to_string(), AccountMode::Polling).await;
        registry.add(&"c".to_string(), AccountMode::Streaming).await;

        let mut polling = registry.polling_accounts().await;
        polling.sort();
        assert_eq!(polling, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(registry.streaming_accounts().await, vec!["c".to_string()]);
    }
}
