//! Data Provider Port - Account State Interface
//!
//! A provider exposes two delivery shapes over one logical connection:
//! `fetch` (pull, one snapshot per call) and `watch` (push, blocks until
//! the next update arrives). Providers vary in which kinds they support;
//! support is declared up front in `ProviderCapabilities` so callers
//! branch on capability instead of probing at runtime. An unsupported
//! kind behaves exactly like a fetch that returned nothing.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{DataKind, StreamKind};

/// Declared capability set of a provider.
///
/// Built from the provider's static profile; a kind absent here is
/// never dispatched to the wire.
#[derive(Debug, Clone, Default)]
pub struct ProviderCapabilities {
    /// Kinds servable via `fetch`.
    pub fetch: Vec<DataKind>,
    /// Kinds servable via `watch`.
    pub watch: Vec<StreamKind>,
}

impl ProviderCapabilities {
    /// Whether `fetch(kind)` can return data.
    pub fn can_fetch(&self, kind: DataKind) -> bool {
        self.fetch.contains(&kind)
    }

    /// Whether `watch(kind)` can return data.
    pub fn can_watch(&self, kind: StreamKind) -> bool {
        self.watch.contains(&kind)
    }
}

/// Trait for a connected account-state provider.
///
/// One instance corresponds to one authenticated session against one
/// provider for one account. Stream sessions own their instance
/// exclusively; the polling path creates a short-lived instance per
/// task.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Stable provider identifier used in publish topics.
    fn provider_id(&self) -> &str;

    /// Declared capability set.
    fn capabilities(&self) -> &ProviderCapabilities;

    /// Fetch one snapshot of `kind`.
    ///
    /// Returns `Ok(None)` when the provider has nothing to report or
    /// does not support the kind.
    async fn fetch(&self, kind: DataKind) -> anyhow::Result<Option<Value>>;

    /// Block until the next pushed update of `kind` arrives.
    ///
    /// Returns `Ok(None)` for heartbeat-style wakeups with no payload.
    /// Callers wrap this in their own timeout; the provider itself may
    /// block indefinitely.
    async fn watch(&self, kind: StreamKind) -> anyhow::Result<Option<Value>>;

    /// Release the underlying connection. Idempotent.
    async fn close(&self);
}

/// Trait for opening provider sessions from credentials.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Open an authenticated session for the given credentials.
    async fn connect(
        &self,
        credentials: &super::credentials::ProviderCredentials,
    ) -> anyhow::Result<std::sync::Arc<dyn DataProvider>>;
}
