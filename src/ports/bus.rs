//! Message Bus Port - Outbound Publish Transport
//!
//! Thin wire-level interface to the downstream bus. Connection policy
//! (lazy connect, reconnect-on-failure, drop-on-error) lives in the
//! core's `Publisher`, not here. The bus adapter only moves bytes.

use async_trait::async_trait;

/// Trait for the publish-side bus client.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Establish the connection. Idempotent; concurrent callers must not
    /// double-connect.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Tear the connection down. Idempotent.
    async fn disconnect(&self) -> anyhow::Result<()>;

    /// Publish one message under a dot-delimited topic.
    async fn publish(&self, topic: &str, payload: &[u8]) -> anyhow::Result<()>;
}
