//! Redis Bus Client - Pub/Sub Publish Transport
//!
//! Publishes records to Redis channels named by the collector's
//! dot-delimited topics. Uses the connection manager so a dropped
//! connection heals itself between publishes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::ports::bus::MessageBus;

/// Redis-backed `MessageBus`.
pub struct RedisBus {
    url: String,
    connection: Mutex<Option<ConnectionManager>>,
}

impl RedisBus {
    /// Create a client for the given redis:// URL. No connection is
    /// made until `connect`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let client = redis::Client::open(self.url.as_str())
            .with_context(|| format!("Invalid bus URL: {}", self.url))?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Bus connection failed")?;

        *guard = Some(manager);
        info!(url = %self.url, "Connected to bus");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.take().is_some() {
            info!("Disconnected from bus");
        }
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let mut connection = {
            let guard = self.connection.lock().await;
            guard.clone().context("Bus not connected")?
        };

        let receivers: i64 = connection
            .publish(topic, payload)
            .await
            .with_context(|| format!("Publish to {topic} failed"))?;
        debug!(topic, receivers, "Published to bus");
        Ok(())
    }
}
