//! Publisher - Fire-and-forget Result Sink
//!
//! Owns the connection policy around the bus port: lazy connect on
//! first use, reconnect after failure, and warn-and-drop on any publish
//! error. Callers never block on downstream acknowledgement and never
//! see a publish failure; a lost message is refreshed by the next
//! scheduling cycle or stream update.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::ports::bus::MessageBus;

/// Lazily-connecting publisher over a `MessageBus`.
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
    connected: AtomicBool,
    connect_lock: Mutex<()>,
    metrics: Arc<MetricsRegistry>,
}

impl Publisher {
    /// Create a publisher; no connection is made until first use.
    pub fn new(bus: Arc<dyn MessageBus>, metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            bus,
            connected: AtomicBool::new(false),
            connect_lock: Mutex::new(()),
            metrics,
        }
    }

    /// Connect the underlying bus. Idempotent; concurrent callers are
    /// serialized so the bus is never double-connected.
    pub async fn connect(&self) -> anyhow::Result<()> {
        let _guard = self.connect_lock.lock().await;
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        self.bus.connect().await?;
        self.connected.store(true, Ordering::Release);
        info!("Publisher connected to bus");
        Ok(())
    }

    /// Disconnect the underlying bus. Idempotent.
    pub async fn disconnect(&self) -> anyhow::Result<()> {
        let _guard = self.connect_lock.lock().await;
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.bus.disconnect().await?;
        info!("Publisher disconnected from bus");
        Ok(())
    }

    /// Publish one record under a topic. Fire-and-forget: every failure
    /// path logs a warning and returns normally.
    pub async fn publish(&self, topic: &str, payload: &Value) {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(topic, error = %e, "Failed to serialize payload, dropping");
                self.metrics.publish_failures.inc();
                return;
            }
        };

        if !self.connected.load(Ordering::Acquire) {
            if let Err(e) = self.connect().await {
                warn!(topic, error = %e, "Bus connect failed, dropping message");
                self.metrics.publish_failures.inc();
                return;
            }
        }

        match self.bus.publish(topic, &bytes).await {
            Ok(()) => {
                let kind = topic.split('.').next().unwrap_or("unknown");
                self.metrics.records_published.with_label_values(&[kind]).inc();
                debug!(topic, bytes = bytes.len(), "Published message");
            }
            Err(e) => {
                // Drop the message and force a reconnect on next use.
                warn!(topic, error = %e, "Publish failed, dropping message");
                self.metrics.publish_failures.inc();
                self.connected.store(false, Ordering::Release);
            }
        }
    }
}
