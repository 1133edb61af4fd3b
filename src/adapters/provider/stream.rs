//! Stream Connection - Auto-reconnecting WebSocket Demux
//!
//! One authenticated WebSocket session per streaming account. A single
//! reader task receives provider push messages and routes them into one
//! channel per stream kind; `next(kind)` blocks on that kind's channel.
//! Disconnects reconnect with a fixed backoff; consumers just see a
//! quiet stream in the meantime, which their own watch timeout reports
//! as staleness.

use std::collections::HashMap;

use anyhow::{Context, Result};
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::StreamKind;
use crate::ports::credentials::ProviderCredentials;

use super::profiles::ProviderProfile;

/// Reconnect delay after a dropped WebSocket session.
const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Buffered updates per stream kind before backpressure drops.
const CHANNEL_CAPACITY: usize = 256;

/// A demultiplexed, auto-reconnecting provider WebSocket session.
///
/// Owned exclusively by one stream session; `next` may be called
/// concurrently for different kinds on the same connection.
pub struct StreamConnection {
    receivers: HashMap<StreamKind, Mutex<mpsc::Receiver<Value>>>,
    shutdown: CancellationToken,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl StreamConnection {
    /// Open the connection and subscribe to every channel the profile
    /// declares.
    pub fn open(profile: &'static ProviderProfile, credentials: &ProviderCredentials) -> Self {
        let mut receivers = HashMap::new();
        let mut senders = HashMap::new();
        for &(kind, _) in profile.watch_channels {
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            senders.insert(kind, tx);
            receivers.insert(kind, Mutex::new(rx));
        }

        let subscribe = Self::subscribe_message(profile, credentials);
        let shutdown = CancellationToken::new();
        let reader = tokio::spawn(Self::run_loop(
            profile,
            subscribe,
            senders,
            shutdown.clone(),
        ));

        Self {
            receivers,
            shutdown,
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Block until the next update of `kind` arrives.
    pub async fn next(&self, kind: StreamKind) -> Result<Option<Value>> {
        let Some(receiver) = self.receivers.get(&kind) else {
            anyhow::bail!("stream kind {kind} not subscribed");
        };
        let mut receiver = receiver.lock().await;
        match receiver.recv().await {
            Some(Value::Null) => Ok(None),
            Some(update) => Ok(Some(update)),
            None => Err(anyhow::anyhow!("stream connection closed")),
        }
    }

    /// Close the session and wait for the reader task to exit.
    /// Idempotent.
    pub async fn close(&self) {
        self.shutdown.cancel();
        let handle = self.reader.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Signed subscribe message covering all declared channels.
    fn subscribe_message(
        profile: &'static ProviderProfile,
        credentials: &ProviderCredentials,
    ) -> String {
        let channels: Vec<&str> = profile.watch_channels.iter().map(|(_, c)| *c).collect();
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let message = format!("{timestamp}SUBSCRIBE");
        let mac = hmac_sha256::HMAC::mac(message.as_bytes(), credentials.api_secret.as_bytes());
        let signature = base64::engine::general_purpose::STANDARD.encode(mac);

        json!({
            "op": "subscribe",
            "channels": channels,
            "api_key": credentials.api_key,
            "timestamp": timestamp,
            "signature": signature,
        })
        .to_string()
    }

    /// Connection loop: stream until failure, then reconnect with a
    /// fixed delay, until shut down.
    async fn run_loop(
        profile: &'static ProviderProfile,
        subscribe: String,
        senders: HashMap<StreamKind, mpsc::Sender<Value>>,
        shutdown: CancellationToken,
    ) {
        loop {
            match Self::connect_and_stream(profile, &subscribe, &senders, &shutdown).await {
                Ok(()) => {
                    debug!(provider = profile.provider_id, "Stream connection shut down");
                    return;
                }
                Err(e) => {
                    warn!(
                        provider = profile.provider_id,
                        error = %e,
                        "Stream disconnected, reconnecting in 5s"
                    );
                    tokio::select! {
                        () = shutdown.cancelled() => return,
                        () = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }

    /// Single WebSocket session: connect, subscribe, route messages
    /// until error or shutdown.
    async fn connect_and_stream(
        profile: &'static ProviderProfile,
        subscribe: &str,
        senders: &HashMap<StreamKind, mpsc::Sender<Value>>,
        shutdown: &CancellationToken,
    ) -> Result<()> {
        let (ws_stream, _) = connect_async(profile.ws_url)
            .await
            .context("WebSocket connection failed")?;
        let (mut write, mut read) = ws_stream.split();

        write
            .send(Message::Text(subscribe.to_string()))
            .await
            .context("Subscribe failed")?;
        info!(provider = profile.provider_id, "Stream connected");

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        Self::route(profile, &text, senders);
                    }
                    Some(Ok(Message::Ping(data))) => {
                        // Pong is handled automatically by tungstenite
                        debug!(len = data.len(), "Stream ping received");
                    }
                    Some(Err(e)) => {
                        return Err(anyhow::anyhow!("WebSocket error: {e}"));
                    }
                    None => {
                        return Err(anyhow::anyhow!("WebSocket stream ended"));
                    }
                    _ => {}
                }
            }
        }
    }

    /// Route one provider message to the channel of its stream kind.
    fn route(
        profile: &'static ProviderProfile,
        text: &str,
        senders: &HashMap<StreamKind, mpsc::Sender<Value>>,
    ) {
        let Ok(message) = serde_json::from_str::<Value>(text) else {
            debug!(provider = profile.provider_id, "Unparseable stream message");
            return;
        };

        let Some(channel) = message.get("channel").and_then(Value::as_str) else {
            return;
        };
        let Some(kind) = profile.channel_kind(channel) else {
            debug!(provider = profile.provider_id, channel, "Unknown stream channel");
            return;
        };

        let data = message.get("data").cloned().unwrap_or(Value::Null);
        if data.is_null() {
            return;
        }

        if let Some(sender) = senders.get(&kind) {
            if sender.try_send(data).is_err() {
                warn!(provider = profile.provider_id, %kind, "Stream buffer full, dropping update");
            }
        }
    }
}
