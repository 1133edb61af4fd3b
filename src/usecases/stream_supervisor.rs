//! Stream Supervisor - Per-account Stream Session Lifecycle
//!
//! Maintains one supervised task group per streaming account. A session
//! owns a single provider connection shared by one sub-watcher per
//! stream kind; the first sub-watcher to leave its loop tears the whole
//! group down, releases the connection, and returns the account to
//! idle. Sessions are isolated: nothing an account's watchers do can
//! touch another account's group.
//!
//! Per-account lifecycle: Idle -> Starting -> Running -> Stopping -> Idle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::StreamConfig;
use crate::domain::{AccountId, StreamKind};
use crate::ports::credentials::CredentialStore;
use crate::ports::provider::{DataProvider, ProviderFactory};

use super::publisher::Publisher;

/// A live (or starting) session for one streaming account.
struct StreamSession {
    /// Monotonic id distinguishing this session from a successor that
    /// re-used the account slot.
    id: u64,
    /// Cancels this account's task group only.
    cancel: CancellationToken,
    /// The account runner task.
    handle: JoinHandle<()>,
}

/// Supervisor for all per-account stream sessions.
pub struct StreamSupervisor {
    credentials: Arc<dyn CredentialStore>,
    providers: Arc<dyn ProviderFactory>,
    publisher: Arc<Publisher>,
    metrics: Arc<MetricsRegistry>,
    watch_timeout: Duration,
    error_backoff: Duration,
    sessions: tokio::sync::Mutex<HashMap<AccountId, StreamSession>>,
    /// Parent of every session token; cancelling it cancels all groups.
    root: CancellationToken,
    /// Cleared by `stop()`; bars sub-watchers from starting iterations.
    listening: AtomicBool,
    next_session_id: AtomicU64,
}

impl StreamSupervisor {
    /// Create a supervisor with no sessions.
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        providers: Arc<dyn ProviderFactory>,
        publisher: Arc<Publisher>,
        metrics: Arc<MetricsRegistry>,
        config: &StreamConfig,
    ) -> Self {
        Self {
            credentials,
            providers,
            publisher,
            metrics,
            watch_timeout: Duration::from_secs(config.watch_timeout_secs),
            error_backoff: Duration::from_secs(config.error_backoff_secs),
            sessions: tokio::sync::Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
            listening: AtomicBool::new(true),
            next_session_id: AtomicU64::new(0),
        }
    }

    /// Start streaming an account. No-op with a log if the account is
    /// already being streamed or the supervisor is stopped.
    pub async fn watch(self: &Arc<Self>, account_id: &AccountId) {
        if !self.listening.load(Ordering::SeqCst) {
            warn!(account = %account_id, "Supervisor stopped, ignoring watch");
            return;
        }

        let mut sessions = self.sessions.lock().await;
        if sessions.contains_key(account_id) {
            warn!(account = %account_id, "Already streaming account");
            return;
        }

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.root.child_token();
        let handle = tokio::spawn(Arc::clone(self).run_account(
            account_id.clone(),
            session_id,
            cancel.clone(),
        ));
        sessions.insert(
            account_id.clone(),
            StreamSession {
                id: session_id,
                cancel,
                handle,
            },
        );
        self.metrics.active_streams.set(sessions.len() as i64);
        info!(account = %account_id, "Stream session starting");
    }

    /// Stop streaming an account and wait until its task group has
    /// fully exited and the provider connection is released. No-op with
    /// a log for an unknown account.
    pub async fn unwatch(&self, account_id: &AccountId) {
        let session = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.remove(account_id);
            self.metrics.active_streams.set(sessions.len() as i64);
            session
        };

        let Some(session) = session else {
            warn!(account = %account_id, "Not streaming account");
            return;
        };

        info!(account = %account_id, "Stopping stream session");
        session.cancel.cancel();
        let _ = session.handle.await;
        info!(account = %account_id, "Stream session stopped");
    }

    /// Stop every session concurrently and wait for all of them.
    ///
    /// After this returns no provider connection remains open and no
    /// sub-watcher will start a new iteration.
    pub async fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
        self.root.cancel();

        let sessions: Vec<StreamSession> = {
            let mut guard = self.sessions.lock().await;
            let drained = guard.drain().map(|(_, s)| s).collect();
            self.metrics.active_streams.set(0);
            drained
        };

        if sessions.is_empty() {
            return;
        }
        info!(sessions = sessions.len(), "Stopping all stream sessions");
        join_all(sessions.into_iter().map(|s| s.handle)).await;
        info!("All stream sessions stopped");
    }

    /// One account's session: resolve credentials, open the provider
    /// connection, run sub-watchers until the first of them returns,
    /// then tear everything down.
    async fn run_account(
        self: Arc<Self>,
        account_id: AccountId,
        session_id: u64,
        cancel: CancellationToken,
    ) {
        let Some(creds) = self.credentials.get(&account_id).await else {
            warn!(account = %account_id, "No credentials, not streaming");
            self.finish_session(&account_id, session_id).await;
            return;
        };

        let provider = match self.providers.connect(&creds).await {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    account = %account_id,
                    provider = %creds.provider_id,
                    error = %e,
                    "Provider connection failed, not streaming"
                );
                self.finish_session(&account_id, session_id).await;
                return;
            }
        };

        let mut watchers = JoinSet::new();
        for &kind in StreamKind::all() {
            if !provider.capabilities().can_watch(kind) {
                debug!(account = %account_id, %kind, "Stream kind unsupported, skipping");
                continue;
            }
            watchers.spawn(Arc::clone(&self).watch_stream(
                Arc::clone(&provider),
                account_id.clone(),
                kind,
                cancel.clone(),
            ));
        }

        if watchers.is_empty() {
            warn!(account = %account_id, "Provider supports no stream kinds");
        } else {
            info!(account = %account_id, watchers = watchers.len(), "Stream session running");

            // Sub-watchers only return on cancellation or an unhandled
            // fault; either way the first exit ends the whole group.
            if let Some(Err(e)) = watchers.join_next().await {
                if e.is_panic() {
                    error!(account = %account_id, error = %e, "Sub-watcher panicked");
                }
            }
            cancel.cancel();
            watchers.shutdown().await;
        }

        provider.close().await;
        self.finish_session(&account_id, session_id).await;
        debug!(account = %account_id, "Stream session idle");
    }

    /// Drop this session's registry entry unless a successor replaced it.
    async fn finish_session(&self, account_id: &AccountId, session_id: u64) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(account_id).is_some_and(|s| s.id == session_id) {
            sessions.remove(account_id);
        }
        self.metrics.active_streams.set(sessions.len() as i64);
    }

    /// One sub-watcher: repeatedly await the provider's next pushed
    /// update under a timeout and republish it. Timeouts only signal
    /// staleness; transient errors back off and retry; only
    /// cancellation ends the loop.
    async fn watch_stream(
        self: Arc<Self>,
        provider: Arc<dyn DataProvider>,
        account_id: AccountId,
        kind: StreamKind,
        cancel: CancellationToken,
    ) {
        let topic = kind.topic(provider.provider_id(), &account_id);

        loop {
            if cancel.is_cancelled() || !self.listening.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = tokio::time::timeout(self.watch_timeout, provider.watch(kind)) => {
                    match result {
                        Err(_) => {
                            warn!(
                                account = %account_id,
                                %kind,
                                timeout_secs = self.watch_timeout.as_secs(),
                                "No stream updates within timeout"
                            );
                        }
                        Ok(Ok(None)) => {}
                        Ok(Ok(Some(update))) => {
                            self.publisher.publish(&topic, &update).await;
                        }
                        Ok(Err(e)) => {
                            error!(account = %account_id, %kind, error = %e, "Stream watch error");
                            self.metrics
                                .stream_errors
                                .with_label_values(&[kind.as_str()])
                                .inc();
                            tokio::select! {
                                () = cancel.cancelled() => break,
                                () = tokio::time::sleep(self.error_backoff) => {}
                            }
                        }
                    }
                }
            }
        }
        debug!(account = %account_id, %kind, "Sub-watcher exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use crate::ports::bus::MessageBus;
    use crate::ports::credentials::ProviderCredentials;
    use crate::ports::provider::ProviderCapabilities;

    struct RecordingBus {
        published: tokio::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MessageBus for RecordingBus {
        async fn connect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn disconnect(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn publish(&self, topic: &str, _payload: &[u8]) -> anyhow::Result<()> {
            self.published.lock().await.push(topic.to_string());
            Ok(())
        }
    }

    struct MapCredentials {
        providers: HashMap<String, String>,
    }

    #[async_trait]
    impl CredentialStore for MapCredentials {
        async fn get(&self, account_id: &AccountId) -> Option<ProviderCredentials> {
            self.providers.get(account_id).map(|provider_id| ProviderCredentials {
                provider_id: provider_id.clone(),
                api_key: "key".to_string(),
                api_secret: "secret".to_string(),
            })
        }
    }

    struct FakeProvider {
        provider_id: String,
        capabilities: ProviderCapabilities,
        balance_updates: tokio::sync::Mutex<VecDeque<Value>>,
        panic_on_balance: bool,
        closes: AtomicUsize,
    }

    impl FakeProvider {
        fn new(provider_id: &str) -> Arc<Self> {
            Arc::new(Self {
                provider_id: provider_id.to_string(),
                capabilities: ProviderCapabilities {
                    fetch: Vec::new(),
                    watch: StreamKind::all().to_vec(),
                },
                balance_updates: tokio::sync::Mutex::new(VecDeque::new()),
                panic_on_balance: false,
                closes: AtomicUsize::new(0),
            })
        }

        fn panicking(provider_id: &str) -> Arc<Self> {
            let mut provider = Self::new(provider_id);
            Arc::get_mut(&mut provider).unwrap().panic_on_balance = true;
            provider
        }
    }

    #[async_trait]
    impl DataProvider for FakeProvider {
        fn provider_id(&self) -> &str {
            &self.provider_id
        }

        fn capabilities(&self) -> &ProviderCapabilities {
            &self.capabilities
        }

        async fn fetch(&self, _kind: crate::domain::DataKind) -> anyhow::Result<Option<Value>> {
            Ok(None)
        }

        async fn watch(&self, kind: StreamKind) -> anyhow::Result<Option<Value>> {
            match kind {
                StreamKind::Balance => {
                    if self.panic_on_balance {
                        panic!("balance stream fault");
                    }
                    if let Some(update) = self.balance_updates.lock().await.pop_front() {
                        return Ok(Some(update));
                    }
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                StreamKind::Positions => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }

        async fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeFactory {
        providers: HashMap<String, Arc<FakeProvider>>,
    }

    #[async_trait]
    impl ProviderFactory for FakeFactory {
        async fn connect(
            &self,
            credentials: &ProviderCredentials,
        ) -> anyhow::Result<Arc<dyn DataProvider>> {
            self.providers
                .get(&credentials.provider_id)
                .map(|p| Arc::clone(p) as Arc<dyn DataProvider>)
                .ok_or_else(|| anyhow::anyhow!("unknown provider"))
        }
    }

    struct Harness {
        supervisor: Arc<StreamSupervisor>,
        bus: Arc<RecordingBus>,
    }

    fn harness(accounts: &[(&str, Arc<FakeProvider>)]) -> Harness {
        let bus = Arc::new(RecordingBus {
            published: tokio::sync::Mutex::new(Vec::new()),
        });
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let publisher = Arc::new(Publisher::new(
            Arc::clone(&bus) as Arc<dyn MessageBus>,
            Arc::clone(&metrics),
        ));

        let mut creds = HashMap::new();
        let mut providers = HashMap::new();
        for (account, provider) in accounts {
            creds.insert((*account).to_string(), provider.provider_id.clone());
            providers.insert(provider.provider_id.clone(), Arc::clone(provider));
        }

        let supervisor = Arc::new(StreamSupervisor::new(
            Arc::new(MapCredentials { providers: creds }),
            Arc::new(FakeFactory { providers }),
            publisher,
            metrics,
            &StreamConfig {
                watch_timeout_secs: 60,
                error_backoff_secs: 5,
            },
        ));
        Harness { supervisor, bus }
    }

    async fn wait_until<F: Fn() -> bool>(condition: F) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn unwatch_unknown_account_is_a_noop() {
        let h = harness(&[]);
        let id = "ghost".to_string();
        h.supervisor.unwatch(&id).await;
        h.supervisor.unwatch(&id).await;
    }

    #[tokio::test]
    async fn duplicate_watch_keeps_a_single_session() {
        let provider = FakeProvider::new("mock-a");
        let h = harness(&[("acct-a", Arc::clone(&provider))]);
        let id = "acct-a".to_string();

        h.supervisor.watch(&id).await;
        h.supervisor.watch(&id).await;
        assert_eq!(h.supervisor.sessions.lock().await.len(), 1);

        h.supervisor.stop().await;
    }

    #[tokio::test]
    async fn watch_without_credentials_returns_to_idle() {
        let h = harness(&[]);
        let id = "acct-x".to_string();
        h.supervisor.watch(&id).await;

        let supervisor = Arc::clone(&h.supervisor);
        wait_until(move || {
            supervisor
                .sessions
                .try_lock()
                .map(|s| s.is_empty())
                .unwrap_or(false)
        })
        .await;
    }

    #[tokio::test]
    async fn streamed_update_publishes_then_unwatch_closes_once() {
        let provider = FakeProvider::new("mock-a");
        provider
            .balance_updates
            .lock()
            .await
            .push_back(json!({"asset": "BTC", "total": "1"}));
        let h = harness(&[("acct-2", Arc::clone(&provider))]);
        let id = "acct-2".to_string();

        h.supervisor.watch(&id).await;
        let bus = Arc::clone(&h.bus);
        wait_until(move || {
            bus.published
                .try_lock()
                .map(|p| !p.is_empty())
                .unwrap_or(false)
        })
        .await;

        assert_eq!(
            *h.bus.published.lock().await,
            vec!["balance_ws.mock-a.acct-2".to_string()]
        );

        h.supervisor.unwatch(&id).await;
        assert_eq!(provider.closes.load(Ordering::SeqCst), 1);
        assert!(h.supervisor.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn sub_watcher_fault_cancels_siblings_and_spares_other_accounts() {
        let faulty = FakeProvider::panicking("mock-a");
        let healthy = FakeProvider::new("mock-b");
        let h = harness(&[
            ("acct-a", Arc::clone(&faulty)),
            ("acct-b", Arc::clone(&healthy)),
        ]);

        h.supervisor.watch(&"acct-b".to_string()).await;
        h.supervisor.watch(&"acct-a".to_string()).await;

        // The faulty account tears itself down and goes idle.
        let supervisor = Arc::clone(&h.supervisor);
        wait_until(move || {
            supervisor
                .sessions
                .try_lock()
                .map(|s| !s.contains_key("acct-a"))
                .unwrap_or(false)
        })
        .await;

        assert_eq!(faulty.closes.load(Ordering::SeqCst), 1);
        assert!(h.supervisor.sessions.lock().await.contains_key("acct-b"));

        h.supervisor.stop().await;
        assert_eq!(healthy.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_closes_every_connection_and_bars_new_watches() {
        let a = FakeProvider::new("mock-a");
        let b = FakeProvider::new("mock-b");
        let h = harness(&[("acct-a", Arc::clone(&a)), ("acct-b", Arc::clone(&b))]);

        h.supervisor.watch(&"acct-a".to_string()).await;
        h.supervisor.watch(&"acct-b".to_string()).await;
        h.supervisor.stop().await;

        assert_eq!(a.closes.load(Ordering::SeqCst), 1);
        assert_eq!(b.closes.load(Ordering::SeqCst), 1);
        assert!(h.supervisor.sessions.lock().await.is_empty());

        h.supervisor.watch(&"acct-a".to_string()).await;
        assert!(h.supervisor.sessions.lock().await.is_empty());
    }
}
