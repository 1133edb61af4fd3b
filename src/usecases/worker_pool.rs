//! Worker Pool - Bounded-concurrency Task Execution
//!
//! Runs a fixed number of consumers against the task queue. Each worker
//! resolves credentials, opens a provider session, fans out one fetch
//! per requested data kind concurrently, publishes what came back, and
//! acks the task. Failures are contained at the smallest scope: one
//! kind's error never aborts its siblings, one task's error never kills
//! its worker, and only cancellation ends the pool.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::{DataKind, FetchTask};
use crate::ports::credentials::CredentialStore;
use crate::ports::provider::{DataProvider, ProviderFactory};

use super::publisher::Publisher;
use super::queue::TaskQueue;

/// Fixed-size pool of task consumers.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    credentials: Arc<dyn CredentialStore>,
    providers: Arc<dyn ProviderFactory>,
    publisher: Arc<Publisher>,
    metrics: Arc<MetricsRegistry>,
    worker_count: usize,
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl WorkerPool {
    /// Create a pool of `worker_count` consumers over the shared queue.
    pub fn new(
        queue: Arc<TaskQueue>,
        credentials: Arc<dyn CredentialStore>,
        providers: Arc<dyn ProviderFactory>,
        publisher: Arc<Publisher>,
        metrics: Arc<MetricsRegistry>,
        worker_count: usize,
    ) -> Self {
        Self {
            queue,
            credentials,
            providers,
            publisher,
            metrics,
            worker_count,
            cancel: CancellationToken::new(),
            handles: std::sync::Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Spawn all workers. No-op if already started.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Worker pool already running");
            return;
        }

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for worker_id in 0..self.worker_count {
            let pool = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                pool.worker_loop(worker_id).await;
            }));
        }
        info!(workers = self.worker_count, "Worker pool started");
    }

    /// Cancel all workers, including any mid-task execution, and wait
    /// for every one of them to exit.
    pub async fn stop(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();

        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        info!("Worker pool stopped");
    }

    /// One worker: take, process, ack, repeat until cancelled.
    async fn worker_loop(&self, worker_id: usize) {
        debug!(worker_id, "Worker started");
        loop {
            let task = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                taken = self.queue.take() => match taken {
                    Some(task) => task,
                    None => break,
                },
            };

            debug!(worker_id, account = %task.account_id, "Worker picked up task");

            // Cancellation must win over in-flight provider I/O, so the
            // execution itself races the token.
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    // Dropped on the floor: the next cycle re-requests it.
                    debug!(worker_id, account = %task.account_id, "Task cancelled mid-flight");
                    break;
                }
                () = self.process_task(&task) => {
                    self.queue.ack();
                    self.metrics.tasks_processed.inc();
                }
            }
        }
        debug!(worker_id, "Worker exited");
    }

    /// Execute one task. Infallible: every failure is logged
    /// and contained here.
    async fn process_task(&self, task: &FetchTask) {
        let Some(creds) = self.credentials.get(&task.account_id).await else {
            warn!(account = %task.account_id, "No credentials, skipping task");
            return;
        };

        let provider = match self.providers.connect(&creds).await {
            Ok(provider) => provider,
            Err(e) => {
                error!(
                    account = %task.account_id,
                    provider = %creds.provider_id,
                    error = %e,
                    "Provider session failed, skipping task"
                );
                return;
            }
        };

        // One concurrent fetch per requested kind; siblings are
        // independent, a failed kind only costs its own publish.
        join_all(
            task.kinds
                .iter()
                .map(|&kind| self.fetch_and_publish(&*provider, &task.account_id, kind)),
        )
        .await;

        provider.close().await;
    }

    /// Fetch one data kind and publish the result if there is one.
    async fn fetch_and_publish(
        &self,
        provider: &dyn DataProvider,
        account_id: &str,
        kind: DataKind,
    ) {
        match provider.fetch(kind).await {
            Ok(Some(payload)) => {
                let topic = kind.topic(provider.provider_id(), account_id);
                self.publisher.publish(&topic, &payload).await;
            }
            Ok(None) => {
                debug!(account = account_id, %kind, "Nothing to publish");
            }
            Err(e) => {
                error!(
                    account = account_id,
                    provider = provider.provider_id(),
                    %kind,
                    error = %e,
                    "Fetch failed"
                );
                self.metrics
                    .fetch_errors
                    .with_label_values(&[provider.provider_id(), kind.as_str()])
                    .inc();
            }
        }
    }
}
