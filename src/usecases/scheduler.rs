//! Poll Scheduler - Registry to Task Translation
//!
//! Converts the set of currently-polling accounts into fetch tasks on
//! two independent fixed cadences: a fast one for balances and
//! positions, a slow one for funding fees. Each tick takes a snapshot
//! of the registry, so accounts added or removed mid-tick only affect
//! the next tick. Ticks never overlap within a cadence: if a tick is
//! still enqueuing when the next is due, the missed tick is skipped
//! rather than queued, which caps enqueue volume under load.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::SchedulerConfig;
use crate::domain::{AccountId, DataKind, FetchTask};

use super::queue::TaskQueue;
use super::registry::AccountRegistry;

/// Interval-driven producer of fetch tasks.
pub struct PollScheduler {
    registry: Arc<AccountRegistry>,
    queue: Arc<TaskQueue>,
    metrics: Arc<MetricsRegistry>,
    fast_interval: Duration,
    slow_interval: Duration,
    cancel: CancellationToken,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl PollScheduler {
    /// Create a scheduler over the shared registry and queue.
    pub fn new(
        registry: Arc<AccountRegistry>,
        queue: Arc<TaskQueue>,
        metrics: Arc<MetricsRegistry>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            registry,
            queue,
            metrics,
            fast_interval: Duration::from_secs(config.fast_interval_secs),
            slow_interval: Duration::from_secs(config.slow_interval_secs),
            cancel: CancellationToken::new(),
            handles: std::sync::Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Start both cadence timers. No-op if already started.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Scheduler already running");
            return;
        }

        let fast = tokio::spawn(Arc::clone(self).run_cadence(
            "fast",
            self.fast_interval,
            DataKind::fast_cadence(),
        ));
        let slow = tokio::spawn(Arc::clone(self).run_cadence(
            "slow",
            self.slow_interval,
            DataKind::slow_cadence(),
        ));

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        handles.push(fast);
        handles.push(slow);

        info!(
            fast_secs = self.fast_interval.as_secs(),
            slow_secs = self.slow_interval.as_secs(),
            "Scheduler started"
        );
    }

    /// Cancel both timers and wait for the cadence loops to exit.
    ///
    /// After this returns no further tick enqueues happen.
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
        info!("Scheduler stopped");
    }

    /// Immediately enqueue one task for a single account.
    ///
    /// Used on fresh registration so the account does not wait for the
    /// next tick.
    pub fn enqueue_account(&self, account_id: &AccountId, kinds: &[DataKind]) {
        match self.queue.put(FetchTask::new(account_id.clone(), kinds)) {
            Ok(()) => {
                self.metrics
                    .tasks_enqueued
                    .with_label_values(&["oneshot"])
                    .inc();
                info!(account = %account_id, ?kinds, "Enqueued one-shot fetch task");
            }
            Err(e) => {
                error!(account = %account_id, error = %e, "Failed to enqueue account");
            }
        }
    }

    /// One cadence loop: tick, snapshot, enqueue, repeat until cancelled.
    async fn run_cadence(
        self: Arc<Self>,
        cadence: &'static str,
        period: Duration,
        kinds: &'static [DataKind],
    ) {
        // First fire one full period after start; registration triggers
        // its own one-shot enqueue, so there is nothing to do earlier.
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let tick_started = Instant::now();
                    self.enqueue_all(cadence, kinds).await;

                    let elapsed = tick_started.elapsed();
                    if elapsed > period {
                        debug!(
                            cadence,
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Tick overran its period; missed ticks are skipped"
                        );
                        self.metrics
                            .ticks_skipped
                            .with_label_values(&[cadence])
                            .inc();
                    }
                }
            }
        }
        debug!(cadence, "Scheduler cadence loop exited");
    }

    /// Enqueue one task per registered polling account.
    ///
    /// Works from a snapshot taken at tick time; a failed enqueue for
    /// one account never aborts the rest of the tick.
    async fn enqueue_all(&self, cadence: &'static str, kinds: &[DataKind]) {
        let accounts = self.registry.polling_accounts().await;
        if accounts.is_empty() {
            debug!(cadence, "No polling accounts, skipping tick");
            return;
        }

        debug!(cadence, accounts = accounts.len(), "Tick enqueuing fetch tasks");
        for account_id in accounts {
            match self.queue.put(FetchTask::new(account_id.clone(), kinds)) {
                Ok(()) => {
                    self.metrics
                        .tasks_enqueued
                        .with_label_values(&[cadence])
                        .inc();
                }
                Err(e) => {
                    error!(account = %account_id, error = %e, "Failed to enqueue account");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountMode;

    fn scheduler_with(
        fast_secs: u64,
        slow_secs: u64,
    ) -> (Arc<PollScheduler>, Arc<AccountRegistry>, Arc<TaskQueue>) {
        let registry = Arc::new(AccountRegistry::new());
        let queue = Arc::new(TaskQueue::new());
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let config = SchedulerConfig {
            fast_interval_secs: fast_secs,
            slow_interval_secs: slow_secs,
        };
        let scheduler = Arc::new(PollScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            metrics,
            &config,
        ));
        (scheduler, registry, queue)
    }

    async fn drain(queue: &TaskQueue) -> Vec<FetchTask> {
        let mut tasks = Vec::new();
        while queue.depth() > 0 {
            if let Some(task) = queue.take().await {
                queue.ack();
                tasks.push(task);
            }
        }
        tasks
    }

    #[tokio::test(start_paused = true)]
    async fn fast_tick_enqueues_one_task_per_polling_account() {
        let (scheduler, registry, queue) = scheduler_with(30, 28_800);
        for id in ["a", "b", "c"] {
            registry.add(&id.to_string(), AccountMode::Polling).await;
        }
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(31)).await;

        let tasks = drain(&queue).await;
        assert_eq!(tasks.len(), 3);
        for task in &tasks {
            assert_eq!(task.kinds, DataKind::fast_cadence());
        }
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn empty_registry_tick_is_a_noop() {
        let (scheduler, _registry, queue) = scheduler_with(30, 28_800);
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(queue.depth(), 0);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cadence_requests_funding_fees_only() {
        let (scheduler, registry, queue) = scheduler_with(1_000_000, 60);
        registry.add(&"a".to_string(), AccountMode::Polling).await;
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(61)).await;

        let tasks = drain(&queue).await;
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kinds, vec![DataKind::FundingFees]);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_ticks_coalesce_instead_of_bursting() {
        let (scheduler, registry, queue) = scheduler_with(30, 1_000_000);
        registry.add(&"a".to_string(), AccountMode::Polling).await;
        scheduler.start();
        tokio::task::yield_now().await;

        // Ten periods elapse at once while the loop is parked on its
        // timer; a burst-style timer would fire ten times.
        tokio::time::advance(Duration::from_secs(300)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(queue.depth(), 1);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_enqueues() {
        let (scheduler, registry, queue) = scheduler_with(30, 28_800);
        registry.add(&"a".to_string(), AccountMode::Polling).await;
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(drain(&queue).await.len(), 1);

        scheduler.stop().await;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn start_twice_spawns_only_one_pair_of_loops() {
        let (scheduler, _registry, _queue) = scheduler_with(30, 28_800);
        scheduler.start();
        scheduler.start();
        assert_eq!(
            scheduler
                .handles
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .len(),
            2
        );
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn oneshot_enqueue_carries_requested_kinds() {
        let (scheduler, _registry, queue) = scheduler_with(30, 28_800);
        scheduler.enqueue_account(&"fresh".to_string(), DataKind::all());

        let task = queue.take().await.unwrap();
        assert_eq!(task.account_id, "fresh");
        assert_eq!(task.kinds, DataKind::all());
    }
}
