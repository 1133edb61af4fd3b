//! Balance Aggregator — Entry Point
//!
//! Initializes configuration, logging, the message bus, and the account
//! task orchestration engine. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build shared state: registry, queue, metrics, bus publisher
//! 4. Start scheduler (fast + slow cadences)
//! 5. Start worker pool (N task consumers)
//! 6. Create stream supervisor (sessions start on registration)
//! 7. Serve registration/health/metrics API
//! 8. Wait for SIGINT → ordered teardown (scheduler → workers →
//!    streams → bus), leaving no worker or provider connection behind

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::api::{self, ApiState};
use adapters::bus::RedisBus;
use adapters::credentials::StaticCredentialStore;
use adapters::metrics::{HealthState, MetricsRegistry};
use adapters::provider::ExchangeProviderRegistry;
use ports::bus::MessageBus;
use ports::credentials::CredentialStore;
use ports::provider::ProviderFactory;
use usecases::{
    AccountRegistry, PollScheduler, Publisher, StreamSupervisor, TaskQueue, WorkerPool,
};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        workers = config.workers.count,
        "Starting balance aggregator"
    );

    // ── 3. Shared state: registry, queue, metrics, publisher ─
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics")?);
    let health = HealthState::new();
    let registry = Arc::new(AccountRegistry::new());
    let queue = Arc::new(TaskQueue::new());

    let bus = Arc::new(RedisBus::new(config.bus.url.clone())) as Arc<dyn MessageBus>;
    let publisher = Arc::new(Publisher::new(bus, Arc::clone(&metrics)));

    let credentials = Arc::new(StaticCredentialStore::from_config(&config.credentials))
        as Arc<dyn CredentialStore>;
    let providers = Arc::new(ExchangeProviderRegistry::new(&config.provider))
        as Arc<dyn ProviderFactory>;

    // ── 4. Start the scheduler (fast + slow cadences) ───────
    let scheduler = Arc::new(PollScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&queue),
        Arc::clone(&metrics),
        &config.scheduler,
    ));
    scheduler.start();

    // ── 5. Start the worker pool ────────────────────────────
    let worker_pool = Arc::new(WorkerPool::new(
        Arc::clone(&queue),
        Arc::clone(&credentials),
        Arc::clone(&providers),
        Arc::clone(&publisher),
        Arc::clone(&metrics),
        config.workers.count,
    ));
    worker_pool.start();

    // ── 6. Stream supervisor (sessions start on registration) ─
    let supervisor = Arc::new(StreamSupervisor::new(
        credentials,
        providers,
        Arc::clone(&publisher),
        Arc::clone(&metrics),
        &config.stream,
    ));

    // ── 7. Serve the registration/health/metrics API ────────
    let api_shutdown = CancellationToken::new();
    let api_state = ApiState {
        registry,
        scheduler: Arc::clone(&scheduler),
        supervisor: Arc::clone(&supervisor),
        health: health.clone(),
        metrics,
    };
    let bind_address = config.api.bind_address.clone();
    let api_handle = {
        let shutdown = api_shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(api_state, &bind_address, shutdown).await {
                error!(error = %e, "API server failed");
            }
        })
    };

    info!("All components running");

    // ── 8. Wait for SIGINT ──────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    // Ordered teardown: stop producing, stop consuming, close streams,
    // then drop the bus. Readiness flips first so probes drain traffic.
    health.mark_draining();

    scheduler.stop().await;
    queue.close();
    worker_pool.stop().await;
    supervisor.stop().await;

    if let Err(e) = publisher.disconnect().await {
        error!(error = %e, "Bus disconnect failed");
    }

    api_shutdown.cancel();
    let _ = api_handle.await;

    info!("Shutdown complete");
    Ok(())
}
