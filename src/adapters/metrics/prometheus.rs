//! Prometheus Metrics Registry - Collector Observability
//!
//! Registers and exposes Prometheus metrics for Grafana dashboards.
//! Covers task throughput, per-kind fetch errors, publish volume, and
//! stream session health.

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Centralized Prometheus metrics for the collector.
///
/// All metrics follow the naming convention `balance_aggregator_*` and
/// carry provider/kind labels where cardinality stays bounded.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Tasks enqueued, labelled by trigger (fast/slow/oneshot).
    pub tasks_enqueued: IntCounterVec,
    /// Tasks fully processed (acked) by the worker pool.
    pub tasks_processed: IntCounter,
    /// Fetch failures, labelled by provider and data kind.
    pub fetch_errors: IntCounterVec,
    /// Messages handed to the bus, labelled by data kind segment.
    pub records_published: IntCounterVec,
    /// Publish attempts dropped after a bus failure.
    pub publish_failures: IntCounter,
    /// Currently supervised stream sessions.
    pub active_streams: IntGauge,
    /// Stream watch errors that triggered a backoff, labelled by kind.
    pub stream_errors: IntCounterVec,
    /// Scheduler ticks skipped because the previous tick overran.
    pub ticks_skipped: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let tasks_enqueued = IntCounterVec::new(
            Opts::new(
                "balance_aggregator_tasks_enqueued_total",
                "Fetch tasks enqueued",
            ),
            &["trigger"],
        )?;

        let tasks_processed = IntCounter::new(
            "balance_aggregator_tasks_processed_total",
            "Fetch tasks fully processed by the worker pool",
        )?;

        let fetch_errors = IntCounterVec::new(
            Opts::new(
                "balance_aggregator_fetch_errors_total",
                "Provider fetch failures",
            ),
            &["provider", "kind"],
        )?;

        let records_published = IntCounterVec::new(
            Opts::new(
                "balance_aggregator_records_published_total",
                "Messages handed to the bus",
            ),
            &["kind"],
        )?;

        let publish_failures = IntCounter::new(
            "balance_aggregator_publish_failures_total",
            "Messages dropped after a bus publish failure",
        )?;

        let active_streams = IntGauge::new(
            "balance_aggregator_active_streams",
            "Currently supervised stream sessions",
        )?;

        let stream_errors = IntCounterVec::new(
            Opts::new(
                "balance_aggregator_stream_errors_total",
                "Stream watch errors that triggered a backoff",
            ),
            &["kind"],
        )?;

        let ticks_skipped = IntCounterVec::new(
            Opts::new(
                "balance_aggregator_ticks_skipped_total",
                "Scheduler ticks skipped due to overrun",
            ),
            &["cadence"],
        )?;

        registry.register(Box::new(tasks_enqueued.clone()))?;
        registry.register(Box::new(tasks_processed.clone()))?;
        registry.register(Box::new(fetch_errors.clone()))?;
        registry.register(Box::new(records_published.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(active_streams.clone()))?;
        registry.register(Box::new(stream_errors.clone()))?;
        registry.register(Box::new(ticks_skipped.clone()))?;

        Ok(Self {
            registry,
            tasks_enqueued,
            tasks_processed,
            fetch_errors,
            records_published,
            publish_failures,
            active_streams,
            stream_errors,
            ticks_skipped,
        })
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
