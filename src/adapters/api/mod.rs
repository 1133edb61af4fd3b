//! Registration API - Account Listen/Unlisten Surface
//!
//! Axum HTTP server exposing account registration for both delivery
//! modes, plus liveness/readiness probes and the Prometheus scrape
//! endpoint. This surface is the only writer of the account registry;
//! on registration it kicks the scheduler (one-shot enqueue) or the
//! stream supervisor (watch) so fresh accounts produce data
//! immediately.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::metrics::{HealthState, MetricsRegistry};
use crate::domain::{AccountMode, DataKind};
use crate::usecases::{AccountRegistry, PollScheduler, StreamSupervisor};

/// Shared state for all API handlers.
#[derive(Clone)]
pub struct ApiState {
    /// Account membership, mutated only here.
    pub registry: Arc<AccountRegistry>,
    /// Scheduler, for the one-shot enqueue on registration.
    pub scheduler: Arc<PollScheduler>,
    /// Stream supervisor, for watch/unwatch on registration.
    pub supervisor: Arc<StreamSupervisor>,
    /// Readiness flag.
    pub health: HealthState,
    /// Prometheus registry backing /metrics.
    pub metrics: Arc<MetricsRegistry>,
}

/// Body of every registration call.
#[derive(Debug, Deserialize)]
pub struct ListenRequest {
    /// Account to start or stop listening for.
    pub account_id: String,
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/poll/start", post(poll_start))
        .route("/poll/stop", post(poll_stop))
        .route("/stream/start", post(stream_start))
        .route("/stream/stop", post(stream_stop))
        .route("/accounts", get(list_accounts))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve the API until the shutdown token fires.
pub async fn serve(
    state: ApiState,
    bind_address: &str,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind API address {bind_address}"))?;
    info!(address = bind_address, "API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server failed")?;
    Ok(())
}

/// Register an account for polling and enqueue its first fetch.
async fn poll_start(
    State(state): State<ApiState>,
    Json(req): Json<ListenRequest>,
) -> impl IntoResponse {
    if !state.registry.add(&req.account_id, AccountMode::Polling).await {
        warn!(account = %req.account_id, "Already polling account");
    }

    info!(account = %req.account_id, "Monitoring account state");
    state.scheduler.enqueue_account(&req.account_id, DataKind::all());

    (
        StatusCode::OK,
        Json(json!({"status": "ok", "account_id": req.account_id})),
    )
}

/// Deregister a polling account.
async fn poll_stop(
    State(state): State<ApiState>,
    Json(req): Json<ListenRequest>,
) -> impl IntoResponse {
    if !state.registry.remove(&req.account_id, AccountMode::Polling).await {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "not_found", "account_id": req.account_id})),
        );
    }

    info!(account = %req.account_id, "Stopped monitoring account state");
    (
        StatusCode::OK,
        Json(json!({"status": "stopped", "account_id": req.account_id})),
    )
}

/// Register an account for streaming and start its session.
async fn stream_start(
    State(state): State<ApiState>,
    Json(req): Json<ListenRequest>,
) -> impl IntoResponse {
    if !state.registry.add(&req.account_id, AccountMode::Streaming).await {
        warn!(account = %req.account_id, "Already streaming account");
    }

    state.supervisor.watch(&req.account_id).await;
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "account_id": req.account_id})),
    )
}

/// Deregister a streaming account and tear its session down.
async fn stream_stop(
    State(state): State<ApiState>,
    Json(req): Json<ListenRequest>,
) -> impl IntoResponse {
    if !state.registry.remove(&req.account_id, AccountMode::Streaming).await {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"status": "not_found", "account_id": req.account_id})),
        );
    }

    state.supervisor.unwatch(&req.account_id).await;
    (
        StatusCode::OK,
        Json(json!({"status": "stopped", "account_id": req.account_id})),
    )
}

/// List all current registrations.
async fn list_accounts(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.registry.registrations().await)
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 503 once draining starts.
async fn readiness(State(state): State<ApiState>) -> StatusCode {
    if state.health.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus scrape endpoint.
async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::bus::RedisBus;
    use crate::adapters::credentials::StaticCredentialStore;
    use crate::adapters::provider::ExchangeProviderRegistry;
    use crate::config::{ProviderClientConfig, SchedulerConfig, StreamConfig};
    use crate::ports::bus::MessageBus;
    use crate::usecases::{Publisher, TaskQueue};

    fn state() -> (ApiState, Arc<TaskQueue>) {
        let registry = Arc::new(AccountRegistry::new());
        let queue = Arc::new(TaskQueue::new());
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let scheduler = Arc::new(PollScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            Arc::clone(&metrics),
            &SchedulerConfig::default(),
        ));
        let publisher = Arc::new(Publisher::new(
            Arc::new(RedisBus::new("redis://127.0.0.1:6379")) as Arc<dyn MessageBus>,
            Arc::clone(&metrics),
        ));
        let supervisor = Arc::new(StreamSupervisor::new(
            Arc::new(StaticCredentialStore::from_config(&[])),
            Arc::new(ExchangeProviderRegistry::new(&ProviderClientConfig::default())),
            publisher,
            Arc::clone(&metrics),
            &StreamConfig::default(),
        ));

        (
            ApiState {
                registry,
                scheduler,
                supervisor,
                health: HealthState::new(),
                metrics,
            },
            queue,
        )
    }

    #[tokio::test]
    async fn poll_start_registers_and_enqueues_all_kinds() {
        let (state, queue) = state();

        poll_start(
            State(state.clone()),
            Json(ListenRequest {
                account_id: "acct-1".to_string(),
            }),
        )
        .await;

        assert!(
            state
                .registry
                .contains(&"acct-1".to_string(), AccountMode::Polling)
                .await
        );
        let task = queue.take().await.unwrap();
        assert_eq!(task.account_id, "acct-1");
        assert_eq!(task.kinds, DataKind::all());
    }

    #[tokio::test]
    async fn poll_stop_of_unknown_account_is_not_found() {
        let (state, _queue) = state();
        let response = poll_stop(
            State(state),
            Json(ListenRequest {
                account_id: "ghost".to_string(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn readiness_reflects_draining() {
        let (state, _queue) = state();
        assert_eq!(readiness(State(state.clone())).await, StatusCode::OK);
        state.health.mark_draining();
        assert_eq!(
            readiness(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
