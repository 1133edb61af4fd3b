//! Collector Error Taxonomy
//!
//! Typed errors for the orchestration core. Adapters and wiring code use
//! `anyhow` with context; the core distinguishes the few cases callers
//! branch on. None of these is fatal to the process; a single account's
//! failure never escalates past its own task or session.

use thiserror::Error;

/// Errors surfaced by the orchestration core.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The task queue was closed; no further enqueues are accepted.
    #[error("task queue is closed")]
    QueueClosed,

    /// No provider profile matches the credential's provider id.
    #[error("unknown provider {0}")]
    UnknownProvider(String),
}
