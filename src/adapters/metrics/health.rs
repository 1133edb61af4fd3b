//! Health State - Liveness and Readiness Signals
//!
//! Shared flags backing the /live and /ready endpoints. Readiness flips
//! to false the moment graceful shutdown begins so load balancers stop
//! routing registrations to a process that is tearing down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Whether the process is accepting work (false during shutdown).
    accepting: Arc<AtomicBool>,
}

impl HealthState {
    /// Create a new health state, ready by default.
    pub fn new() -> Self {
        Self {
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Whether the process should be considered ready.
    pub fn is_ready(&self) -> bool {
        self.accepting.load(Ordering::Relaxed)
    }

    /// Mark the process as draining; /ready turns 503.
    pub fn mark_draining(&self) {
        self.accepting.store(false, Ordering::Relaxed);
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draining_flips_readiness() {
        let health = HealthState::new();
        assert!(health.is_ready());
        health.mark_draining();
        assert!(!health.is_ready());
    }
}
