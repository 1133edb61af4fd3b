//! Account Registrations - Membership Model
//!
//! An account is an external entity (end user or sub-account) whose
//! financial state is tracked. Each account may be registered for
//! periodic polling, long-lived streaming, or both; the two modes are
//! tracked independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lightweight account identifier used across all layers.
///
/// Opaque to the collector; it only has to match the credential
/// store's key space.
pub type AccountId = String;

/// Delivery mode an account is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    /// Periodic pull-based fetches on the scheduler's cadences.
    Polling,
    /// Push-based updates over a long-lived provider connection.
    Streaming,
}

impl std::fmt::Display for AccountMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::Streaming => write!(f, "streaming"),
        }
    }
}

/// A single (account, mode) registration held by the registry.
///
/// Non-durable: registrations live in process memory and are
/// lost on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRegistration {
    /// Opaque account identifier.
    pub account_id: AccountId,
    /// Delivery mode this registration covers.
    pub mode: AccountMode,
    /// When the registration was accepted.
    pub registered_at: DateTime<Utc>,
}

impl AccountRegistration {
    /// Create a registration stamped with the current time.
    pub fn new(account_id: impl Into<AccountId>, mode: AccountMode) -> Self {
        Self {
            account_id: account_id.into(),
            mode,
            registered_at: Utc::now(),
        }
    }
}
