//! Domain layer - Core account and task types.
//!
//! Pure data model for the collector: account registrations, fetch tasks,
//! data kinds, publish topics, and normalized records. No I/O dependencies
//! here (hexagonal architecture inner ring). All types are serializable
//! and testable in isolation.

pub mod account;
pub mod error;
pub mod records;
pub mod task;

// Re-export core types for convenience
pub use account::{AccountId, AccountMode, AccountRegistration};
pub use error::CollectorError;
pub use records::{BalanceRecord, FundingFeeRecord, PositionRecord};
pub use task::{DataKind, FetchTask, StreamKind};
