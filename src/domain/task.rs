//! Fetch Tasks, Data Kinds and Publish Topics
//!
//! A `FetchTask` is the unit of work the scheduler hands to the worker
//! pool: one account plus the set of data kinds to refresh. Topics are
//! dot-delimited `<dataKind>.<providerId>.<accountId>` strings; streaming
//! kinds carry a `_ws` suffix on the data kind segment.

use serde::{Deserialize, Serialize};

use super::account::AccountId;

/// One category of account state fetched via the polling path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// Spot/wallet balances.
    Balance,
    /// Earn/savings product balances.
    EarnBalance,
    /// Derivative positions.
    Positions,
    /// Option positions.
    OptionPositions,
    /// Accrued funding fees.
    FundingFees,
}

impl DataKind {
    /// Topic segment for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balance => "balance",
            Self::EarnBalance => "earn_balance",
            Self::Positions => "positions",
            Self::OptionPositions => "option_positions",
            Self::FundingFees => "funding_fees",
        }
    }

    /// Kinds refreshed on the fast cadence.
    pub fn fast_cadence() -> &'static [Self] {
        &[
            Self::Balance,
            Self::EarnBalance,
            Self::Positions,
            Self::OptionPositions,
        ]
    }

    /// Kinds refreshed on the slow cadence.
    pub fn slow_cadence() -> &'static [Self] {
        &[Self::FundingFees]
    }

    /// Every kind, used for the one-shot enqueue on fresh registration.
    pub fn all() -> &'static [Self] {
        &[
            Self::Balance,
            Self::EarnBalance,
            Self::Positions,
            Self::OptionPositions,
            Self::FundingFees,
        ]
    }

    /// Build the publish topic for a polled record.
    pub fn topic(self, provider_id: &str, account_id: &str) -> String {
        format!("{}.{provider_id}.{account_id}", self.as_str())
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One category of account state delivered via a stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Balance updates pushed by the provider.
    Balance,
    /// Position updates pushed by the provider.
    Positions,
}

impl StreamKind {
    /// Topic segment for this kind (stream marker included).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Balance => "balance_ws",
            Self::Positions => "positions_ws",
        }
    }

    /// Sub-watchers spawned per streaming account, in spawn order.
    pub fn all() -> &'static [Self] {
        &[Self::Balance, Self::Positions]
    }

    /// Build the publish topic for a streamed record.
    pub fn topic(self, provider_id: &str, account_id: &str) -> String {
        format!("{}.{provider_id}.{account_id}", self.as_str())
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of polling work: refresh `kinds` for `account_id`.
///
/// Immutable once created. Produced by the scheduler (or the one-shot
/// enqueue on registration) and consumed exactly once by one worker;
/// tasks still queued at shutdown are dropped, the next cycle re-requests
/// the same data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTask {
    /// Account whose state should be refreshed.
    pub account_id: AccountId,
    /// Data kinds requested, without duplicates.
    pub kinds: Vec<DataKind>,
}

impl FetchTask {
    /// Create a task for one account and a set of kinds.
    pub fn new(account_id: impl Into<AccountId>, kinds: &[DataKind]) -> Self {
        Self {
            account_id: account_id.into(),
            kinds: kinds.to_vec(),
        }
    }
}
