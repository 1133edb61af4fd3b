//! Normalized Records - Provider-agnostic Payload Shapes
//!
//! Provider adapters normalize raw responses into these records before
//! anything reaches the core; the orchestration layers treat payloads as
//! opaque JSON. Amounts use `Decimal`, never floats, so balances
//! survive serialization round-trips exactly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single asset balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Asset symbol (e.g. "BTC", "USDT").
    pub asset: String,
    /// Total amount (free + used).
    pub total: Decimal,
    /// Freely available amount.
    pub free: Decimal,
    /// Amount locked in orders or collateral.
    pub used: Decimal,
}

impl BalanceRecord {
    /// Whether the balance is empty and should be skipped on publish.
    pub fn is_empty(&self) -> bool {
        self.total.is_zero()
    }
}

/// A single open position (futures or options).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Instrument symbol (e.g. "BTC-PERPETUAL").
    pub symbol: String,
    /// Signed position size (negative = short).
    pub size: Decimal,
    /// Average entry price.
    pub entry_price: Option<Decimal>,
    /// Mark-to-market unrealized profit and loss.
    pub unrealized_pnl: Option<Decimal>,
    /// Provider-reported update time.
    pub updated_at: Option<DateTime<Utc>>,
}

/// One funding fee settlement entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingFeeRecord {
    /// Instrument symbol the fee applies to.
    pub symbol: String,
    /// Fee amount (negative = paid, positive = received).
    pub amount: Decimal,
    /// Settlement currency.
    pub currency: String,
    /// Settlement time.
    pub settled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_balance_is_empty() {
        let record = BalanceRecord {
            asset: "BTC".to_string(),
            total: Decimal::ZERO,
            free: Decimal::ZERO,
            used: Decimal::ZERO,
        };
        assert!(record.is_empty());
    }

    #[test]
    fn balance_decimal_round_trips_exactly() {
        let record = BalanceRecord {
            asset: "ETH".to_string(),
            total: "1.000000000000000001".parse().unwrap(),
            free: "1.000000000000000001".parse().unwrap(),
            used: Decimal::ZERO,
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: BalanceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
