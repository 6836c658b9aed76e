//! Portfolio ledger types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeType::Buy => write!(f, "Buy"),
            TradeType::Sell => write!(f, "Sell"),
        }
    }
}

/// An open holding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: String,
    pub shares: u64,
    /// Price paid per share
    pub entry_price: Decimal,
    /// Total paid for the position
    pub cost_basis: Decimal,
}

impl Position {
    /// Value of the position at the given price
    pub fn value_at(&self, price: Decimal) -> Decimal {
        Decimal::from(self.shares) * price
    }
}

/// One executed trade, as appended to `trades`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub symbol: String,
    pub shares: u64,
    pub price: Decimal,
    #[serde(rename = "basis")]
    pub cost_basis: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proceeds: Option<Decimal>,
    #[serde(rename = "gains", default, skip_serializing_if = "Option::is_none")]
    pub realized_gain: Option<Decimal>,
    /// Human-readable description, e.g. `Buy 8 of SPY @ 100`
    pub text: String,
}

impl TradeRecord {
    pub fn buy(
        timestamp: DateTime<Utc>,
        symbol: &str,
        shares: u64,
        price: Decimal,
        cost_basis: Decimal,
    ) -> Self {
        Self {
            timestamp,
            trade_type: TradeType::Buy,
            symbol: symbol.to_string(),
            shares,
            price,
            cost_basis,
            proceeds: None,
            realized_gain: None,
            text: describe(TradeType::Buy, shares, symbol, price),
        }
    }

    pub fn sell(timestamp: DateTime<Utc>, position: &Position, price: Decimal) -> Self {
        let proceeds = position.value_at(price);
        Self {
            timestamp,
            trade_type: TradeType::Sell,
            symbol: position.symbol.clone(),
            shares: position.shares,
            price,
            cost_basis: position.cost_basis,
            proceeds: Some(proceeds),
            realized_gain: Some(proceeds - position.cost_basis),
            text: describe(TradeType::Sell, position.shares, &position.symbol, price),
        }
    }
}

fn describe(trade_type: TradeType, shares: u64, symbol: &str, price: Decimal) -> String {
    format!("{} {} of {} @ {}", trade_type, shares, symbol, price)
}

/// Mark-to-market total after one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    /// Calendar key of the bar
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub total_value: Decimal,
}
