//! Historical data types

use crate::date::to_date_key;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A daily OHLCV bar for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Ticker symbol (e.g., "SPY")
    #[serde(default)]
    pub symbol: String,
    /// Trading day, as epoch milliseconds on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: u64,
}

impl Bar {
    /// Calendar key of the bar's trading day
    pub fn date_key(&self) -> String {
        to_date_key(self.date)
    }
}

/// Inclusive range of trading days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn start_key(&self) -> String {
        to_date_key(self.start)
    }

    pub fn end_key(&self) -> String {
        to_date_key(self.end)
    }

    /// Whether the day of `timestamp` falls inside the range
    pub fn contains_day(&self, timestamp: DateTime<Utc>) -> bool {
        let key = to_date_key(timestamp);
        key >= self.start_key() && key <= self.end_key()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start_key(), self.end_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_bar_deserializes_numeric_fields() {
        let bar: Bar = serde_json::from_value(json!({
            "symbol": "SPY",
            "date": 1420156800000i64,
            "open": 206.38,
            "high": 206.88,
            "low": 204.18,
            "close": 205.43,
            "volume": 121465900u64
        }))
        .unwrap();

        assert_eq!(bar.close, dec!(205.43));
        assert_eq!(bar.date_key(), "2015-01-02");
    }

    #[test]
    fn test_bar_symbol_defaults_empty() {
        let bar: Bar = serde_json::from_value(json!({
            "date": 1420156800000i64,
            "open": "1", "high": "1", "low": "1", "close": "1"
        }))
        .unwrap();
        assert!(bar.symbol.is_empty());
        assert_eq!(bar.volume, 0);
    }

    #[test]
    fn test_range_contains_day_ignores_time_of_day() {
        let range = DateRange::new(
            Utc.with_ymd_and_hms(2015, 1, 2, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2015, 1, 5, 0, 0, 0).unwrap(),
        );
        assert!(range.contains_day(Utc.with_ymd_and_hms(2015, 1, 2, 0, 0, 0).unwrap()));
        assert!(range.contains_day(Utc.with_ymd_and_hms(2015, 1, 5, 23, 0, 0).unwrap()));
        assert!(!range.contains_day(Utc.with_ymd_and_hms(2015, 1, 6, 0, 0, 0).unwrap()));
        assert_eq!(range.to_string(), "2015-01-02..2015-01-05");
    }
}
