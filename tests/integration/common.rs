//! Shared fixtures

use bar_replay::config::{Config, ProviderKind};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::path::Path;

pub fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Weekdays in `[start, end]`
pub fn trading_days(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut days = vec![];
    let mut day = start;
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day += Duration::days(1);
    }
    days
}

/// Bars whose close moves by `step` every trading day
pub fn trending_bars(days: &[DateTime<Utc>], first: Decimal, step: Decimal) -> Value {
    let bars: Vec<Value> = days
        .iter()
        .enumerate()
        .map(|(i, day)| {
            let close = first + step * Decimal::from(i as u64);
            json!({
                "date": day.timestamp_millis(),
                "open": close.to_string(),
                "high": close.to_string(),
                "low": close.to_string(),
                "close": close.to_string(),
                "volume": 1000
            })
        })
        .collect();
    Value::Array(bars)
}

pub fn write_quotes(dir: &Path, symbol: &str, bars: &Value) {
    std::fs::write(dir.join(format!("{}.json", symbol)), bars.to_string()).unwrap();
}

/// Configuration reading quotes from `dir`
pub fn file_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.history.provider = ProviderKind::File;
    config.history.data_dir = dir.to_path_buf();
    config
}
