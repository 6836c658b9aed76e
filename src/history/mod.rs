//! Historical bar coverage
//!
//! Guarantees that `history/daily/{dateKey}/{symbol}` holds bars for a
//! simulation's date range, fetching only the leading and trailing gaps
//! from a [`QuoteProvider`].

mod file;
mod http;
mod types;

pub use file::FileQuoteProvider;
pub use http::{HttpQuoteConfig, HttpQuoteProvider};
pub use types::{Bar, DateRange};

use crate::error::SimError;
use crate::store::{Child, DataStore};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Store path holding daily bars, keyed by date then symbol
pub const DAILY_PATH: &str = "history/daily";

/// Trait for historical quote sources
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch daily bars for a symbol within a range
    async fn fetch(&self, symbol: &str, range: &DateRange) -> anyhow::Result<Vec<Bar>>;
    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Provider that never fetches; only bars already in the store are used
#[derive(Debug, Default)]
pub struct OfflineProvider;

#[async_trait]
impl QuoteProvider for OfflineProvider {
    async fn fetch(&self, symbol: &str, range: &DateRange) -> anyhow::Result<Vec<Bar>> {
        tracing::debug!(symbol, range = %range, "Offline provider, nothing fetched");
        Ok(vec![])
    }

    fn name(&self) -> &'static str {
        "offline"
    }
}

/// Outcome of a history load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Sub-ranges requested from the provider
    pub fetched_ranges: usize,
    /// Bars written to the store
    pub bars_written: usize,
}

/// Loads and caches daily history in the data store
pub struct History {
    store: Arc<dyn DataStore>,
    provider: Arc<dyn QuoteProvider>,
}

impl History {
    pub fn new(store: Arc<dyn DataStore>, provider: Arc<dyn QuoteProvider>) -> Self {
        Self { store, provider }
    }

    /// Ensure bar coverage for every symbol over the range
    pub async fn load(&self, symbols: &[String], range: &DateRange) -> Result<LoadReport, SimError> {
        let gaps = self.missing_ranges(symbols, range).await?;
        let mut report = LoadReport::default();

        for (symbol, ranges) in gaps {
            for gap in ranges {
                tracing::info!(
                    symbol = %symbol,
                    from = %gap.start_key(),
                    to = %gap.end_key(),
                    provider = self.provider.name(),
                    "Loading history"
                );
                let bars = self
                    .provider
                    .fetch(&symbol, &gap)
                    .await
                    .map_err(|e| SimError::History(format!("{}: {:#}", symbol, e)))?;

                report.fetched_ranges += 1;
                for mut bar in bars {
                    if bar.symbol.is_empty() {
                        bar.symbol = symbol.clone();
                    }
                    let path = format!("{}/{}/{}", DAILY_PATH, bar.date_key(), symbol);
                    let value = serde_json::to_value(&bar)
                        .map_err(|e| SimError::History(e.to_string()))?;
                    self.store.set(&path, value).await?;
                    report.bars_written += 1;
                }
            }
        }

        tracing::info!(
            fetched_ranges = report.fetched_ranges,
            bars_written = report.bars_written,
            "Historical data loaded"
        );
        Ok(report)
    }

    /// Sub-ranges of `range` not yet covered, per symbol
    pub async fn missing_ranges(
        &self,
        symbols: &[String],
        range: &DateRange,
    ) -> Result<BTreeMap<String, Vec<DateRange>>, SimError> {
        let days = self.store.children_in_range(DAILY_PATH, None, None).await?;

        let gaps = symbols
            .iter()
            .map(|symbol| {
                let ranges = match find_date_bounds(symbol, &days) {
                    None => vec![*range],
                    Some((found_start, found_end)) => {
                        let mut ranges = vec![];
                        if range.start < found_start {
                            ranges.push(DateRange::new(range.start, found_start));
                        }
                        if found_end < range.end {
                            ranges.push(DateRange::new(found_end, range.end));
                        }
                        ranges
                    }
                };
                (symbol.clone(), ranges)
            })
            .collect();

        Ok(gaps)
    }
}

/// First and last stored bar dates for a symbol
fn find_date_bounds(symbol: &str, days: &[Child]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let mut bounds: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

    for day in days {
        let Some(bar) = day.value.get(symbol) else {
            continue;
        };
        let date = bar
            .get("date")
            .and_then(|d| d.as_i64())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .or_else(|| crate::date::parse_date_key(&day.key));

        if let Some(date) = date {
            bounds = Some(match bounds {
                None => (date, date),
                Some((start, _)) => (start, date),
            });
        }
    }

    bounds
}
