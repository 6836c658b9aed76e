//! Quote provider backed by JSON files on disk

use super::{Bar, DateRange, QuoteProvider};
use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;

/// Reads `{data_dir}/{SYMBOL}.json`, each file an array of daily bars
pub struct FileQuoteProvider {
    data_dir: PathBuf,
}

impl FileQuoteProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn file_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", symbol.to_uppercase()))
    }
}

#[async_trait]
impl QuoteProvider for FileQuoteProvider {
    async fn fetch(&self, symbol: &str, range: &DateRange) -> anyhow::Result<Vec<Bar>> {
        let path = self.file_path(symbol);
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading quotes from {}", path.display()))?;
        let bars: Vec<Bar> = serde_json::from_str(&content)
            .with_context(|| format!("parsing quotes in {}", path.display()))?;

        let mut selected: Vec<Bar> = bars
            .into_iter()
            .filter(|bar| range.contains_day(bar.date))
            .map(|mut bar| {
                bar.symbol = symbol.to_string();
                bar
            })
            .collect();
        selected.sort_by_key(|bar| bar.date);

        tracing::debug!(symbol, count = selected.len(), "Read bars from file");
        Ok(selected)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
