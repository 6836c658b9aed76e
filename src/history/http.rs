//! Quote provider over HTTP
//!
//! Expects `GET {base_url}/daily/{SYMBOL}?from=YYYY-MM-DD&to=YYYY-MM-DD`
//! to answer with a JSON array of bars.

use super::{Bar, DateRange, QuoteProvider};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Configuration for the HTTP quote provider
#[derive(Debug, Clone)]
pub struct HttpQuoteConfig {
    /// Base URL of the quote service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl HttpQuoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fetches daily bars from a JSON quote service
pub struct HttpQuoteProvider {
    config: HttpQuoteConfig,
    client: Client,
}

impl HttpQuoteProvider {
    pub fn new(config: HttpQuoteConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn daily_url(&self, symbol: &str) -> String {
        format!(
            "{}/daily/{}",
            self.config.base_url.trim_end_matches('/'),
            symbol.to_uppercase()
        )
    }
}

#[async_trait]
impl QuoteProvider for HttpQuoteProvider {
    async fn fetch(&self, symbol: &str, range: &DateRange) -> anyhow::Result<Vec<Bar>> {
        let url = self.daily_url(symbol);
        tracing::debug!(url = %url, range = %range, "Fetching daily bars");

        let response = self
            .client
            .get(&url)
            .query(&[("from", range.start_key()), ("to", range.end_key())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Quote service error: {} - {}", status, body);
        }

        let bars: Vec<Bar> = response.json().await?;
        Ok(bars
            .into_iter()
            .filter(|bar| range.contains_day(bar.date))
            .map(|mut bar| {
                bar.symbol = symbol.to_string();
                bar
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
