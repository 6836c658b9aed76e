//! Configuration types for bar-replay

use crate::event::ChannelKind;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Data store configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// JSON snapshot loaded at startup and written back on exit
    pub snapshot_path: Option<PathBuf>,
}

/// Historical quote source
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// JSON files on disk
    #[default]
    File,
    /// JSON quote service over HTTP
    Http,
    /// Use only bars already in the store
    None,
}

/// History loading configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    /// Directory holding `{SYMBOL}.json` bar files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the quote service
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout for the quote service
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/quotes")
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::File,
            data_dir: default_data_dir(),
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Portfolio ledger configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
    /// Starting cash
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,

    /// Cash kept aside when sizing buys
    #[serde(default = "default_reserve_buffer")]
    pub reserve_buffer: Decimal,
}

fn default_initial_cash() -> Decimal {
    Decimal::new(100_000, 0)
}
fn default_reserve_buffer() -> Decimal {
    Decimal::new(200, 0)
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            reserve_buffer: default_reserve_buffer(),
        }
    }
}

/// Strategy parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyConfig {
    #[serde(default)]
    pub ivy: IvyConfig,
}

/// Ivy market-timing parameters
#[derive(Debug, Clone, Deserialize)]
pub struct IvyConfig {
    /// Simple moving average window (bars)
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,

    /// Momentum window (bars)
    #[serde(default = "default_momentum_window")]
    pub momentum_window: usize,

    /// Number of symbols held at once
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Day of month the strategy rebalances on
    #[serde(default = "default_day_of_month")]
    pub day_of_month: u32,
}

fn default_sma_window() -> usize {
    10
}
fn default_momentum_window() -> usize {
    3
}
fn default_top_k() -> usize {
    3
}
fn default_day_of_month() -> u32 {
    1
}

impl Default for IvyConfig {
    fn default() -> Self {
        Self {
            sma_window: default_sma_window(),
            momentum_window: default_momentum_window(),
            top_k: default_top_k(),
            day_of_month: default_day_of_month(),
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusConfig {
    /// Channel kind overrides on top of the built-in table
    #[serde(default)]
    pub channels: HashMap<String, ChannelKind>,

    /// Bound on one durable delivery, unbounded when absent
    #[serde(default)]
    pub delivery_timeout_ms: Option<u64>,
}

/// Orchestrator configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Simulations allowed to run at the same time
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_max_concurrent_runs() -> usize {
    1
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port, disabled when absent
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration shipped with the crate
    pub fn bundled() -> anyhow::Result<Self> {
        let config: Config = toml::from_str(include_str!("../config.toml.example"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        let ivy = &self.strategy.ivy;
        anyhow::ensure!(ivy.sma_window > 0, "strategy.ivy.sma_window must be positive");
        anyhow::ensure!(
            ivy.momentum_window > 0,
            "strategy.ivy.momentum_window must be positive"
        );
        anyhow::ensure!(
            (1..=31).contains(&ivy.day_of_month),
            "strategy.ivy.day_of_month must be within 1..=31"
        );
        anyhow::ensure!(
            self.orchestrator.max_concurrent_runs > 0,
            "orchestrator.max_concurrent_runs must be positive"
        );
        anyhow::ensure!(
            self.portfolio.initial_cash >= Decimal::ZERO,
            "portfolio.initial_cash must not be negative"
        );
        if self.history.provider == ProviderKind::Http {
            anyhow::ensure!(
                self.history.base_url.is_some(),
                "history.base_url is required for the http provider"
            );
        }
        Ok(())
    }
}
