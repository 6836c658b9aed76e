//! CLI interface for bar-replay
//!
//! Provides subcommands for:
//! - `watch`: Process simulation requests as they appear (default)
//! - `simulate`: Submit one request and run it to completion
//! - `clean-sims`: Remove all simulation records
//! - `clean-history`: Remove cached daily bars

mod clean;
mod simulate;
mod watch;

pub use clean::CleanTarget;
pub use simulate::SimulateArgs;
pub use watch::WatchArgs;

use crate::config::{Config, HistoryConfig, ProviderKind};
use crate::history::{
    FileQuoteProvider, History, HttpQuoteConfig, HttpQuoteProvider, OfflineProvider,
    QuoteProvider,
};
use crate::sim::Orchestrator;
use crate::store::{DataStore, MemoryStore};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bar-replay")]
#[command(about = "Event-ordered backtesting engine for daily bars")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process simulation requests as they appear
    Watch(WatchArgs),
    /// Submit one simulation and run it
    Simulate(SimulateArgs),
    /// Remove all simulation records
    CleanSims,
    /// Remove cached daily bars
    CleanHistory,
}

/// Store, history and orchestrator wired from configuration
pub struct Runtime {
    pub config: Config,
    pub store: MemoryStore,
    pub orchestrator: Orchestrator,
}

impl Runtime {
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        let store = match &config.store.snapshot_path {
            Some(path) => MemoryStore::open(path)
                .await
                .with_context(|| format!("Failed to load store snapshot {}", path.display()))?,
            None => MemoryStore::new(),
        };

        let shared: Arc<dyn DataStore> = Arc::new(store.clone());
        let history = History::new(shared.clone(), quote_provider(&config.history)?);
        let orchestrator = Orchestrator::new(shared, history, config.clone());

        Ok(Self {
            config,
            store,
            orchestrator,
        })
    }

    /// Write the store snapshot back, if one is configured
    pub async fn persist(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.config.store.snapshot_path {
            self.store
                .save(path)
                .await
                .with_context(|| format!("Failed to save store snapshot {}", path.display()))?;
            tracing::info!(path = %path.display(), "Store snapshot saved");
        }
        Ok(())
    }
}

/// Build the configured quote provider
pub fn quote_provider(config: &HistoryConfig) -> anyhow::Result<Arc<dyn QuoteProvider>> {
    Ok(match config.provider {
        ProviderKind::File => Arc::new(FileQuoteProvider::new(config.data_dir.clone())),
        ProviderKind::Http => {
            let base_url = config
                .base_url
                .clone()
                .context("history.base_url is required for the http provider")?;
            let mut http = HttpQuoteConfig::new(base_url);
            http.timeout = Duration::from_secs(config.timeout_secs);
            Arc::new(HttpQuoteProvider::new(http)?)
        }
        ProviderKind::None => Arc::new(OfflineProvider),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["bar-replay"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::parse_from([
            "bar-replay",
            "--config",
            "custom.toml",
            "simulate",
            "--symbols",
            "SPY,QQQ",
            "--start",
            "2015-01-01",
            "--end",
            "2015-06-30",
            "--strategy",
            "Ivy",
        ]);
        assert_eq!(cli.config, "custom.toml");
        match cli.command {
            Some(Commands::Simulate(args)) => {
                assert_eq!(args.symbols, "SPY,QQQ");
                assert_eq!(args.strategy, "Ivy");
                assert_eq!(args.end.to_string(), "2015-06-30");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_clean_commands() {
        assert!(matches!(
            Cli::parse_from(["bar-replay", "clean-sims"]).command,
            Some(Commands::CleanSims)
        ));
        assert!(matches!(
            Cli::parse_from(["bar-replay", "clean-history"]).command,
            Some(Commands::CleanHistory)
        ));
    }

    #[test]
    fn test_quote_provider_selection() {
        let mut config = HistoryConfig::default();
        assert_eq!(quote_provider(&config).unwrap().name(), "file");

        config.provider = ProviderKind::None;
        assert_eq!(quote_provider(&config).unwrap().name(), "offline");

        config.provider = ProviderKind::Http;
        assert!(quote_provider(&config).is_err());
        config.base_url = Some("http://quotes.local".to_string());
        assert_eq!(quote_provider(&config).unwrap().name(), "http");
    }

    #[tokio::test]
    async fn test_runtime_round_trips_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.snapshot_path = Some(dir.path().join("state.json"));

        let runtime = Runtime::start(config.clone()).await.unwrap();
        runtime
            .store
            .set("simulations/a/op", serde_json::json!("Complete!"))
            .await
            .unwrap();
        runtime.persist().await.unwrap();

        let reopened = Runtime::start(config).await.unwrap();
        assert_eq!(
            reopened.store.get("simulations/a/op").await.unwrap(),
            Some(serde_json::json!("Complete!"))
        );
    }
}
