//! bar-replay: event-ordered backtesting engine for daily price bars
//!
//! This library provides the core components for:
//! - A data store abstraction with an in-memory JSON tree implementation
//! - Historical bar loading with gap detection
//! - A total-order event bus with durable and ephemeral channels
//! - Buy-and-hold and Ivy market-timing strategies
//! - A portfolio ledger with equal-weight sizing
//! - The simulation lifecycle orchestrator
//! - Result summaries and Parquet export
//! - Structured logging and Prometheus metrics

pub mod backtest;
pub mod cli;
pub mod config;
pub mod data;
pub mod date;
pub mod error;
pub mod event;
pub mod history;
pub mod portfolio;
pub mod sim;
pub mod store;
pub mod strategy;
pub mod telemetry;

pub use error::SimError;
