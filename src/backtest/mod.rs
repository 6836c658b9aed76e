//! Backtest results
//!
//! Summary statistics computed from a finished simulation's ledger

mod analytics;

pub use analytics::{BacktestResult, BacktestSummary};
