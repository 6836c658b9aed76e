//! Backtest analytics and reporting

use crate::portfolio::{TradeRecord, TradeType, ValuationRecord};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;

/// Summary statistics from a simulation ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BacktestSummary {
    /// Starting cash
    pub initial_value: Decimal,
    /// Total value after the last bar
    pub final_value: Decimal,
    /// Final over initial value, minus one
    pub total_return: Decimal,
    /// Maximum drawdown (absolute)
    pub max_drawdown: Decimal,
    /// Maximum drawdown (fraction of the peak)
    pub max_drawdown_pct: Decimal,
    /// Sum of realized gains over all sells
    pub realized_gain: Decimal,
    /// Fraction of sells with a positive realized gain
    pub win_rate: Decimal,
    /// Total number of trades
    pub total_trades: usize,
    pub buys: usize,
    pub sells: usize,
    /// Bars valued
    pub trading_days: usize,
}

/// Complete backtest results with exported files
#[derive(Debug, Clone)]
pub struct BacktestResult {
    /// Summary statistics
    pub summary: BacktestSummary,
    /// Path to trades Parquet file
    pub trades_path: PathBuf,
    /// Path to valuation curve Parquet file
    pub equity_path: PathBuf,
}

impl BacktestSummary {
    /// Compute statistics from trades and daily valuations
    pub fn from_ledger(
        initial_value: Decimal,
        trades: &[TradeRecord],
        values: &[ValuationRecord],
    ) -> Self {
        let final_value = values.last().map_or(initial_value, |v| v.total_value);
        let total_return = if initial_value.is_zero() {
            Decimal::ZERO
        } else {
            final_value / initial_value - Decimal::ONE
        };

        let mut peak = initial_value;
        let mut max_drawdown = Decimal::ZERO;
        let mut max_drawdown_pct = Decimal::ZERO;
        for value in values {
            peak = peak.max(value.total_value);
            let drawdown = peak - value.total_value;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                if !peak.is_zero() {
                    max_drawdown_pct = drawdown / peak;
                }
            }
        }

        let gains: Vec<Decimal> = trades.iter().filter_map(|t| t.realized_gain).collect();
        let wins = gains.iter().filter(|g| **g > Decimal::ZERO).count();
        let win_rate = if gains.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(wins) / Decimal::from(gains.len())
        };
        let buys = trades
            .iter()
            .filter(|t| t.trade_type == TradeType::Buy)
            .count();

        Self {
            initial_value,
            final_value,
            total_return,
            max_drawdown,
            max_drawdown_pct,
            realized_gain: gains.iter().sum(),
            win_rate,
            total_trades: trades.len(),
            buys,
            sells: trades.len() - buys,
            trading_days: values.len(),
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        format!(
            r#"
══════════════════════════════════════════════════════
               SIMULATION RESULTS
══════════════════════════════════════════════════════

PERFORMANCE
───────────────────────────────────────────────────────
Initial Value:    {:.2}
Final Value:      {:.2} ({:+.2}%)
Max Drawdown:     {:.2} ({:.2}%)
Realized Gain:    {:+.2}
Win Rate:         {:.1}%

ACTIVITY
───────────────────────────────────────────────────────
Total Trades:     {} ({} buys, {} sells)
Trading Days:     {}
══════════════════════════════════════════════════════
"#,
            self.initial_value,
            self.final_value,
            self.total_return * dec!(100),
            self.max_drawdown,
            self.max_drawdown_pct * dec!(100),
            self.realized_gain,
            self.win_rate * dec!(100),
            self.total_trades,
            self.buys,
            self.sells,
            self.trading_days,
        )
    }
}
