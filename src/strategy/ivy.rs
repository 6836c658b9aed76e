//! Ivy market-timing strategy
//!
//! Once a month, symbols trading above their moving average compete on
//! momentum for a fixed number of slots. Symbols below the average are
//! sent flat.

use super::{
    Indicator, Momentum, MonthlyFilter, Selection, SignalLevels, Sma, Strategy, TopK, IVY,
};
use crate::config::IvyConfig;
use crate::event::Event;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::cmp::Ordering;

/// Monthly SMA filter with top-K momentum ranking
#[derive(Debug, Clone)]
pub struct Ivy {
    symbols: Vec<String>,
    filter: MonthlyFilter,
    sma: Sma,
    momentum: Momentum,
    top_k: usize,
}

impl Ivy {
    pub fn new(symbols: Vec<String>, start: DateTime<Utc>, config: &IvyConfig) -> Self {
        Self {
            symbols,
            filter: MonthlyFilter::new(start, config.day_of_month),
            sma: Sma::new(config.sma_window),
            momentum: Momentum::new(config.momentum_window),
            top_k: config.top_k,
        }
    }
}

impl Strategy for Ivy {
    fn name(&self) -> &str {
        IVY
    }

    fn compute(&mut self, bar: &Event) -> Option<SignalLevels> {
        let timestamp = bar.timestamp?;
        if !self.filter.accept(timestamp) {
            return None;
        }

        let mut levels = SignalLevels::new();
        let mut top = TopK::new(self.top_k);

        for symbol in &self.symbols {
            let Some(close) = bar.close(symbol) else {
                continue;
            };
            let average = self.sma.update(symbol, close);
            let momentum = self.momentum.update(symbol, close);
            let Some(average) = average else {
                continue;
            };

            match close.cmp(&average) {
                // Neither entry nor exit: no instruction for this symbol
                Ordering::Equal => {}
                Ordering::Less => {
                    levels.insert(symbol.clone(), Decimal::ZERO);
                }
                Ordering::Greater => {
                    match top.offer(symbol, momentum.unwrap_or(Decimal::ZERO)) {
                        Selection::Accepted => {
                            levels.insert(symbol.clone(), Decimal::ONE);
                        }
                        Selection::Replaced(evicted) => {
                            levels.insert(evicted, Decimal::ZERO);
                            levels.insert(symbol.clone(), Decimal::ONE);
                        }
                        Selection::Rejected => {
                            levels.insert(symbol.clone(), Decimal::ZERO);
                        }
                    }
                }
            }
        }

        tracing::debug!(date = %timestamp.date_naive(), ?levels, "Ivy rebalance");
        Some(levels)
    }
}
