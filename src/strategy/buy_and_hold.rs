//! Buy-and-hold strategy

use super::{SignalLevels, Strategy, BUY_AND_HOLD};
use crate::event::Event;
use rust_decimal::Decimal;

/// Fully invests in every tracked symbol as soon as it has a bar
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    symbols: Vec<String>,
    levels: SignalLevels,
}

impl BuyAndHold {
    pub fn new(symbols: Vec<String>) -> Self {
        Self {
            symbols,
            levels: SignalLevels::new(),
        }
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        BUY_AND_HOLD
    }

    fn compute(&mut self, bar: &Event) -> Option<SignalLevels> {
        for symbol in &self.symbols {
            if bar.payload.contains_key(symbol) {
                self.levels.entry(symbol.clone()).or_insert(Decimal::ONE);
            }
        }
        Some(self.levels.clone())
    }
}
