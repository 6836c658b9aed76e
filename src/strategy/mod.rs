//! Strategy framework
//!
//! Strategies turn bar events into target levels per symbol. The shared
//! publish-if-changed behavior lives in [`SignalEmitter`], which wraps any
//! [`Strategy`] and plugs it into the event bus.

mod buy_and_hold;
mod emitter;
mod filter;
mod indicator;
mod ivy;
mod selection;

pub use buy_and_hold::BuyAndHold;
pub use emitter::SignalEmitter;
pub use filter::MonthlyFilter;
pub use indicator::{Indicator, Momentum, PriceWindow, Sma};
pub use ivy::Ivy;
pub use selection::{Selection, TopK};

use crate::config::StrategyConfig;
use crate::error::SimError;
use crate::event::Event;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Target weight per symbol: nonzero means invested, zero means flat
pub type SignalLevels = BTreeMap<String, Decimal>;

/// Registry name of the buy-and-hold strategy
pub const BUY_AND_HOLD: &str = "BuyAndHold";
/// Registry name of the Ivy market-timing strategy
pub const IVY: &str = "Ivy";

/// Trait for signal-producing strategies
pub trait Strategy: Send {
    /// Registry name
    fn name(&self) -> &str;

    /// Candidate levels for a bar, or `None` when the bar is discarded
    fn compute(&mut self, bar: &Event) -> Option<SignalLevels>;
}

/// Create a strategy by registry name
pub fn create_strategy(
    name: &str,
    symbols: &[String],
    start: DateTime<Utc>,
    config: &StrategyConfig,
) -> Result<Box<dyn Strategy>, SimError> {
    match name {
        BUY_AND_HOLD => Ok(Box::new(BuyAndHold::new(symbols.to_vec()))),
        IVY => Ok(Box::new(Ivy::new(symbols.to_vec(), start, &config.ivy))),
        other => Err(SimError::UnknownStrategy(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<String> {
        vec!["SPY".to_string()]
    }

    #[test]
    fn test_registry_builds_known_strategies() {
        let config = StrategyConfig::default();
        let start = Utc::now();
        assert_eq!(
            create_strategy("BuyAndHold", &symbols(), start, &config).unwrap().name(),
            BUY_AND_HOLD
        );
        assert_eq!(
            create_strategy("Ivy", &symbols(), start, &config).unwrap().name(),
            IVY
        );
    }

    #[test]
    fn test_registry_rejects_unknown_name() {
        let err = create_strategy("Bogus", &symbols(), Utc::now(), &StrategyConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, SimError::UnknownStrategy(ref name) if name == "Bogus"));
        assert_eq!(err.to_string(), "Unknown strategy: Bogus");
    }

    #[test]
    fn test_registry_is_case_sensitive() {
        let result = create_strategy("ivy", &symbols(), Utc::now(), &StrategyConfig::default());
        assert!(result.is_err());
    }
}
