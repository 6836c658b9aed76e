//! Publish-if-changed signal emission

use super::{SignalLevels, Strategy};
use crate::error::SimError;
use crate::event::{Event, EventHandler, BAR, SIGNAL};
use crate::telemetry::{increment, CounterMetric};
use async_trait::async_trait;

/// Bar consumer that turns strategy output into signal events
///
/// A signal is emitted only when the computed levels differ by value from
/// the last emitted ones.
pub struct SignalEmitter {
    strategy: Box<dyn Strategy>,
    last: SignalLevels,
    emitted: u64,
}

impl SignalEmitter {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            strategy,
            last: SignalLevels::new(),
            emitted: 0,
        }
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Levels carried by the most recent signal
    pub fn last_levels(&self) -> &SignalLevels {
        &self.last
    }

    /// Signals emitted so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn signal_for(&mut self, bar: &Event) -> Result<Option<Event>, SimError> {
        let Some(levels) = self.strategy.compute(bar) else {
            return Ok(None);
        };
        if levels == self.last {
            return Ok(None);
        }

        let timestamp = bar.timestamp.ok_or_else(|| {
            SimError::Precondition(format!("bar {} has no timestamp", bar.event_key()))
        })?;
        let mut signal = Event::new(SIGNAL, timestamp);
        for (symbol, level) in &levels {
            signal = signal.with_entry(symbol.clone(), serde_json::json!(level));
        }

        self.last = levels;
        Ok(Some(signal))
    }
}

#[async_trait]
impl EventHandler for SignalEmitter {
    async fn on_event(&mut self, event: &Event) -> Result<Vec<Event>, SimError> {
        if event.event_type != BAR {
            return Ok(vec![]);
        }

        match self.signal_for(event)? {
            Some(signal) => {
                self.emitted += 1;
                increment(CounterMetric::SignalsPublished);
                tracing::info!(
                    strategy = self.strategy.name(),
                    bar = %event.event_key(),
                    levels = ?self.last,
                    "Signal"
                );
                Ok(vec![signal])
            }
            None => Ok(vec![]),
        }
    }
}
