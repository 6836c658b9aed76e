//! Event and channel types

use crate::date::to_date_key;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Channel carrying daily bar snapshots
pub const BAR: &str = "bar";
/// Channel carrying strategy target levels
pub const SIGNAL: &str = "signal";

/// A simulation event
///
/// On the wire the payload is flattened next to `type`, `timestamp` and
/// `counter`, one key per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<u64>,
    #[serde(flatten)]
    pub payload: BTreeMap<String, Value>,
}

impl Event {
    /// Create an event with an empty payload
    pub fn new(event_type: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: Some(timestamp),
            counter: None,
            payload: BTreeMap::new(),
        }
    }

    /// Add a symbol entry to the payload
    pub fn with_entry(mut self, symbol: impl Into<String>, value: Value) -> Self {
        self.payload.insert(symbol.into(), value);
        self
    }

    /// Ordering key, once the event has been validated
    pub fn key(&self) -> Option<OrderKey> {
        Some(OrderKey {
            timestamp: self.timestamp?,
            counter: self.counter?,
        })
    }

    /// Closing price carried for a symbol
    pub fn close(&self, symbol: &str) -> Option<Decimal> {
        let close = self.payload.get(symbol)?.get("close")?;
        serde_json::from_value(close.clone()).ok()
    }

    /// Signal level carried for a symbol
    pub fn level(&self, symbol: &str) -> Option<Decimal> {
        serde_json::from_value(self.payload.get(symbol)?.clone()).ok()
    }

    /// `YYYY-MM-DD-counter-type`, used to identify an event in logs
    pub fn event_key(&self) -> String {
        let date = self
            .timestamp
            .map(to_date_key)
            .unwrap_or_else(|| "????-??-??".to_string());
        let counter = self
            .counter
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!("{}-{}-{}", date, counter, self.event_type)
    }
}

/// Total ordering key: timestamp first, counter breaks ties
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub timestamp: DateTime<Utc>,
    pub counter: u64,
}

/// Delivery path of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Persisted before delivery, visible to store watchers
    Durable,
    /// Delivered in-process only
    Ephemeral,
}

/// Static mapping from channel name to delivery path
///
/// Fixed once a bus is built; names not in the table are ephemeral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTable {
    kinds: HashMap<String, ChannelKind>,
}

impl ChannelTable {
    /// Table with explicit entries only
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// Set the kind of a channel
    pub fn with(mut self, channel: impl Into<String>, kind: ChannelKind) -> Self {
        self.kinds.insert(channel.into(), kind);
        self
    }

    /// Apply configured overrides on top of this table
    pub fn with_overrides(mut self, overrides: &HashMap<String, ChannelKind>) -> Self {
        for (channel, kind) in overrides {
            self.kinds.insert(channel.clone(), *kind);
        }
        self
    }

    pub fn kind(&self, channel: &str) -> ChannelKind {
        self.kinds
            .get(channel)
            .copied()
            .unwrap_or(ChannelKind::Ephemeral)
    }
}

impl Default for ChannelTable {
    fn default() -> Self {
        Self::empty()
            .with(BAR, ChannelKind::Durable)
            .with(SIGNAL, ChannelKind::Durable)
    }
}
