//! Event bus module
//!
//! Totally ordered event delivery with durable and ephemeral channels

mod bus;
mod queue;
mod types;

pub use bus::{BusOptions, EventBus};
pub use queue::EventQueue;
pub use types::{ChannelKind, ChannelTable, Event, OrderKey, BAR, SIGNAL};

use crate::error::SimError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Trait for event consumers registered on the bus
#[async_trait]
pub trait EventHandler: Send {
    /// Handle one delivered event, returning events to publish in response
    async fn on_event(&mut self, event: &Event) -> Result<Vec<Event>, SimError>;
}

/// Handler shared between the bus and its owner
pub type SharedHandler = Arc<Mutex<dyn EventHandler>>;
