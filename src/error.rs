//! Simulation error taxonomy

use crate::sim::SimulationStatus;
use crate::store::StoreError;
use thiserror::Error;

/// Errors raised by the simulation core
///
/// Every variant is eventually caught by the orchestrator and recorded as
/// the terminal `Error` status of the run. Nothing here is retried.
#[derive(Debug, Error)]
pub enum SimError {
    /// Event is missing its type or timestamp
    #[error("Invalid event: {0}")]
    Validation(String),

    /// Strategy name not present in the registry
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Durable write failed while delivering an event
    #[error("Delivery of {event_key} failed: {source}")]
    Delivery {
        event_key: String,
        #[source]
        source: StoreError,
    },

    /// A consumer was driven outside its contract
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Historical data could not be loaded
    #[error("History load failed: {0}")]
    History(String),

    /// Request record could not be interpreted
    #[error("Invalid simulation request: {0}")]
    InvalidRequest(String),

    /// Lifecycle transition not allowed by the state machine
    #[error("Invalid status transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: SimulationStatus,
        to: SimulationStatus,
    },

    /// Store access outside of event delivery
    #[error(transparent)]
    Store(#[from] StoreError),
}
