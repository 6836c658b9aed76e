//! Simulation lifecycle
//!
//! Requests, per-run context and the orchestrator that sequences history
//! loading, consumer startup, seeding and the event loop.

mod context;
mod orchestrator;

pub use context::{
    parse_symbols, SimulationContext, SimulationRequest, SimulationStatus, SIMULATIONS_PATH,
};
pub use orchestrator::{Orchestrator, SimulationReport};
