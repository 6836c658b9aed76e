//! Simulation request, status and per-run context

use crate::error::SimError;
use crate::history::DateRange;
use crate::store::{child_path, DataStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map};
use std::sync::Arc;

/// Store path holding simulation requests
pub const SIMULATIONS_PATH: &str = "simulations";

/// Lifecycle status of a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SimulationStatus {
    #[default]
    Starting,
    Running,
    Complete,
    Error,
}

impl SimulationStatus {
    /// Complete and Error are absorbing
    pub fn is_terminal(self) -> bool {
        matches!(self, SimulationStatus::Complete | SimulationStatus::Error)
    }

    pub fn can_transition_to(self, next: SimulationStatus) -> bool {
        use SimulationStatus::*;
        matches!(
            (self, next),
            (Starting, Running) | (Starting, Error) | (Running, Complete) | (Running, Error)
        )
    }
}

impl std::fmt::Display for SimulationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SimulationStatus::Starting => "Starting",
            SimulationStatus::Running => "Running",
            SimulationStatus::Complete => "Complete",
            SimulationStatus::Error => "Error",
        };
        f.write_str(name)
    }
}

/// A simulation request as stored under `simulations/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Ordered, de-duplicated tickers; stored as a comma-separated string
    #[serde(serialize_with = "symbols_to_csv", deserialize_with = "symbols_from_field")]
    pub symbols: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_time: Option<DateTime<Utc>>,
    pub strategy: String,
    #[serde(default)]
    pub status: SimulationStatus,
    /// Latest progress message
    #[serde(default)]
    pub op: String,
}

impl SimulationRequest {
    pub fn new(
        symbols: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        strategy: impl Into<String>,
    ) -> Self {
        Self {
            symbols: parse_symbols(symbols),
            start_time,
            end_time,
            request_time: None,
            strategy: strategy.into(),
            status: SimulationStatus::Starting,
            op: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.symbols.is_empty() {
            return Err(SimError::InvalidRequest("no symbols requested".to_string()));
        }
        if self.start_time > self.end_time {
            return Err(SimError::InvalidRequest(format!(
                "start {} is after end {}",
                self.start_time, self.end_time
            )));
        }
        Ok(())
    }
}

/// Split a comma-separated symbol list, trimming and dropping duplicates
pub fn parse_symbols(raw: &str) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !symbols.iter().any(|s| s == symbol) {
            symbols.push(symbol.to_string());
        }
    }
    symbols
}

fn symbols_to_csv<S: Serializer>(symbols: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&symbols.join(","))
}

fn symbols_from_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Csv(String),
        List(Vec<String>),
    }

    Ok(match Field::deserialize(deserializer)? {
        Field::Csv(raw) => parse_symbols(&raw),
        Field::List(list) => parse_symbols(&list.join(",")),
    })
}

/// State owned by one simulation run
///
/// Holds the immutable request and the mutable lifecycle status, and
/// mirrors status and progress messages to the request's store record.
pub struct SimulationContext {
    id: String,
    request: SimulationRequest,
    status: SimulationStatus,
    path: String,
    store: Arc<dyn DataStore>,
}

impl SimulationContext {
    pub fn new(
        id: impl Into<String>,
        request: SimulationRequest,
        store: Arc<dyn DataStore>,
    ) -> Result<Self, SimError> {
        request.validate()?;
        let id = id.into();
        Ok(Self {
            path: child_path(SIMULATIONS_PATH, &id),
            status: request.status,
            id,
            request,
            store,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn request(&self) -> &SimulationRequest {
        &self.request
    }

    pub fn symbols(&self) -> &[String] {
        &self.request.symbols
    }

    pub fn strategy_name(&self) -> &str {
        &self.request.strategy
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.request.start_time, self.request.end_time)
    }

    pub fn status(&self) -> SimulationStatus {
        self.status
    }

    /// Store path of the request record
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Store path below the request record
    pub fn child_path(&self, name: &str) -> String {
        child_path(&self.path, name)
    }

    /// Record a progress message
    ///
    /// Reporting is best effort: a failed store write is logged and the run
    /// carries on.
    pub async fn progress(&self, message: &str) {
        tracing::info!(sim_id = %self.id, status = %self.status, "{}", message);

        let mut fields = Map::new();
        fields.insert("op".to_string(), json!(message));
        fields.insert("status".to_string(), json!(self.status));
        if let Err(e) = self.store.update(&self.path, fields).await {
            tracing::warn!(sim_id = %self.id, error = %e, "Failed to record progress");
        }
    }

    /// Move to the next lifecycle status and report it
    pub async fn transition(&mut self, next: SimulationStatus, message: &str) -> Result<(), SimError> {
        if !self.status.can_transition_to(next) {
            return Err(SimError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.progress(message).await;
        Ok(())
    }

    /// Enter the Error status with `ERROR: <message>: <cause>`
    ///
    /// Returns the recorded text. A run already in a terminal status keeps it.
    pub async fn fail(&mut self, message: &str, cause: impl std::fmt::Display + Send) -> String {
        let text = format!("ERROR: {}: {}", message, cause);
        if self.status.is_terminal() {
            tracing::warn!(sim_id = %self.id, status = %self.status, error = %text, "Failure after terminal status");
            return text;
        }
        self.status = SimulationStatus::Error;
        tracing::error!(sim_id = %self.id, "{}", text);
        self.progress(&text).await;
        text
    }
}
