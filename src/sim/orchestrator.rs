//! Simulation lifecycle orchestration
//!
//! A run is a staged pipeline:
//! `LoadHistory -> StartConsumers -> Seed -> RunLoop -> Finalize`.
//! The first failing stage short-circuits to `Finalize` with an error.

use super::{SimulationContext, SimulationRequest, SimulationStatus, SIMULATIONS_PATH};
use crate::backtest::BacktestSummary;
use crate::config::Config;
use crate::error::SimError;
use crate::event::{BusOptions, ChannelTable, EventBus, SharedHandler, BAR, SIGNAL};
use crate::history::{History, LoadReport, DAILY_PATH};
use crate::portfolio::{Portfolio, TradeRecord, ValuationRecord};
use crate::store::{Child, DataStore, Replay};
use crate::strategy::{create_strategy, SignalEmitter, Strategy};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use rust_decimal::Decimal;
use serde_json::{json, Map};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

/// Outcome of one simulation run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub id: String,
    pub status: SimulationStatus,
    /// Final progress message
    pub message: String,
    pub initial_cash: Decimal,
    pub trades: Vec<TradeRecord>,
    pub values: Vec<ValuationRecord>,
    pub events_delivered: u64,
    pub signals_emitted: u64,
}

impl SimulationReport {
    fn failed(id: &str, message: String) -> Self {
        Self {
            id: id.to_string(),
            status: SimulationStatus::Error,
            message,
            initial_cash: Decimal::ZERO,
            trades: vec![],
            values: vec![],
            events_delivered: 0,
            signals_emitted: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == SimulationStatus::Complete
    }

    pub fn summary(&self) -> BacktestSummary {
        BacktestSummary::from_ledger(self.initial_cash, &self.trades, &self.values)
    }
}

/// Consumers bound to one run's bus
struct Consumers {
    bus: EventBus,
    emitter: Arc<Mutex<SignalEmitter>>,
    portfolio: Arc<Mutex<Portfolio>>,
}

/// Watches for simulation requests and drives each through its lifecycle
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn DataStore>,
    history: Arc<History>,
    config: Arc<Config>,
    permits: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn DataStore>, history: History, config: Config) -> Self {
        let permits = Arc::new(Semaphore::new(config.orchestrator.max_concurrent_runs));
        Self {
            store,
            history: Arc::new(history),
            config: Arc::new(config),
            permits,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn bus_options(&self) -> BusOptions {
        BusOptions {
            channels: ChannelTable::default().with_overrides(&self.config.bus.channels),
            delivery_timeout: self.config.bus.delivery_timeout_ms.map(Duration::from_millis),
        }
    }

    /// Append a new request under `simulations` and return its id
    pub async fn submit(&self, request: &SimulationRequest) -> Result<String, SimError> {
        let value = serde_json::to_value(request).map_err(crate::store::StoreError::from)?;
        Ok(self.store.push(SIMULATIONS_PATH, value).await?)
    }

    /// Read a stored request and run it
    pub async fn run_stored(&self, id: &str) -> Result<SimulationReport, SimError> {
        let path = format!("{}/{}", SIMULATIONS_PATH, id);
        let value = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| SimError::InvalidRequest(format!("no simulation at {}", path)))?;
        let request: SimulationRequest = serde_json::from_value(value)
            .map_err(|e| SimError::InvalidRequest(e.to_string()))?;
        Ok(self.run(id, request).await)
    }

    /// Run one simulation to a terminal status
    ///
    /// Never fails: every error ends up as the run's `Error` status.
    pub async fn run(&self, id: &str, request: SimulationRequest) -> SimulationReport {
        let mut ctx = match SimulationContext::new(id, request, self.store.clone()) {
            Ok(ctx) => ctx,
            Err(e) => return self.reject(id, e).await,
        };

        let strategy = match create_strategy(
            ctx.strategy_name(),
            ctx.symbols(),
            ctx.request().start_time,
            &self.config.strategy,
        ) {
            Ok(strategy) => strategy,
            Err(e) => {
                let message = ctx.fail("Could not start simulation", &e).await;
                increment(CounterMetric::SimulationsFailed);
                return SimulationReport::failed(id, message);
            }
        };

        self.active.fetch_add(1, Ordering::SeqCst);
        set_gauge(GaugeMetric::ActiveSimulations, self.active.load(Ordering::SeqCst) as f64);
        let report = self.execute(&mut ctx, strategy).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        set_gauge(GaugeMetric::ActiveSimulations, self.active.load(Ordering::SeqCst) as f64);
        report
    }

    /// Record a request that could not even be turned into a context
    async fn reject(&self, id: &str, error: SimError) -> SimulationReport {
        let message = format!("ERROR: Invalid simulation: {}", error);
        tracing::error!(sim_id = id, "{}", message);

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!(SimulationStatus::Error));
        fields.insert("op".to_string(), json!(message));
        let path = format!("{}/{}", SIMULATIONS_PATH, id);
        if let Err(e) = self.store.update(&path, fields).await {
            tracing::warn!(sim_id = id, error = %e, "Failed to record rejection");
        }
        increment(CounterMetric::SimulationsFailed);
        SimulationReport::failed(id, message)
    }

    async fn execute(&self, ctx: &mut SimulationContext, strategy: Box<dyn Strategy>) -> SimulationReport {
        let initial_cash = self.config.portfolio.initial_cash;
        let mut report = SimulationReport::failed(ctx.id(), String::new());
        report.initial_cash = initial_cash;

        let outcome = self.pipeline(ctx, strategy, &mut report).await;

        // Finalize
        match outcome {
            Ok(()) => match ctx.transition(SimulationStatus::Complete, "Complete!").await {
                Ok(()) => {
                    increment(CounterMetric::SimulationsCompleted);
                    report.message = "Complete!".to_string();
                }
                Err(e) => {
                    report.message = ctx.fail("Simulation failed", &e).await;
                    increment(CounterMetric::SimulationsFailed);
                }
            },
            Err(e) => {
                report.message = ctx.fail("Simulation failed", &e).await;
                increment(CounterMetric::SimulationsFailed);
            }
        }
        report.status = ctx.status();
        report
    }

    async fn pipeline(
        &self,
        ctx: &mut SimulationContext,
        strategy: Box<dyn Strategy>,
        report: &mut SimulationReport,
    ) -> Result<(), SimError> {
        ctx.transition(SimulationStatus::Running, "Loading history").await?;
        let loaded = self.load_history(ctx).await?;
        tracing::debug!(sim_id = ctx.id(), ?loaded, "History ready");

        ctx.progress("Starting consumers").await;
        let mut consumers = self.start_consumers(ctx, strategy).await?;

        ctx.progress("Seeding events").await;
        let seeded = consumers.bus.seed(DAILY_PATH, &ctx.range()).await?;
        tracing::info!(sim_id = ctx.id(), seeded, "Bar events seeded");

        ctx.progress("Running simulation").await;
        let result = consumers.bus.run_loop().await;
        consumers.bus.unwatch_all();

        {
            let portfolio = consumers.portfolio.lock().await;
            report.trades = portfolio.trades().to_vec();
            report.values = portfolio.values().to_vec();
        }
        report.signals_emitted = consumers.emitter.lock().await.emitted();
        report.events_delivered = consumers.bus.delivered();

        result.map(|_| ())
    }

    async fn load_history(&self, ctx: &SimulationContext) -> Result<LoadReport, SimError> {
        self.history.load(ctx.symbols(), &ctx.range()).await
    }

    /// Build the bus and register every consumer before anything is seeded
    async fn start_consumers(
        &self,
        ctx: &SimulationContext,
        strategy: Box<dyn Strategy>,
    ) -> Result<Consumers, SimError> {
        let mut bus = EventBus::new(ctx, self.store.clone(), self.bus_options());
        let portfolio = Arc::new(Mutex::new(Portfolio::new(
            ctx,
            self.store.clone(),
            &self.config.portfolio,
        )));
        let emitter = Arc::new(Mutex::new(SignalEmitter::new(strategy)));

        let ledger: SharedHandler = portfolio.clone();
        bus.watch(BAR, ledger.clone()).await?;
        bus.watch(SIGNAL, ledger).await?;
        let signals: SharedHandler = emitter.clone();
        bus.watch(BAR, signals).await?;

        Ok(Consumers {
            bus,
            emitter,
            portfolio,
        })
    }

    /// Process requests as they are appended until `shutdown` resolves
    ///
    /// Only the most recent existing request is looked at on startup; it is
    /// run only if still `Starting`. Returns the number of runs started.
    pub async fn watch(&self, shutdown: impl Future<Output = ()>) -> Result<usize, SimError> {
        let mut requests = self
            .store
            .watch_children(SIMULATIONS_PATH, Replay::Last(1))
            .await?;
        let mut runs: JoinSet<SimulationReport> = JoinSet::new();
        let mut started = 0;
        tracing::info!("Watching for simulation requests");

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                child = requests.recv() => {
                    let Some(Child { key, value }) = child else {
                        tracing::warn!("Request stream closed");
                        break;
                    };
                    let request: SimulationRequest = match serde_json::from_value(value) {
                        Ok(request) => request,
                        Err(e) => {
                            tracing::warn!(sim_id = %key, error = %e, "Ignoring malformed request");
                            continue;
                        }
                    };
                    if request.status != SimulationStatus::Starting {
                        tracing::debug!(sim_id = %key, status = %request.status, "Ignoring request");
                        continue;
                    }

                    let orchestrator = self.clone();
                    runs.spawn(async move {
                        let _permit = orchestrator.permits.clone().acquire_owned().await;
                        orchestrator.run(&key, request).await
                    });
                    started += 1;
                }
                Some(done) = runs.join_next(), if !runs.is_empty() => {
                    log_finished(done);
                }
            }
        }

        requests.close();
        while let Some(done) = runs.join_next().await {
            log_finished(done);
        }
        Ok(started)
    }

    /// Remove every simulation record
    pub async fn clean_simulations(&self) -> Result<(), SimError> {
        tracing::info!("Removing all simulations");
        Ok(self.store.remove(SIMULATIONS_PATH).await?)
    }

    /// Remove all cached history
    pub async fn clean_history(&self) -> Result<(), SimError> {
        tracing::info!("Removing cached history");
        Ok(self.store.remove("history").await?)
    }
}

fn log_finished(done: Result<SimulationReport, tokio::task::JoinError>) {
    match done {
        Ok(report) => tracing::info!(
            sim_id = %report.id,
            status = %report.status,
            trades = report.trades.len(),
            "Simulation finished"
        ),
        Err(e) => tracing::error!(error = %e, "Simulation task failed"),
    }
}
