//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Events handed to consumers
    EventsDelivered,
    /// Signal events emitted by strategies
    SignalsPublished,
    /// Buy trades executed
    BuyTrades,
    /// Sell trades executed
    SellTrades,
    /// Simulations that reached Complete
    SimulationsCompleted,
    /// Simulations that reached Error
    SimulationsFailed,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Total value after the latest bar
    Equity,
    /// Uninvested cash
    Cash,
    /// Open position count
    OpenPositions,
    /// Events waiting in the bus queue
    QueueDepth,
    /// Simulations currently running
    ActiveSimulations,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::EventsDelivered => "barreplay_events_delivered_total",
            CounterMetric::SignalsPublished => "barreplay_signals_published_total",
            CounterMetric::BuyTrades => "barreplay_buy_trades_total",
            CounterMetric::SellTrades => "barreplay_sell_trades_total",
            CounterMetric::SimulationsCompleted => "barreplay_simulations_completed_total",
            CounterMetric::SimulationsFailed => "barreplay_simulations_failed_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::Equity => "barreplay_equity",
            GaugeMetric::Cash => "barreplay_cash",
            GaugeMetric::OpenPositions => "barreplay_open_positions",
            GaugeMetric::QueueDepth => "barreplay_queue_depth",
            GaugeMetric::ActiveSimulations => "barreplay_active_simulations",
        }
    }
}

/// Install the Prometheus exporter on the given port
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}
