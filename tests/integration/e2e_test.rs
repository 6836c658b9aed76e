//! End-to-end simulation runs

use crate::common::{file_config, trading_days, trending_bars, utc, write_quotes};
use bar_replay::cli::quote_provider;
use bar_replay::config::Config;
use bar_replay::event::ChannelKind;
use bar_replay::history::History;
use bar_replay::portfolio::TradeType;
use bar_replay::sim::{Orchestrator, SimulationRequest, SimulationStatus};
use bar_replay::store::{DataStore, MemoryStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn orchestrator(store: Arc<MemoryStore>, config: Config) -> Orchestrator {
    let history = History::new(store.clone(), quote_provider(&config.history).unwrap());
    Orchestrator::new(store, history, config)
}

fn write_market(dir: &Path, start: chrono::DateTime<chrono::Utc>, end: chrono::DateTime<chrono::Utc>) -> usize {
    let days = trading_days(start, end);
    write_quotes(dir, "SPY", &trending_bars(&days, dec!(100), dec!(0.1)));
    write_quotes(dir, "TLT", &trending_bars(&days, dec!(120), dec!(-0.05)));
    days.len()
}

#[tokio::test]
async fn test_ivy_invests_in_the_uptrend_only() {
    let dir = tempdir().unwrap();
    let bars = write_market(dir.path(), utc(2014, 1, 1), utc(2015, 6, 30));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(store.clone(), file_config(dir.path()));

    let request = SimulationRequest::new("SPY, TLT", utc(2014, 1, 1), utc(2015, 6, 30), "Ivy");
    let id = orchestrator.submit(&request).await.unwrap();
    let report = orchestrator.run_stored(&id).await.unwrap();

    assert_eq!(report.status, SimulationStatus::Complete, "{}", report.message);
    // Ten monthly bars fill the moving average; the levels never change after
    assert_eq!(report.signals_emitted, 1);
    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].trade_type, TradeType::Buy);
    assert_eq!(report.trades[0].symbol, "SPY");
    assert_eq!(report.trades[0].timestamp.to_rfc3339(), "2014-10-01T00:00:00+00:00");
    assert_eq!(report.values.len(), bars);

    let summary = report.summary();
    assert!(summary.final_value > summary.initial_value);
    assert!(report.values.iter().all(|v| v.total_value > Decimal::ZERO));

    let record = store.get(&format!("simulations/{}", id)).await.unwrap().unwrap();
    assert_eq!(record["status"], json!("Complete"));
    assert_eq!(record["op"], json!("Complete!"));
}

#[tokio::test]
async fn test_durable_event_log_is_totally_ordered() {
    let dir = tempdir().unwrap();
    let bars = write_market(dir.path(), utc(2015, 1, 1), utc(2015, 2, 28));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(store.clone(), file_config(dir.path()));

    let request = SimulationRequest::new("SPY,TLT", utc(2015, 1, 1), utc(2015, 2, 28), "BuyAndHold");
    let report = orchestrator.run("ordered", request).await;
    assert!(report.is_complete(), "{}", report.message);
    assert_eq!(report.events_delivered as usize, bars + 1);

    let log = store
        .children_in_range("simulations/ordered/events/bar", None, None)
        .await
        .unwrap();
    assert_eq!(log.len(), bars);
    let keys: Vec<(String, u64)> = log
        .iter()
        .map(|c| {
            (
                c.value["timestamp"].as_str().unwrap().to_string(),
                c.value["counter"].as_u64().unwrap(),
            )
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let signals = store
        .children_in_range("simulations/ordered/events/signal", None, None)
        .await
        .unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].value["SPY"], json!("1"));
    assert_eq!(signals[0].value["TLT"], json!("1"));
}

#[tokio::test]
async fn test_ephemeral_signals_trade_identically() {
    let dir = tempdir().unwrap();
    write_market(dir.path(), utc(2015, 1, 1), utc(2015, 1, 31));

    let durable_store = Arc::new(MemoryStore::new());
    let durable = orchestrator(durable_store, file_config(dir.path()))
        .run(
            "durable",
            SimulationRequest::new("SPY,TLT", utc(2015, 1, 1), utc(2015, 1, 31), "BuyAndHold"),
        )
        .await;

    let mut config = file_config(dir.path());
    config
        .bus
        .channels
        .insert("signal".to_string(), ChannelKind::Ephemeral);
    let ephemeral_store = Arc::new(MemoryStore::new());
    let ephemeral = orchestrator(ephemeral_store.clone(), config)
        .run(
            "ephemeral",
            SimulationRequest::new("SPY,TLT", utc(2015, 1, 1), utc(2015, 1, 31), "BuyAndHold"),
        )
        .await;

    assert!(durable.is_complete() && ephemeral.is_complete());
    assert_eq!(durable.trades, ephemeral.trades);
    assert_eq!(durable.values, ephemeral.values);
    assert!(ephemeral_store
        .get("simulations/ephemeral/events/signal")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_watch_picks_up_new_requests() {
    let dir = tempdir().unwrap();
    write_market(dir.path(), utc(2015, 1, 1), utc(2015, 1, 31));
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(store.clone(), file_config(dir.path()));

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let watcher = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .watch(async {
                    let _ = stopped.await;
                })
                .await
        })
    };

    let id = orchestrator
        .submit(&SimulationRequest::new(
            "SPY,TLT",
            utc(2015, 1, 1),
            utc(2015, 1, 31),
            "BuyAndHold",
        ))
        .await
        .unwrap();

    let status_path = format!("simulations/{}/status", id);
    let mut status = None;
    for _ in 0..100 {
        status = store.get(&status_path).await.unwrap();
        if status == Some(json!("Complete")) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, Some(json!("Complete")));

    stop.send(()).unwrap();
    let started = watcher.await.unwrap().unwrap();
    assert_eq!(started, 1);

    let trades = store
        .children_in_range(&format!("simulations/{}/trades", id), None, None)
        .await
        .unwrap();
    assert_eq!(trades.len(), 2);
}

#[tokio::test]
async fn test_unknown_strategy_never_loads_history() {
    let dir = tempdir().unwrap();
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator(store.clone(), file_config(dir.path()));

    let request = SimulationRequest::new("SPY", utc(2015, 1, 1), utc(2015, 1, 31), "Bogus");
    let report = orchestrator.run("bogus", request).await;

    assert_eq!(report.status, SimulationStatus::Error);
    assert!(report.message.contains("Unknown strategy"));
    assert!(store.get("history").await.unwrap().is_none());
    assert_eq!(report.events_delivered, 0);
}
