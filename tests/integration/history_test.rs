//! History loading against file-backed quotes

use crate::common::{file_config, trading_days, trending_bars, utc, write_quotes};
use bar_replay::cli::quote_provider;
use bar_replay::history::{DateRange, History, DAILY_PATH};
use bar_replay::store::{DataStore, MemoryStore};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn test_history_fetches_only_missing_tail() {
    let dir = tempdir().unwrap();
    let days = trading_days(utc(2015, 1, 1), utc(2015, 3, 31));
    write_quotes(dir.path(), "SPY", &trending_bars(&days, dec!(100), dec!(1)));

    let config = file_config(dir.path());
    let store = Arc::new(MemoryStore::new());
    let history = History::new(store.clone(), quote_provider(&config.history).unwrap());

    let january = DateRange::new(utc(2015, 1, 1), utc(2015, 1, 31));
    let first = history.load(&["SPY".to_string()], &january).await.unwrap();
    assert_eq!(first.fetched_ranges, 1);
    assert_eq!(first.bars_written, 22);

    // Extending the range only fetches from the last stored day onwards
    let quarter = DateRange::new(utc(2015, 1, 1), utc(2015, 3, 31));
    let gaps = history
        .missing_ranges(&["SPY".to_string()], &quarter)
        .await
        .unwrap();
    assert_eq!(gaps["SPY"].len(), 1);
    assert_eq!(gaps["SPY"][0].start_key(), "2015-01-30");
    assert_eq!(gaps["SPY"][0].end_key(), "2015-03-31");

    history.load(&["SPY".to_string()], &quarter).await.unwrap();
    let stored = store
        .children_in_range(DAILY_PATH, Some("2015-01-01"), Some("2015-03-31~"))
        .await
        .unwrap();
    assert_eq!(stored.len(), days.len());
    assert_eq!(stored[0].value["SPY"]["close"], serde_json::json!("100"));
}

#[tokio::test]
async fn test_missing_quote_file_is_history_error() {
    let dir = tempdir().unwrap();
    let config = file_config(dir.path());
    let store = Arc::new(MemoryStore::new());
    let history = History::new(store, quote_provider(&config.history).unwrap());

    let range = DateRange::new(utc(2015, 1, 1), utc(2015, 1, 31));
    let err = history.load(&["XYZ".to_string()], &range).await.unwrap_err();
    assert!(err.to_string().contains("XYZ"));
}
