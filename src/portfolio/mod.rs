//! Portfolio ledger
//!
//! Consumes bar and signal events, executes equal-weight buys and full
//! sells, and keeps an append-only log of trades and daily valuations.

mod types;

pub use types::{Position, TradeRecord, TradeType, ValuationRecord};

use crate::config::PortfolioConfig;
use crate::date::to_date_key;
use crate::error::SimError;
use crate::event::{Event, EventHandler, BAR, SIGNAL};
use crate::sim::SimulationContext;
use crate::store::{child_path, DataStore};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Cash and positions of one simulation
pub struct Portfolio {
    sim_id: String,
    store: Arc<dyn DataStore>,
    trades_path: String,
    values_path: String,
    symbols: Vec<String>,
    initial_cash: Decimal,
    cash: Decimal,
    reserve_buffer: Decimal,
    positions: BTreeMap<String, Position>,
    /// Latest known close per symbol
    closes: BTreeMap<String, Decimal>,
    last_bar: Option<DateTime<Utc>>,
    trades: Vec<TradeRecord>,
    values: Vec<ValuationRecord>,
}

impl Portfolio {
    pub fn new(ctx: &SimulationContext, store: Arc<dyn DataStore>, config: &PortfolioConfig) -> Self {
        Self {
            sim_id: ctx.id().to_string(),
            store,
            trades_path: ctx.child_path("trades"),
            values_path: ctx.child_path("values"),
            symbols: ctx.symbols().to_vec(),
            initial_cash: config.initial_cash,
            cash: config.initial_cash,
            reserve_buffer: config.reserve_buffer,
            positions: BTreeMap::new(),
            closes: BTreeMap::new(),
            last_bar: None,
            trades: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn values(&self) -> &[ValuationRecord] {
        &self.values
    }

    /// Cash plus open positions at their latest known close
    pub fn total_value(&self) -> Decimal {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.value_at(self.closes.get(&p.symbol).copied().unwrap_or(p.entry_price)))
                .sum::<Decimal>()
    }

    async fn on_bar(&mut self, bar: &Event) -> Result<(), SimError> {
        let timestamp = bar.timestamp.ok_or_else(|| {
            SimError::Precondition(format!("bar {} has no timestamp", bar.event_key()))
        })?;
        for symbol in &self.symbols {
            if let Some(close) = bar.close(symbol) {
                self.closes.insert(symbol.clone(), close);
            }
        }
        self.last_bar = Some(timestamp);

        let total_value = self.total_value();
        let date = to_date_key(timestamp);
        self.store
            .set(
                &child_path(&self.values_path, &date),
                json!({ "type": "total", "timestamp": timestamp, "value": total_value }),
            )
            .await?;
        self.values.push(ValuationRecord {
            date,
            timestamp,
            total_value,
        });

        set_gauge(GaugeMetric::Equity, total_value.to_f64().unwrap_or_default());
        set_gauge(GaugeMetric::Cash, self.cash.to_f64().unwrap_or_default());
        Ok(())
    }

    async fn on_signal(&mut self, signal: &Event) -> Result<(), SimError> {
        let Some(timestamp) = self.last_bar else {
            return Err(SimError::Precondition(format!(
                "signal {} received before any bar",
                signal.event_key()
            )));
        };

        for symbol in self.symbols.clone() {
            let Some(level) = signal.level(&symbol) else {
                continue;
            };
            let held = self.positions.contains_key(&symbol);
            if level > Decimal::ZERO && !held {
                self.buy(&symbol, timestamp).await?;
            } else if level <= Decimal::ZERO && held {
                self.sell(&symbol, timestamp).await?;
            }
        }

        set_gauge(GaugeMetric::OpenPositions, self.positions.len() as f64);
        Ok(())
    }

    fn price(&self, symbol: &str) -> Result<Decimal, SimError> {
        self.closes.get(symbol).copied().ok_or_else(|| {
            SimError::Precondition(format!("no close observed for {}", symbol))
        })
    }

    /// Equal-weight buy across the slots not yet filled
    ///
    /// A buy that sizes to zero shares is skipped: no position and no trade
    /// are recorded, so the slot stays open for later signals.
    async fn buy(&mut self, symbol: &str, timestamp: DateTime<Utc>) -> Result<(), SimError> {
        let price = self.price(symbol)?;
        let open_slots = self.symbols.len().saturating_sub(self.positions.len());
        if open_slots == 0 || price <= Decimal::ZERO {
            tracing::warn!(sim_id = %self.sim_id, symbol, %price, open_slots, "Cannot size buy");
            return Ok(());
        }

        let allocation = (self.cash - self.reserve_buffer) / Decimal::from(open_slots);
        let shares = (allocation / price).floor().to_u64().unwrap_or(0);
        if shares == 0 {
            tracing::warn!(sim_id = %self.sim_id, symbol, %allocation, %price, "Allocation buys no shares");
            return Ok(());
        }

        let cost = Decimal::from(shares) * price;
        let trade = TradeRecord::buy(timestamp, symbol, shares, price, cost);
        self.record(trade).await?;

        self.cash -= cost;
        self.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                shares,
                entry_price: price,
                cost_basis: cost,
            },
        );
        increment(CounterMetric::BuyTrades);
        Ok(())
    }

    async fn sell(&mut self, symbol: &str, timestamp: DateTime<Utc>) -> Result<(), SimError> {
        let price = self.price(symbol)?;
        let Some(position) = self.positions.remove(symbol) else {
            return Ok(());
        };

        let trade = TradeRecord::sell(timestamp, &position, price);
        let proceeds = trade.proceeds.unwrap_or_default();
        if let Err(e) = self.record(trade).await {
            self.positions.insert(symbol.to_string(), position);
            return Err(e);
        }

        self.cash += proceeds;
        increment(CounterMetric::SellTrades);
        Ok(())
    }

    /// Persist a trade and append it to the in-memory log
    async fn record(&mut self, trade: TradeRecord) -> Result<(), SimError> {
        tracing::info!(sim_id = %self.sim_id, "{}", trade.text);
        let value = serde_json::to_value(&trade).map_err(crate::store::StoreError::from)?;
        self.store.push(&self.trades_path, value).await?;
        self.trades.push(trade);
        Ok(())
    }
}

#[async_trait]
impl EventHandler for Portfolio {
    async fn on_event(&mut self, event: &Event) -> Result<Vec<Event>, SimError> {
        match event.event_type.as_str() {
            BAR => self.on_bar(event).await?,
            SIGNAL => self.on_signal(event).await?,
            _ => {}
        }
        Ok(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimulationRequest;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 1, d, 0, 0, 0).unwrap()
    }

    fn portfolio(symbols: &str, cash: Decimal, reserve: Decimal) -> (Portfolio, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let request = SimulationRequest::new(symbols, day(1), day(31), "BuyAndHold");
        let ctx = SimulationContext::new("sim-1", request, store.clone()).unwrap();
        let config = PortfolioConfig {
            initial_cash: cash,
            reserve_buffer: reserve,
        };
        (Portfolio::new(&ctx, store.clone(), &config), store)
    }

    fn bar(d: u32, closes: &[(&str, &str)]) -> Event {
        closes.iter().fold(Event::new(BAR, day(d)), |event, (symbol, close)| {
            event.with_entry(*symbol, json!({ "close": close }))
        })
    }

    fn signal(d: u32, levels: &[(&str, i64)]) -> Event {
        levels.iter().fold(Event::new(SIGNAL, day(d)), |event, (symbol, level)| {
            event.with_entry(*symbol, json!(level))
        })
    }

    #[tokio::test]
    async fn test_buy_sizing_respects_reserve() {
        let (mut portfolio, store) = portfolio("SPY", dec!(1000), dec!(200));
        portfolio.on_event(&bar(2, &[("SPY", "100")])).await.unwrap();
        portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap();

        let position = &portfolio.positions()["SPY"];
        assert_eq!(position.shares, 8);
        assert_eq!(position.cost_basis, dec!(800));
        assert_eq!(portfolio.cash(), dec!(200));
        assert_eq!(portfolio.trades()[0].text, "Buy 8 of SPY @ 100");

        let trades = store
            .children_in_range("simulations/sim-1/trades", None, None)
            .await
            .unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].value["type"], json!("Buy"));
    }

    #[tokio::test]
    async fn test_equal_weight_across_open_slots() {
        let (mut portfolio, _) = portfolio("SPY, QQQ", dec!(10200), dec!(200));
        portfolio
            .on_event(&bar(2, &[("SPY", "100"), ("QQQ", "50")]))
            .await
            .unwrap();
        portfolio
            .on_event(&signal(2, &[("SPY", 1), ("QQQ", 1)]))
            .await
            .unwrap();

        // SPY gets (10200 - 200) / 2, QQQ the remaining (5200 - 200) / 1
        assert_eq!(portfolio.positions()["SPY"].shares, 50);
        assert_eq!(portfolio.positions()["QQQ"].shares, 100);
        assert_eq!(portfolio.cash(), dec!(200));
    }

    #[tokio::test]
    async fn test_sell_records_proceeds_and_gain() {
        let (mut portfolio, _) = portfolio("SPY", dec!(1000), dec!(200));
        portfolio.on_event(&bar(2, &[("SPY", "100")])).await.unwrap();
        portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap();
        portfolio.on_event(&bar(5, &[("SPY", "110")])).await.unwrap();
        portfolio.on_event(&signal(5, &[("SPY", 0)])).await.unwrap();

        assert!(portfolio.positions().is_empty());
        assert_eq!(portfolio.cash(), dec!(1080));
        let sell = &portfolio.trades()[1];
        assert_eq!(sell.trade_type, TradeType::Sell);
        assert_eq!(sell.proceeds, Some(dec!(880)));
        assert_eq!(sell.realized_gain, Some(dec!(80)));
    }

    #[tokio::test]
    async fn test_repeated_levels_do_not_trade_again() {
        let (mut portfolio, _) = portfolio("SPY", dec!(1000), dec!(200));
        portfolio.on_event(&bar(2, &[("SPY", "100")])).await.unwrap();
        portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap();
        portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap();
        // Flat signal for a symbol not held is a no-op
        portfolio.on_event(&signal(2, &[("QQQ", 0)])).await.unwrap();
        assert_eq!(portfolio.trades().len(), 1);
    }

    #[tokio::test]
    async fn test_valuation_marks_to_market() {
        let (mut portfolio, store) = portfolio("SPY", dec!(1000), dec!(200));
        portfolio.on_event(&bar(2, &[("SPY", "100")])).await.unwrap();
        portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap();
        portfolio.on_event(&bar(5, &[("SPY", "90")])).await.unwrap();

        let values = portfolio.values();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].total_value, dec!(1000));
        assert_eq!(values[1].date, "2015-01-05");
        assert_eq!(values[1].total_value, dec!(920));

        let stored = store.get("simulations/sim-1/values/2015-01-05").await.unwrap().unwrap();
        assert_eq!(stored["type"], json!("total"));
        assert_eq!(stored["value"], json!("920"));
    }

    #[tokio::test]
    async fn test_signal_before_bar_is_precondition_error() {
        let (mut portfolio, _) = portfolio("SPY", dec!(1000), dec!(200));
        let err = portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap_err();
        assert!(matches!(err, SimError::Precondition(_)));
    }

    #[tokio::test]
    async fn test_missing_close_is_precondition_error() {
        let (mut portfolio, _) = portfolio("SPY, QQQ", dec!(1000), dec!(200));
        portfolio.on_event(&bar(2, &[("SPY", "100")])).await.unwrap();
        let err = portfolio.on_event(&signal(2, &[("QQQ", 1)])).await.unwrap_err();
        assert!(matches!(err, SimError::Precondition(ref m) if m.contains("QQQ")));
    }

    #[tokio::test]
    async fn test_buy_below_one_share_is_skipped() {
        let (mut portfolio, _) = portfolio("SPY", dec!(250), dec!(200));
        portfolio.on_event(&bar(2, &[("SPY", "100")])).await.unwrap();
        portfolio.on_event(&signal(2, &[("SPY", 1)])).await.unwrap();
        assert!(portfolio.positions().is_empty());
        assert!(portfolio.trades().is_empty());
        assert_eq!(portfolio.cash(), dec!(250));
    }

    #[tokio::test]
    async fn test_solvency_over_churn() {
        let (mut portfolio, _) = portfolio("A, B, C", dec!(10000), dec!(200));
        let prices = ["10", "37", "8.5", "91", "55"];
        for (i, price) in prices.iter().enumerate() {
            let d = 2 + i as u32;
            portfolio
                .on_event(&bar(d, &[("A", price), ("B", "20"), ("C", "3.3")]))
                .await
                .unwrap();
            let level = (i % 2) as i64;
            portfolio
                .on_event(&signal(d, &[("A", 1 - level), ("B", level), ("C", 1)]))
                .await
                .unwrap();
            assert!(portfolio.cash() >= Decimal::ZERO);
            assert!(portfolio.positions().len() <= 3);
        }
    }
}
