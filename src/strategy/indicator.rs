//! Rolling price indicators

use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

/// Per-symbol bounded FIFO of closing prices
#[derive(Debug, Clone)]
pub struct PriceWindow {
    capacity: usize,
    windows: HashMap<String, VecDeque<Decimal>>,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a close; returns the window once it holds `capacity` values
    pub fn push(&mut self, symbol: &str, close: Decimal) -> Option<&VecDeque<Decimal>> {
        let window = self
            .windows
            .entry(symbol.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.capacity));
        if window.len() == self.capacity {
            window.pop_front();
        }
        window.push_back(close);

        (window.len() == self.capacity).then_some(&*window)
    }

    /// Observations currently held for a symbol
    pub fn len(&self, symbol: &str) -> usize {
        self.windows.get(symbol).map_or(0, VecDeque::len)
    }
}

/// Trait for per-symbol streaming indicators
pub trait Indicator {
    /// Feed a close; returns the indicator value once the window is full
    fn update(&mut self, symbol: &str, close: Decimal) -> Option<Decimal>;
}

/// Simple moving average
#[derive(Debug, Clone)]
pub struct Sma {
    window: PriceWindow,
}

impl Sma {
    pub fn new(length: usize) -> Self {
        Self {
            window: PriceWindow::new(length),
        }
    }
}

impl Indicator for Sma {
    fn update(&mut self, symbol: &str, close: Decimal) -> Option<Decimal> {
        let window = self.window.push(symbol, close)?;
        let sum: Decimal = window.iter().sum();
        Some(sum / Decimal::from(window.len()))
    }
}

/// Rate of change between the oldest and newest close in the window
#[derive(Debug, Clone)]
pub struct Momentum {
    window: PriceWindow,
}

impl Momentum {
    pub fn new(length: usize) -> Self {
        Self {
            window: PriceWindow::new(length),
        }
    }
}

impl Indicator for Momentum {
    fn update(&mut self, symbol: &str, close: Decimal) -> Option<Decimal> {
        let window = self.window.push(symbol, close)?;
        let oldest = *window.front()?;
        let newest = *window.back()?;
        if oldest.is_zero() {
            return Some(Decimal::ZERO);
        }
        Some((newest - oldest) / oldest)
    }
}
