//! Monthly rebalance filter

use crate::date::{first_on_or_after, next_month};
use chrono::{DateTime, NaiveDate, Utc};

/// Passes one bar per month, on or after a target day of month
///
/// The target starts at the first date on or after the simulation start
/// whose day matches, clamped to the month length. Each match moves the
/// target one calendar month forward from the previous target.
#[derive(Debug, Clone)]
pub struct MonthlyFilter {
    day: u32,
    target: Option<NaiveDate>,
}

impl MonthlyFilter {
    pub fn new(start: DateTime<Utc>, day: u32) -> Self {
        Self {
            day,
            target: first_on_or_after(start.date_naive(), day),
        }
    }

    /// Next date a bar is accepted on
    pub fn target(&self) -> Option<NaiveDate> {
        self.target
    }

    /// Whether the bar at `timestamp` is eligible
    pub fn accept(&mut self, timestamp: DateTime<Utc>) -> bool {
        match self.target {
            Some(target) if timestamp.date_naive() >= target => {
                self.target = next_month(target, self.day);
                true
            }
            _ => false,
        }
    }
}
