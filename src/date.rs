//! Calendar-key helpers
//!
//! Every store path that is keyed by day uses the `YYYY-MM-DD` form of the
//! UTC date, so lexicographic key order is also chronological order.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};

/// Format of a calendar key
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar key for an instant (UTC day)
pub fn to_date_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format(DATE_KEY_FORMAT).to_string()
}

/// Parse a calendar key back into midnight UTC of that day
pub fn parse_date_key(key: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(key, DATE_KEY_FORMAT)
        .ok()
        .map(start_of_day)
}

/// Midnight UTC of the given date
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// The `day`-th day of a month, clamped to the month's last day
pub fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let mut candidate = day.clamp(1, 31);
    while candidate >= 1 {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, candidate) {
            return Some(date);
        }
        candidate -= 1;
    }
    None
}

/// The target day of the month following `date`'s month
pub fn next_month(date: NaiveDate, day: u32) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    clamped_day(year, month, day)
}

/// First date on or after `from` that falls on the target day of its month
pub fn first_on_or_after(from: NaiveDate, day: u32) -> Option<NaiveDate> {
    let this_month = clamped_day(from.year(), from.month(), day)?;
    if this_month >= from {
        Some(this_month)
    } else {
        next_month(from, day)
    }
}
