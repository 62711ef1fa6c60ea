//! Records persisted by the storage backends.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Observation time of a bar as emitted by upstream: a calendar date for
/// daily and coarser intervals, Unix seconds for intraday ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BarTime {
    Day(NaiveDate),
    Epoch(i64),
}

impl BarTime {
    /// Lexicographically sortable form used in storage keys.
    pub fn sort_key(&self) -> String {
        match self {
            BarTime::Day(date) => date.format("%Y-%m-%d").to_string(),
            BarTime::Epoch(secs) => format!("{secs:020}"),
        }
    }
}

impl Display for BarTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarTime::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            BarTime::Epoch(secs) => write!(f, "{secs}"),
        }
    }
}

/// Latest-price observation for one symbol. Stored append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub symbol: String,
    pub price: Option<f64>,
    pub volume: Option<i64>,
    pub observed_at: DateTime<Utc>,
}

/// One OHLC bar, unique per `(symbol, time, granularity)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    pub symbol: String,
    pub time: BarTime,
    pub granularity: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<i64>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedRecord {
    Quote(QuoteRecord),
    Bar(BarRecord),
}
