//! Query keys and inbound request normalization.

use crate::core::error::GatewayError;
use std::fmt::Display;

pub const VALID_PERIODS: &[&str] = &[
    "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
];
pub const VALID_INTERVALS: &[&str] = &[
    "1m", "2m", "5m", "15m", "30m", "60m", "90m", "1h", "1d", "5d", "1wk", "1mo", "3mo",
];

pub const DEFAULT_PERIOD: &str = "1mo";
pub const DEFAULT_INTERVAL: &str = "1d";

/// Granularity used for real-time quote keys.
pub const QUOTE_GRANULARITY: &str = "quote";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryRange {
    Latest,
    Series { period: String, interval: String },
}

/// Normalized identifier of a requested data series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub symbol: String,
    pub granularity: String,
    pub range: QueryRange,
}

impl QueryKey {
    pub fn quote(symbol: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            granularity: QUOTE_GRANULARITY.to_string(),
            range: QueryRange::Latest,
        }
    }

    pub fn series(symbol: &str, period: &str, interval: &str) -> Self {
        Self {
            symbol: normalize_symbol(symbol),
            granularity: interval.to_string(),
            range: QueryRange::Series {
                period: period.to_string(),
                interval: interval.to_string(),
            },
        }
    }

    pub fn is_quote(&self) -> bool {
        self.range == QueryRange::Latest
    }
}

impl Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.range {
            QueryRange::Latest => write!(f, "{}-latest", self.symbol),
            QueryRange::Series { period, interval } => {
                write!(f, "{}-{}-{}", self.symbol, period, interval)
            }
        }
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Upper-cases, drops blanks and de-duplicates while keeping request order.
pub fn normalize_symbols<S: AsRef<str>>(symbols: &[S]) -> Result<Vec<String>, GatewayError> {
    let mut normalized: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let symbol = normalize_symbol(symbol.as_ref());
        if !symbol.is_empty() && !normalized.contains(&symbol) {
            normalized.push(symbol);
        }
    }
    if normalized.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "at least one symbol is required".to_string(),
        ));
    }
    Ok(normalized)
}

/// A validated historical series request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub symbol: String,
    pub period: String,
    pub interval: String,
}

impl HistoryQuery {
    pub fn new(
        symbol: &str,
        period: Option<&str>,
        interval: Option<&str>,
    ) -> Result<Self, GatewayError> {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "symbol parameter is required".to_string(),
            ));
        }

        let period = period.map(str::trim).unwrap_or(DEFAULT_PERIOD);
        if !VALID_PERIODS.contains(&period) {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid period '{period}', must be one of: {}",
                VALID_PERIODS.join(", ")
            )));
        }

        let interval = interval.map(str::trim).unwrap_or(DEFAULT_INTERVAL);
        if !VALID_INTERVALS.contains(&interval) {
            return Err(GatewayError::InvalidRequest(format!(
                "invalid interval '{interval}', must be one of: {}",
                VALID_INTERVALS.join(", ")
            )));
        }

        Ok(Self {
            symbol,
            period: period.to_string(),
            interval: interval.to_string(),
        })
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::series(&self.symbol, &self.period, &self.interval)
    }
}
