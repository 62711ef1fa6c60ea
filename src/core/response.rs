//! Wire shapes shared by the upstream service and gateway callers.

use crate::core::record::{BarRecord, BarTime, QuoteRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Rewrites the bare `NaN`, `Infinity` and `-Infinity` tokens that some JSON
/// encoders emit for missing numbers into `null`. String contents are left
/// untouched.
pub fn null_non_finite(body: &str) -> Cow<'_, str> {
    const TOKENS: [&str; 3] = ["-Infinity", "Infinity", "NaN"];
    if !TOKENS.iter().any(|token| body.contains(token)) {
        return Cow::Borrowed(body);
    }

    let mut out = String::with_capacity(body.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = body;
    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some(token) = TOKENS.iter().find(|token| rest.starts_with(**token)) {
            out.push_str("null");
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(out)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerData {
    pub symbol: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub volume: Option<i64>,
}

impl TickerData {
    pub fn unavailable(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            price: None,
            volume: None,
        }
    }

    /// Drops values that cannot be a real observation.
    pub fn sanitized(self) -> Self {
        Self {
            symbol: self.symbol.trim().to_uppercase(),
            price: self.price.filter(|p| p.is_finite() && *p >= 0.0),
            volume: self.volume.filter(|v| *v >= 0),
        }
    }
}

impl From<&QuoteRecord> for TickerData {
    fn from(record: &QuoteRecord) -> Self {
        Self {
            symbol: record.symbol.clone(),
            price: record.price,
            volume: record.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotesResponse {
    pub timestamp: String,
    #[serde(default)]
    pub tickers: Vec<TickerData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcData {
    pub time: BarTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<i64>,
}

impl From<&BarRecord> for OhlcData {
    fn from(record: &BarRecord) -> Self {
        Self {
            time: record.time,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalResponse {
    pub symbol: String,
    pub period: String,
    pub interval: String,
    pub timestamp: String,
    #[serde(default)]
    pub data: Vec<OhlcData>,
}

#[derive(Debug, Serialize)]
pub struct QuotesRequest<'a> {
    pub tickers: &'a [String],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_drops_invalid_values() {
        let ticker = TickerData {
            symbol: " spy".to_string(),
            price: Some(f64::NAN),
            volume: Some(-1),
        }
        .sanitized();
        assert_eq!(ticker, TickerData::unavailable("SPY"));

        let ticker = TickerData {
            symbol: "SPY".to_string(),
            price: Some(512.3),
            volume: Some(1_000),
        }
        .sanitized();
        assert_eq!(ticker.price, Some(512.3));
        assert_eq!(ticker.volume, Some(1_000));
    }

    #[test]
    fn test_non_finite_tokens_become_null() {
        let body = r#"{"tickers":[{"symbol":"SPY","price":512.1},{"symbol":"ES=F","price":NaN,"volume":-Infinity},{"symbol":"NaN \"Infinity\"","price":Infinity}]}"#;
        let response: QuotesResponse = serde_json::from_str(&null_non_finite(body)).unwrap();

        assert_eq!(response.tickers[0].price, Some(512.1));
        assert_eq!(response.tickers[1].price, None);
        assert_eq!(response.tickers[1].volume, None);
        // Inside strings the tokens are data
        assert_eq!(response.tickers[2].symbol, r#"NaN "Infinity""#);
        assert_eq!(response.tickers[2].price, None);
    }

    #[test]
    fn test_finite_body_is_borrowed() {
        let body = r#"{"timestamp":"2024-03-01 16:00:00","tickers":[]}"#;
        assert!(matches!(null_non_finite(body), Cow::Borrowed(_)));
    }

    #[test]
    fn test_quotes_response_serializes_nulls() {
        let response = QuotesResponse {
            timestamp: "2024-03-01 16:00:00".to_string(),
            tickers: vec![TickerData::unavailable("ZZZZ")],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["tickers"][0]["symbol"], "ZZZZ");
        assert!(json["tickers"][0]["price"].is_null());
        assert!(json["tickers"][0]["volume"].is_null());
    }

    #[test]
    fn test_historical_response_parses_upstream_payload() {
        let body = r#"{
            "symbol": "SPY",
            "period": "5d",
            "interval": "1d",
            "timestamp": "2024-03-01 16:00:00",
            "data": [
                {"time": "2024-02-29", "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 100}
            ]
        }"#;
        let response: HistoricalResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.data.len(), 1);
        assert_eq!(response.data[0].time.to_string(), "2024-02-29");
    }
}
