use crate::core::error::GatewayError;
use crate::core::query::{HistoryQuery, QueryKey};
use crate::core::response::{
    HistoricalResponse, OhlcData, QuotesResponse, TickerData, format_timestamp,
};
use crate::gateway::cache::FreshnessCache;
use chrono::Utc;
use tracing::{info, warn};

/// Answers from stored data when upstream cannot. Never fails: storage
/// errors degrade to an empty result.
#[derive(Clone)]
pub struct FallbackProvider {
    cache: FreshnessCache,
}

impl FallbackProvider {
    pub fn new(cache: FreshnessCache) -> Self {
        Self { cache }
    }

    /// One entry per requested symbol, carrying the latest stored price or null.
    pub async fn degrade_quotes(&self, symbols: &[String], cause: &GatewayError) -> QuotesResponse {
        warn!(?symbols, reason = %cause, "Serving fallback quotes");

        let mut tickers = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let ticker = match self.cache.lookup(&QueryKey::quote(symbol)).await {
                Ok(lookup) => lookup
                    .quote()
                    .map_or_else(|| TickerData::unavailable(symbol), TickerData::from),
                Err(e) => {
                    warn!(%symbol, error = %e, "Stored quote unavailable");
                    TickerData::unavailable(symbol)
                }
            };
            tickers.push(ticker);
        }

        QuotesResponse {
            timestamp: format_timestamp(Utc::now()),
            tickers,
        }
    }

    /// The stored series even if stale, otherwise an empty one.
    pub async fn degrade_history(
        &self,
        query: &HistoryQuery,
        cause: &GatewayError,
    ) -> HistoricalResponse {
        warn!(symbol = %query.symbol, reason = %cause, "Serving fallback history");

        let data = match self.cache.lookup(&query.key()).await {
            Ok(lookup) => lookup.bars().into_iter().map(OhlcData::from).collect(),
            Err(e) => {
                warn!(symbol = %query.symbol, error = %e, "Stored history unavailable");
                Vec::new()
            }
        };
        if !data.is_empty() {
            info!(symbol = %query.symbol, rows = data.len(), "Returning stale history");
        }

        HistoricalResponse {
            symbol: query.symbol.clone(),
            period: query.period.clone(),
            interval: query.interval.clone(),
            timestamp: format_timestamp(Utc::now()),
            data,
        }
    }
}
