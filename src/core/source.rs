//! Upstream market data source abstraction

use crate::core::error::FetchError;
use crate::core::query::HistoryQuery;
use crate::core::response::{HistoricalResponse, QuotesResponse};
use async_trait::async_trait;

/// One outbound call per invocation. Implementations never retry.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<QuotesResponse, FetchError>;

    async fn fetch_history(&self, query: &HistoryQuery) -> Result<HistoricalResponse, FetchError>;
}
