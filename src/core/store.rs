//! Storage backend abstraction

use crate::core::error::StorageError;
use crate::core::record::{BarRecord, BarTime, CachedRecord, QuoteRecord};
use async_trait::async_trait;

#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or overwrites the bar identified by `(symbol, time, granularity)`.
    async fn upsert_bar(&self, record: &BarRecord) -> Result<(), StorageError>;

    /// Appends a quote observation.
    async fn insert_quote(&self, record: &QuoteRecord) -> Result<(), StorageError>;

    /// All bars for a symbol and granularity, ordered by time ascending.
    async fn find_bars(
        &self,
        symbol: &str,
        granularity: &str,
    ) -> Result<Vec<BarRecord>, StorageError>;

    async fn find_bar(
        &self,
        symbol: &str,
        time: &BarTime,
        granularity: &str,
    ) -> Result<Option<BarRecord>, StorageError>;

    /// The quote with the greatest `observed_at` for a symbol.
    async fn latest_quote(&self, symbol: &str) -> Result<Option<QuoteRecord>, StorageError>;

    /// Like `latest_quote`, skipping observations without a price.
    async fn latest_priced_quote(&self, symbol: &str)
    -> Result<Option<QuoteRecord>, StorageError>;

    async fn upsert(&self, record: &CachedRecord) -> Result<(), StorageError> {
        match record {
            CachedRecord::Bar(bar) => self.upsert_bar(bar).await,
            CachedRecord::Quote(quote) => self.insert_quote(quote).await,
        }
    }
}
