use crate::core::error::StorageError;
use crate::core::record::{BarRecord, BarTime, QuoteRecord};
use crate::core::store::Store;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type BarKey = (String, String, BarTime);

#[derive(Default)]
struct Tables {
    bars: BTreeMap<BarKey, BarRecord>,
    quotes: HashMap<String, Vec<QuoteRecord>>,
}

/// Volatile store backed by ordered maps behind a single lock.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored bars across all symbols.
    pub async fn bar_count(&self) -> usize {
        self.inner.lock().await.bars.len()
    }

    /// Number of quote observations logged for a symbol.
    pub async fn quote_count(&self, symbol: &str) -> usize {
        self.inner
            .lock()
            .await
            .quotes
            .get(symbol)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_bar(&self, record: &BarRecord) -> Result<(), StorageError> {
        let key = (
            record.symbol.clone(),
            record.granularity.clone(),
            record.time,
        );
        let mut tables = self.inner.lock().await;
        debug!(symbol = %record.symbol, time = %record.time, "Memory UPSERT bar");
        tables.bars.insert(key, record.clone());
        Ok(())
    }

    async fn insert_quote(&self, record: &QuoteRecord) -> Result<(), StorageError> {
        let mut tables = self.inner.lock().await;
        debug!(symbol = %record.symbol, "Memory INSERT quote");
        tables
            .quotes
            .entry(record.symbol.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn find_bars(
        &self,
        symbol: &str,
        granularity: &str,
    ) -> Result<Vec<BarRecord>, StorageError> {
        let tables = self.inner.lock().await;
        let mut bars: Vec<BarRecord> = tables
            .bars
            .iter()
            .filter(|((s, g, _), _)| s == symbol && g == granularity)
            .map(|(_, bar)| bar.clone())
            .collect();
        bars.sort_by_key(|bar| bar.time);
        Ok(bars)
    }

    async fn find_bar(
        &self,
        symbol: &str,
        time: &BarTime,
        granularity: &str,
    ) -> Result<Option<BarRecord>, StorageError> {
        let tables = self.inner.lock().await;
        let key = (symbol.to_string(), granularity.to_string(), *time);
        Ok(tables.bars.get(&key).cloned())
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Option<QuoteRecord>, StorageError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .quotes
            .get(symbol)
            .and_then(|log| log.iter().max_by_key(|q| q.observed_at))
            .cloned())
    }

    async fn latest_priced_quote(
        &self,
        symbol: &str,
    ) -> Result<Option<QuoteRecord>, StorageError> {
        let tables = self.inner.lock().await;
        Ok(tables
            .quotes
            .get(symbol)
            .and_then(|log| {
                log.iter()
                    .filter(|q| q.price.is_some())
                    .max_by_key(|q| q.observed_at)
            })
            .cloned())
    }
}
