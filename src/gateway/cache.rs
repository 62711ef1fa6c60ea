use crate::core::error::StorageError;
use crate::core::query::QueryKey;
use crate::core::record::{BarRecord, CachedRecord, QuoteRecord};
use crate::core::store::Store;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct CacheLookup {
    pub records: Vec<CachedRecord>,
    pub is_fresh: bool,
}

impl CacheLookup {
    pub fn bars(&self) -> Vec<&BarRecord> {
        self.records
            .iter()
            .filter_map(|r| match r {
                CachedRecord::Bar(bar) => Some(bar),
                CachedRecord::Quote(_) => None,
            })
            .collect()
    }

    pub fn quote(&self) -> Option<&QuoteRecord> {
        self.records.iter().find_map(|r| match r {
            CachedRecord::Quote(quote) => Some(quote),
            CachedRecord::Bar(_) => None,
        })
    }
}

/// Read-through view over the primary store that knows when stored data
/// is recent enough to skip upstream.
#[derive(Clone)]
pub struct FreshnessCache {
    store: Arc<dyn Store>,
    window: Duration,
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn Store>, window: Duration) -> Self {
        Self { store, window }
    }

    /// Bar series are fresh when the newest `fetched_at` is inside the
    /// window. Quotes are never fresh; the latest one is returned for
    /// fallback use, preferring the latest one that carried a price.
    pub async fn lookup(&self, key: &QueryKey) -> Result<CacheLookup, StorageError> {
        if key.is_quote() {
            let latest = match self.store.latest_priced_quote(&key.symbol).await? {
                Some(quote) => Some(quote),
                None => self.store.latest_quote(&key.symbol).await?,
            };
            let records: Vec<CachedRecord> = latest
                .into_iter()
                .map(CachedRecord::Quote)
                .collect();
            return Ok(CacheLookup {
                records,
                is_fresh: false,
            });
        }

        let bars = self.store.find_bars(&key.symbol, &key.granularity).await?;
        let now = Utc::now();
        let is_fresh = bars
            .iter()
            .map(|bar| bar.fetched_at)
            .max()
            .is_some_and(|latest| now.signed_duration_since(latest) < self.window);
        debug!(key = %key, rows = bars.len(), is_fresh, "Cache lookup");

        Ok(CacheLookup {
            records: bars.into_iter().map(CachedRecord::Bar).collect(),
            is_fresh,
        })
    }

    pub async fn upsert(&self, record: &CachedRecord) -> Result<(), StorageError> {
        self.store.upsert(record).await
    }
}
