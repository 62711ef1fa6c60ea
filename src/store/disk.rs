use crate::core::error::StorageError;
use crate::core::record::{BarRecord, BarTime, QuoteRecord};
use crate::core::store::Store;
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

const SEP: char = '\0';

fn bar_prefix(symbol: &str, granularity: &str) -> String {
    format!("{symbol}{SEP}{granularity}{SEP}")
}

fn bar_key(symbol: &str, granularity: &str, time: &BarTime) -> String {
    format!("{}{}", bar_prefix(symbol, granularity), time.sort_key())
}

fn quote_prefix(symbol: &str) -> String {
    format!("{symbol}{SEP}")
}

/// Persistent store on an fjall keyspace with one partition per record kind.
pub struct DiskStore {
    keyspace: Keyspace,
    bars: PartitionHandle,
    quotes: PartitionHandle,
    seq: AtomicU64,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;

        let keyspace = Config::new(path).open()?;
        let bars = keyspace.open_partition("bars", PartitionCreateOptions::default())?;
        let quotes = keyspace.open_partition("quotes", PartitionCreateOptions::default())?;
        debug!("Opened disk store at {}", path.display());

        Ok(Self {
            keyspace,
            bars,
            quotes,
            seq: AtomicU64::new(0),
        })
    }
}

impl Drop for DiskStore {
    fn drop(&mut self) {
        // Journal writes are buffered; make them durable before the handles go
        if let Err(e) = self.keyspace.persist(PersistMode::SyncAll) {
            warn!(error = %e, "Failed to flush disk store on close");
        }
    }
}

#[async_trait]
impl Store for DiskStore {
    async fn upsert_bar(&self, record: &BarRecord) -> Result<(), StorageError> {
        let key = bar_key(&record.symbol, &record.granularity, &record.time);
        self.bars.insert(key, serde_json::to_vec(record)?)?;
        debug!(symbol = %record.symbol, time = %record.time, "Disk UPSERT bar");
        Ok(())
    }

    async fn insert_quote(&self, record: &QuoteRecord) -> Result<(), StorageError> {
        // Sequence suffix keeps same-instant observations from overwriting each other
        let micros = record.observed_at.timestamp_micros().max(0);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = format!("{}{micros:020}{SEP}{seq:020}", quote_prefix(&record.symbol));
        self.quotes.insert(key, serde_json::to_vec(record)?)?;
        debug!(symbol = %record.symbol, "Disk INSERT quote");
        Ok(())
    }

    async fn find_bars(
        &self,
        symbol: &str,
        granularity: &str,
    ) -> Result<Vec<BarRecord>, StorageError> {
        let mut bars = Vec::new();
        for item in self.bars.prefix(bar_prefix(symbol, granularity)) {
            let (_, value) = item?;
            bars.push(serde_json::from_slice::<BarRecord>(&value)?);
        }
        Ok(bars)
    }

    async fn find_bar(
        &self,
        symbol: &str,
        time: &BarTime,
        granularity: &str,
    ) -> Result<Option<BarRecord>, StorageError> {
        match self.bars.get(bar_key(symbol, granularity, time))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    async fn latest_quote(&self, symbol: &str) -> Result<Option<QuoteRecord>, StorageError> {
        match self.quotes.prefix(quote_prefix(symbol)).next_back() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(serde_json::from_slice(&value)?))
            }
            None => Ok(None),
        }
    }

    async fn latest_priced_quote(
        &self,
        symbol: &str,
    ) -> Result<Option<QuoteRecord>, StorageError> {
        for item in self.quotes.prefix(quote_prefix(symbol)).rev() {
            let (_, value) = item?;
            let quote: QuoteRecord = serde_json::from_slice(&value)?;
            if quote.price.is_some() {
                return Ok(Some(quote));
            }
        }
        Ok(None)
    }
}
