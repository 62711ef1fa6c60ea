//! Best-effort write-through of fetched results to every storage backend.
//!
//! Backends are written concurrently and independently. A failing backend
//! is logged and counted in the report, it never stops the others and never
//! fails the request that produced the data.

use crate::core::record::{BarRecord, CachedRecord, QuoteRecord};
use crate::core::response::{HistoricalResponse, QuotesResponse};
use crate::store::Backend;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReport {
    pub backend: String,
    pub written: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub backends: Vec<BackendReport>,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.backends.iter().all(|b| b.failed == 0)
    }

    pub fn backend(&self, name: &str) -> Option<&BackendReport> {
        self.backends.iter().find(|b| b.backend == name)
    }
}

/// One quote observation per ticker, including those upstream had no price for.
pub fn quote_records(response: &QuotesResponse, observed_at: DateTime<Utc>) -> Vec<CachedRecord> {
    response
        .tickers
        .iter()
        .map(|ticker| {
            CachedRecord::Quote(QuoteRecord {
                symbol: ticker.symbol.to_uppercase(),
                price: ticker.price,
                volume: ticker.volume,
                observed_at,
            })
        })
        .collect()
}

pub fn bar_records(response: &HistoricalResponse, fetched_at: DateTime<Utc>) -> Vec<CachedRecord> {
    let symbol = response.symbol.to_uppercase();
    response
        .data
        .iter()
        .map(|ohlc| {
            CachedRecord::Bar(BarRecord {
                symbol: symbol.clone(),
                time: ohlc.time,
                granularity: response.interval.clone(),
                open: ohlc.open,
                high: ohlc.high,
                low: ohlc.low,
                close: ohlc.close,
                volume: ohlc.volume,
                fetched_at,
            })
        })
        .collect()
}

pub struct PersistenceManager {
    backends: Vec<Backend>,
}

impl PersistenceManager {
    pub fn new(backends: Vec<Backend>) -> Self {
        Self { backends }
    }

    async fn write_backend(backend: &Backend, records: &[CachedRecord]) -> BackendReport {
        let mut report = BackendReport {
            backend: backend.name.clone(),
            written: 0,
            failed: 0,
        };
        for record in records {
            // Each backend gets its own copy of the record
            let scoped = record.clone();
            match backend.store.upsert(&scoped).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    let symbol = match &scoped {
                        CachedRecord::Quote(q) => &q.symbol,
                        CachedRecord::Bar(b) => &b.symbol,
                    };
                    error!(backend = %backend.name, %symbol, error = %e, "Failed to persist record");
                }
            }
        }
        report
    }

    pub async fn commit(&self, records: &[CachedRecord]) -> CommitReport {
        if records.is_empty() {
            return CommitReport::default();
        }

        let backends = join_all(
            self.backends
                .iter()
                .map(|backend| Self::write_backend(backend, records)),
        )
        .await;

        for report in &backends {
            info!(
                backend = %report.backend,
                written = report.written,
                failed = report.failed,
                "Committed records"
            );
        }
        CommitReport { backends }
    }
}
