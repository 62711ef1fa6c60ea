//! Batch refresh of the configured tickers through the gateway.

use crate::gateway::{Gateway, ServedFrom};
use futures::future::join_all;
use tracing::{error, info, warn};

/// Period and interval used for the historical part of an ingest run.
pub const INGEST_PERIOD: &str = "5d";
pub const INGEST_INTERVAL: &str = "1d";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Tickers whose live quote was fetched and stored.
    pub saved: usize,
    pub total: usize,
    /// Tickers whose recent history was fetched and stored, when history
    /// was requested.
    pub history_saved: Option<usize>,
}

async fn ingest_quote(gateway: &Gateway, symbol: &str) -> bool {
    match gateway.quotes(&[symbol]).await {
        Ok(served) if served.source == ServedFrom::Upstream => {
            match served.value.tickers.first().and_then(|t| t.price) {
                Some(price) => {
                    info!(%symbol, price, "Saved quote");
                    true
                }
                None => {
                    warn!(%symbol, "No valid price data");
                    false
                }
            }
        }
        Ok(_) => {
            warn!(%symbol, "Upstream unavailable, quote not refreshed");
            false
        }
        Err(e) => {
            error!(%symbol, error = %e, "Error fetching quote");
            false
        }
    }
}

async fn ingest_history(gateway: &Gateway, symbol: &str) -> bool {
    match gateway
        .history(symbol, Some(INGEST_PERIOD), Some(INGEST_INTERVAL))
        .await
    {
        Ok(served) if served.source == ServedFrom::Fallback => {
            warn!(%symbol, "Upstream unavailable, history not refreshed");
            false
        }
        Ok(served) if served.source == ServedFrom::Cache => {
            info!(%symbol, "Stored history still fresh, nothing written");
            false
        }
        Ok(served) if served.value.data.is_empty() => {
            warn!(%symbol, "No historical data");
            false
        }
        Ok(served) => {
            info!(%symbol, rows = served.value.data.len(), "Saved historical data");
            true
        }
        Err(e) => {
            error!(%symbol, error = %e, "Error fetching historical data");
            false
        }
    }
}

/// Refreshes every ticker. Failures are counted per ticker and never stop
/// the batch. `on_progress` is called once per finished ticker flow.
pub async fn ingest(
    gateway: &Gateway,
    tickers: &[String],
    historical: bool,
    on_progress: &(dyn Fn() + Sync),
) -> IngestSummary {
    info!(?tickers, historical, "Ingestion started");

    let quotes = join_all(tickers.iter().map(|symbol| async move {
        let saved = ingest_quote(gateway, symbol).await;
        on_progress();
        saved
    }))
    .await;
    let saved = quotes.into_iter().filter(|saved| *saved).count();
    info!("Market data: {saved}/{} tickers saved", tickers.len());

    let history_saved = if historical {
        let results = join_all(tickers.iter().map(|symbol| async move {
            let saved = ingest_history(gateway, symbol).await;
            on_progress();
            saved
        }))
        .await;
        let count = results.into_iter().filter(|saved| *saved).count();
        info!("Historical data: {count}/{} tickers saved", tickers.len());
        Some(count)
    } else {
        None
    };

    IngestSummary {
        saved,
        total: tickers.len(),
        history_saved,
    }
}
