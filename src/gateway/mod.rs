//! Fetch orchestration.
//!
//! # Data Flow
//! ```text
//! request
//!     → normalize (symbol case, defaults, validation)
//!     → cache.rs (fresh series? answer from store, no upstream, no limiter)
//!     → limiter.rs (over budget? RateLimitExceeded)
//!     → breaker.rs → upstream source
//!         → success: persistence.rs (all backends, failures logged) → response
//!         → transient failure / circuit open: fallback.rs → degraded response
//!         → client error: UpstreamClient
//! ```

pub mod breaker;
pub mod cache;
pub mod fallback;
pub mod ingest;
pub mod limiter;
pub mod persistence;

use crate::core::config::{AppConfig, HISTORICAL, QUOTES, RateLimitConfig};
use crate::core::error::GatewayError;
use crate::core::query::{HistoryQuery, normalize_symbols};
use crate::core::response::{
    HistoricalResponse, OhlcData, QuotesResponse, TickerData, format_timestamp,
};
use crate::core::source::MarketDataSource;
use crate::providers::upstream::HttpMarketDataSource;
use crate::store::{Backend, open_backends};
use anyhow::{Result, bail};
use breaker::{CircuitBreaker, Outcome};
use cache::FreshnessCache;
use chrono::Utc;
use fallback::FallbackProvider;
use limiter::{FixedWindowLimiter, Limiter};
use persistence::{PersistenceManager, bar_records, quote_records};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Upstream,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub source: ServedFrom,
}

impl<T> Served<T> {
    fn new(value: T, source: ServedFrom) -> Self {
        Self { value, source }
    }
}

pub struct Gateway {
    source: Arc<dyn MarketDataSource>,
    cache: FreshnessCache,
    limiter: Arc<dyn Limiter>,
    quotes_breaker: CircuitBreaker,
    history_breaker: CircuitBreaker,
    persistence: PersistenceManager,
    fallback: FallbackProvider,
}

impl Gateway {
    /// Wires the gateway over the given backends. The first backend is the
    /// one the freshness cache and fallback read from.
    pub fn new(
        config: &AppConfig,
        source: Arc<dyn MarketDataSource>,
        backends: Vec<Backend>,
    ) -> Result<Self> {
        let Some(primary) = backends.first() else {
            bail!("at least one storage backend is required");
        };
        let cache = FreshnessCache::new(Arc::clone(&primary.store), config.freshness_window());
        let limiter = FixedWindowLimiter::new(
            config.rate_limits.clone().into_iter().collect(),
            RateLimitConfig::default(),
        );

        Ok(Self {
            source,
            fallback: FallbackProvider::new(cache.clone()),
            cache,
            limiter: Arc::new(limiter),
            quotes_breaker: CircuitBreaker::new(QUOTES, config.breaker(QUOTES)),
            history_breaker: CircuitBreaker::new(HISTORICAL, config.breaker(HISTORICAL)),
            persistence: PersistenceManager::new(backends),
        })
    }

    /// Production wiring: HTTP upstream plus the configured backends.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source = HttpMarketDataSource::new(&config.upstream)?;
        let backends = open_backends(config)?;
        Self::new(config, Arc::new(source), backends)
    }

    pub fn with_limiter(mut self, limiter: Arc<dyn Limiter>) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn quotes_breaker(&self) -> &CircuitBreaker {
        &self.quotes_breaker
    }

    pub fn history_breaker(&self) -> &CircuitBreaker {
        &self.history_breaker
    }

    fn admit(&self, limiter: &str) -> Result<(), GatewayError> {
        if self.limiter.try_acquire(limiter) {
            Ok(())
        } else {
            Err(GatewayError::RateLimitExceeded {
                limiter: limiter.to_string(),
            })
        }
    }

    /// Latest quotes for the given symbols. Quotes have no freshness window,
    /// so every admitted request goes upstream; stored quotes only back the
    /// fallback.
    pub async fn quotes<S: AsRef<str>>(
        &self,
        symbols: &[S],
    ) -> Result<Served<QuotesResponse>, GatewayError> {
        let symbols = normalize_symbols(symbols)?;
        info!(?symbols, "Fetching quotes");

        self.admit(QUOTES)?;

        let requested = &symbols;
        let outcome = self
            .quotes_breaker
            .execute(
                || self.source.fetch_quotes(requested),
                |cause| async move { self.fallback.degrade_quotes(requested, &cause).await },
            )
            .await?;

        match outcome {
            Outcome::Primary(mut response) => {
                response.tickers = response
                    .tickers
                    .into_iter()
                    .map(TickerData::sanitized)
                    .collect();
                let now = Utc::now();
                self.persistence
                    .commit(&quote_records(&response, now))
                    .await;
                Ok(Served::new(response, ServedFrom::Upstream))
            }
            Outcome::Degraded(response) => Ok(Served::new(response, ServedFrom::Fallback)),
        }
    }

    /// OHLC series for a symbol. Answered from the primary store while the
    /// stored series is fresh.
    pub async fn history(
        &self,
        symbol: &str,
        period: Option<&str>,
        interval: Option<&str>,
    ) -> Result<Served<HistoricalResponse>, GatewayError> {
        let query = HistoryQuery::new(symbol, period, interval)?;
        info!(
            symbol = %query.symbol,
            period = %query.period,
            interval = %query.interval,
            "Fetching historical data"
        );

        match self.cache.lookup(&query.key()).await {
            Ok(lookup) if lookup.is_fresh => {
                debug!(key = %query.key(), "Serving history from store");
                let response = HistoricalResponse {
                    symbol: query.symbol.clone(),
                    period: query.period.clone(),
                    interval: query.interval.clone(),
                    timestamp: format_timestamp(Utc::now()),
                    data: lookup.bars().into_iter().map(OhlcData::from).collect(),
                };
                return Ok(Served::new(response, ServedFrom::Cache));
            }
            Ok(_) => {}
            Err(e) => warn!(key = %query.key(), error = %e, "Cache lookup failed, treating as miss"),
        }

        self.admit(HISTORICAL)?;

        let requested = &query;
        let outcome = self
            .history_breaker
            .execute(
                || self.source.fetch_history(requested),
                |cause| async move { self.fallback.degrade_history(requested, &cause).await },
            )
            .await?;

        match outcome {
            Outcome::Primary(mut response) => {
                response.symbol = query.symbol.clone();
                response.period = query.period.clone();
                response.interval = query.interval.clone();
                self.persistence
                    .commit(&bar_records(&response, Utc::now()))
                    .await;
                Ok(Served::new(response, ServedFrom::Upstream))
            }
            Outcome::Degraded(response) => Ok(Served::new(response, ServedFrom::Fallback)),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::config::{BreakerConfig, RateLimitConfig};
    use crate::core::error::FetchError;
    use crate::core::record::{BarRecord, BarTime, CachedRecord, QuoteRecord};
    use crate::core::store::Store;
    use crate::gateway::breaker::BreakerState;
    use crate::gateway::persistence::tests::BrokenStore;
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Upstream double returning whatever it was last told to.
    pub(crate) struct FakeSource {
        pub(crate) calls: AtomicUsize,
        quotes: Mutex<Result<QuotesResponse, FetchError>>,
        history: Mutex<Result<HistoricalResponse, FetchError>>,
    }

    impl FakeSource {
        pub(crate) fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                quotes: Mutex::new(Err(FetchError::Connection("not scripted".into()))),
                history: Mutex::new(Err(FetchError::Connection("not scripted".into()))),
            }
        }

        pub(crate) fn set_quotes(&self, result: Result<QuotesResponse, FetchError>) {
            *self.quotes.lock().unwrap() = result;
        }

        pub(crate) fn set_history(&self, result: Result<HistoricalResponse, FetchError>) {
            *self.history.lock().unwrap() = result;
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataSource for FakeSource {
        async fn fetch_quotes(&self, _symbols: &[String]) -> Result<QuotesResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.quotes.lock().unwrap().clone()
        }

        async fn fetch_history(
            &self,
            _query: &HistoryQuery,
        ) -> Result<HistoricalResponse, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.history.lock().unwrap().clone()
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        let breaker = BreakerConfig {
            window_size: 5,
            failure_threshold: 3,
            cooldown_ms: 1_000,
            half_open_trials: 1,
        };
        config.circuit_breakers.insert(QUOTES.to_string(), breaker);
        config.circuit_breakers.insert(HISTORICAL.to_string(), breaker);
        config
    }

    fn gateway(source: &Arc<FakeSource>, stores: &[Arc<dyn Store>]) -> Gateway {
        let backends = stores
            .iter()
            .enumerate()
            .map(|(i, store)| Backend::new(&format!("backend-{i}"), Arc::clone(store)))
            .collect();
        Gateway::new(&config(), Arc::clone(source) as Arc<dyn MarketDataSource>, backends).unwrap()
    }

    fn spy_history(close: f64) -> HistoricalResponse {
        HistoricalResponse {
            symbol: "SPY".to_string(),
            period: "1mo".to_string(),
            interval: "1d".to_string(),
            timestamp: "2024-03-01 16:00:00".to_string(),
            data: vec![OhlcData {
                time: BarTime::Day(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
                open: close,
                high: close,
                low: close,
                close,
                volume: Some(100),
            }],
        }
    }

    fn stored_bar(close: f64, fetched_at: chrono::DateTime<Utc>) -> CachedRecord {
        CachedRecord::Bar(BarRecord {
            symbol: "SPY".to_string(),
            time: BarTime::Day(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            granularity: "1d".to_string(),
            open: close,
            high: close,
            low: close,
            close,
            volume: None,
            fetched_at,
        })
    }

    fn server_error() -> FetchError {
        FetchError::Server {
            status: 500,
            body: "boom".to_string(),
        }
    }

    struct DenyAll;

    impl Limiter for DenyAll {
        fn try_acquire(&self, _name: &str) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_fresh_series_skips_upstream_and_limiter() {
        let source = Arc::new(FakeSource::new());
        let store = MemoryStore::new();
        store.upsert(&stored_bar(500.0, Utc::now())).await.unwrap();
        let gateway = gateway(&source, &[Arc::new(store)]).with_limiter(Arc::new(DenyAll));

        let served = gateway.history("spy", None, None).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.value.symbol, "SPY");
        assert_eq!(served.value.data[0].close, 500.0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_stale_series_is_refetched_and_written_everywhere() {
        let source = Arc::new(FakeSource::new());
        source.set_history(Ok(spy_history(512.0)));
        let primary = MemoryStore::new();
        let replica = MemoryStore::new();
        primary
            .upsert(&stored_bar(500.0, Utc::now() - Duration::hours(2)))
            .await
            .unwrap();
        let gateway = gateway(&source, &[Arc::new(primary.clone()), Arc::new(replica.clone())]);

        let served = gateway.history("SPY", Some("1mo"), Some("1d")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Upstream);
        assert_eq!(served.value.data.len(), 1);
        assert_eq!(source.calls(), 1);
        assert_eq!(primary.bar_count().await, 2);
        assert_eq!(replica.bar_count().await, 1);

        // Now fresh: served without another upstream call
        let served = gateway.history("SPY", Some("1mo"), Some("1d")).await.unwrap();
        assert_eq!(served.source, ServedFrom::Cache);
        assert_eq!(served.value.data.len(), 2);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_request_fails_without_fallback() {
        let source = Arc::new(FakeSource::new());
        source.set_quotes(Err(server_error()));
        let gateway = gateway(&source, &[Arc::new(MemoryStore::new())]).with_limiter(Arc::new(
            FixedWindowLimiter::new(
                Default::default(),
                RateLimitConfig {
                    capacity: 1,
                    window_ms: 60_000,
                },
            ),
        ));

        assert!(gateway.quotes(&["SPY"]).await.is_ok());
        let err = gateway.quotes(&["SPY"]).await.unwrap_err();
        assert!(matches!(err, GatewayError::RateLimitExceeded { ref limiter } if limiter == "quotes"));
        assert_eq!(err.status_code(), 429);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_client_error_is_surfaced() {
        let source = Arc::new(FakeSource::new());
        source.set_history(Err(FetchError::Client {
            status: 404,
            body: "No data available for ZZZZ".to_string(),
        }));
        let gateway = gateway(&source, &[Arc::new(MemoryStore::new())]);

        let err = gateway.history("ZZZZ", None, None).await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamClient { status: 404, .. }));
        assert_eq!(gateway.history_breaker().state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_upstream() {
        let source = Arc::new(FakeSource::new());
        let gateway = gateway(&source, &[Arc::new(MemoryStore::new())]);

        assert!(matches!(
            gateway.history("SPY", Some("2w"), None).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            gateway.quotes::<&str>(&[]).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_breaker_cycle_through_gateway() {
        let source = Arc::new(FakeSource::new());
        source.set_history(Err(server_error()));
        let store = MemoryStore::new();
        store
            .upsert(&stored_bar(480.0, Utc::now() - Duration::days(1)))
            .await
            .unwrap();
        let gateway = gateway(&source, &[Arc::new(store)]);

        for _ in 0..3 {
            let served = gateway.history("SPY", None, None).await.unwrap();
            assert_eq!(served.source, ServedFrom::Fallback);
            // Stale rows rather than an empty series
            assert_eq!(served.value.data[0].close, 480.0);
        }
        assert_eq!(gateway.history_breaker().state(), BreakerState::Open);
        assert_eq!(source.calls(), 3);

        // Open: answered by the fallback without contacting upstream
        let served = gateway.history("SPY", None, None).await.unwrap();
        assert_eq!(served.source, ServedFrom::Fallback);
        assert_eq!(source.calls(), 3);

        // Half-open trial fails and reopens
        tokio::time::advance(std::time::Duration::from_millis(1_000)).await;
        gateway.history("SPY", None, None).await.unwrap();
        assert_eq!(source.calls(), 4);
        assert_eq!(gateway.history_breaker().state(), BreakerState::Open);

        // Next trial succeeds and closes
        source.set_history(Ok(spy_history(515.0)));
        tokio::time::advance(std::time::Duration::from_millis(1_000)).await;
        let served = gateway.history("SPY", None, None).await.unwrap();
        assert_eq!(served.source, ServedFrom::Upstream);
        assert_eq!(source.calls(), 5);
        assert_eq!(gateway.history_breaker().state(), BreakerState::Closed);
        // Quotes circuit never saw any of this
        assert_eq!(gateway.quotes_breaker().state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_degrades_quotes_per_symbol() {
        let source = Arc::new(FakeSource::new());
        source.set_quotes(Err(FetchError::Connection("connection refused".into())));
        let store = MemoryStore::new();
        store
            .upsert(&CachedRecord::Quote(QuoteRecord {
                symbol: "AAPL".to_string(),
                price: Some(189.3),
                volume: Some(1_000),
                observed_at: Utc::now() - Duration::hours(6),
            }))
            .await
            .unwrap();
        let gateway = gateway(&source, &[Arc::new(store)]);

        let served = gateway.quotes(&["aapl", "ZZZZ"]).await.unwrap();
        assert_eq!(served.source, ServedFrom::Fallback);
        let tickers = served.value.tickers;
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].symbol, "AAPL");
        assert_eq!(tickers[0].price, Some(189.3));
        assert_eq!(tickers[1], TickerData::unavailable("ZZZZ"));
    }

    #[tokio::test]
    async fn test_failing_primary_backend_does_not_fail_request() {
        let source = Arc::new(FakeSource::new());
        source.set_quotes(Ok(QuotesResponse {
            timestamp: "2024-03-01 16:00:00".to_string(),
            tickers: vec![TickerData {
                symbol: "spy".to_string(),
                price: Some(511.0),
                volume: Some(10),
            }],
        }));
        let replica = MemoryStore::new();
        let gateway = gateway(&source, &[Arc::new(BrokenStore), Arc::new(replica.clone())]);

        let served = gateway.quotes(&["SPY"]).await.unwrap();
        assert_eq!(served.source, ServedFrom::Upstream);
        assert_eq!(served.value.tickers[0].symbol, "SPY");
        assert_eq!(replica.quote_count("SPY").await, 1);
    }

    #[test]
    fn test_gateway_requires_a_backend() {
        let source: Arc<dyn MarketDataSource> = Arc::new(FakeSource::new());
        assert!(Gateway::new(&config(), source, Vec::new()).is_err());
    }
}
