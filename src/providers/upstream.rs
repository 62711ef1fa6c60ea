use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::core::config::UpstreamConfig;
use crate::core::error::FetchError;
use crate::core::query::HistoryQuery;
use crate::core::response::{
    HistoricalResponse, QuotesRequest, QuotesResponse, null_non_finite,
};
use crate::core::source::MarketDataSource;

/// HTTP client for the upstream market data functions.
pub struct HttpMarketDataSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpMarketDataSource {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("marketgate/0.1")
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Connection(format!("timed out: {err}"))
    } else {
        FetchError::Connection(err.to_string())
    }
}

/// Maps an HTTP exchange to a typed outcome.
async fn classify<T: DeserializeOwned>(response: Response) -> Result<T, FetchError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_client_error() {
        return Err(FetchError::Client {
            status: status.as_u16(),
            body,
        });
    }
    if !status.is_success() {
        return Err(FetchError::Server {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&null_non_finite(&body)).map_err(|e| FetchError::Server {
        status: StatusCode::OK.as_u16(),
        body: format!("malformed payload: {e}"),
    })
}

#[async_trait]
impl MarketDataSource for HttpMarketDataSource {
    #[instrument(name = "UpstreamQuotesFetch", skip(self), fields(count = symbols.len()))]
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<QuotesResponse, FetchError> {
        let url = format!("{}/MarketDataFunction", self.base_url);
        debug!("Requesting quotes from {}", url);

        let response = self
            .client
            .post(&url)
            .json(&QuotesRequest { tickers: symbols })
            .send()
            .await
            .map_err(transport_error)?;

        classify(response).await
    }

    #[instrument(
        name = "UpstreamHistoryFetch",
        skip(self),
        fields(symbol = %query.symbol, period = %query.period, interval = %query.interval)
    )]
    async fn fetch_history(&self, query: &HistoryQuery) -> Result<HistoricalResponse, FetchError> {
        let url = Url::parse_with_params(
            &format!("{}/HistoricalDataFunction", self.base_url),
            &[
                ("symbol", query.symbol.as_str()),
                ("period", query.period.as_str()),
                ("interval", query.interval.as_str()),
            ],
        )
        .map_err(|e| FetchError::Connection(format!("invalid upstream url: {e}")))?;
        debug!("Requesting historical data from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(transport_error)?;

        classify(response).await
    }
}
