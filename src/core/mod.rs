//! Core gateway abstractions

pub mod config;
pub mod error;
pub mod log;
pub mod query;
pub mod record;
pub mod response;
pub mod source;
pub mod store;

// Re-export main types for cleaner imports
pub use error::{FetchError, GatewayError, StorageError};
pub use query::{HistoryQuery, QueryKey, QueryRange};
pub use record::{BarRecord, BarTime, CachedRecord, QuoteRecord};
pub use response::{HistoricalResponse, OhlcData, QuotesResponse, TickerData};
pub use source::MarketDataSource;
pub use store::Store;
