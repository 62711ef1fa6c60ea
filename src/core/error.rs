//! Error taxonomy shared by the gateway components.

use thiserror::Error;

/// Outcome classification for a failed upstream call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// 4xx from upstream. Caller-caused, never counted against a circuit.
    #[error("upstream rejected request with {status}: {body}")]
    Client { status: u16, body: String },

    /// 5xx from upstream, or a 2xx body that could not be decoded.
    #[error("upstream failed with {status}: {body}")]
    Server { status: u16, body: String },

    /// No response received (refused, reset, timed out).
    #[error("upstream unreachable: {0}")]
    Connection(String),
}

impl FetchError {
    /// Transient failures count toward the breaker and trigger the fallback.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Client { .. })
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(#[from] fjall::Error),

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors the orchestrator may surface to its caller.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("rate limit exceeded for '{limiter}'")]
    RateLimitExceeded { limiter: String },

    #[error("upstream client error {status}: {body}")]
    UpstreamClient { status: u16, body: String },

    #[error("upstream server error {status}: {body}")]
    UpstreamServer { status: u16, body: String },

    #[error("upstream connection error: {0}")]
    UpstreamConnection(String),

    #[error("circuit '{circuit}' is open")]
    CircuitOpen { circuit: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl GatewayError {
    /// HTTP-style status a boundary layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::RateLimitExceeded { .. } => 429,
            GatewayError::UpstreamClient { status, .. } => *status,
            GatewayError::UpstreamServer { .. } => 502,
            GatewayError::UpstreamConnection(_) | GatewayError::CircuitOpen { .. } => 503,
            GatewayError::Storage(_) => 500,
        }
    }
}

impl From<FetchError> for GatewayError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Client { status, body } => GatewayError::UpstreamClient { status, body },
            FetchError::Server { status, body } => GatewayError::UpstreamServer { status, body },
            FetchError::Connection(msg) => GatewayError::UpstreamConnection(msg),
        }
    }
}
