//! Unified error types.

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

/// Configuration errors, raised while building a [`crate::config::DashboardConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid {name} endpoint {url:?}: {reason}")]
    InvalidEndpoint {
        name: &'static str,
        url: String,
        reason: String,
    },

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Failures of the one-shot snapshot fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[cfg(feature = "http")]
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Timeout")]
    Timeout,

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid record at index {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("Max retries exceeded after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

/// Failures of a single push message. The message is dropped, the window is untouched.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("Height regressed from {previous} to {received}")]
    HeightRegression { previous: u64, received: u64 },
}

/// A decoded record that cannot become a data point.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("price must be finite and non-negative, got {0}")]
    InvalidPrice(f64),

    #[error("upstream timestamp required but missing")]
    MissingTimestamp,

    #[error("upstream timestamp out of range: {0}")]
    TimestampOutOfRange(i64),

    #[error("upstream timestamp has an unsupported shape: {0}")]
    UnsupportedTimestamp(String),
}

/// Push-channel errors. Reported as events, never returned across the
/// connection boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Connection timed out")]
    ConnectTimeout,

    #[error("Connection closed: code={code:?} reason={reason}")]
    Closed { code: Option<u16>, reason: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Pong timeout")]
    PongTimeout,

    #[error("Gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
}

#[cfg(feature = "ws-native")]
impl From<tokio_tungstenite::tungstenite::Error> for ConnectionError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => ConnectionError::Closed {
                code: None,
                reason: "Connection closed".to_string(),
            },
            Error::Io(e) => ConnectionError::Io(e.to_string()),
            Error::Url(e) => ConnectionError::ConnectFailed(e.to_string()),
            Error::Http(resp) => {
                ConnectionError::ConnectFailed(format!("HTTP error: {:?}", resp.status()))
            }
            other => ConnectionError::Protocol(other.to_string()),
        }
    }
}
