//! Block metrics domain: data points, time labels, the trailing window.

pub mod convert;
pub mod wire;
pub mod window;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use window::{SeriesWindow, WINDOW_CAPACITY};

/// Wall-clock format used for client-stamped labels (`HH:MM:SS`, local time).
pub const RECEIPT_TIME_FORMAT: &str = "%H:%M:%S";

/// A single observation plotted by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    /// Block height.
    pub height: u64,
    /// Transaction count reported alongside the block.
    pub transactions: u64,
    /// Asset price, finite and non-negative.
    pub price: f64,
    /// Display label for the x axis.
    pub time: String,
}

impl DataPoint {
    pub fn new(height: u64, transactions: u64, price: f64, time: impl Into<String>) -> Self {
        Self {
            height,
            transactions,
            price,
            time: time.into(),
        }
    }
}

/// Where a point's `time` label comes from.
///
/// No `Default`: callers pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeLabelPolicy {
    /// Stamp the local wall-clock time at which the client received the record.
    ReceiptTime,
    /// Use the record's own `timestamp` field; records without one are rejected.
    UpstreamTimestamp,
}

impl TimeLabelPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceiptTime => "receipt_time",
            Self::UpstreamTimestamp => "upstream_timestamp",
        }
    }
}

impl fmt::Display for TimeLabelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeLabelPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "receipt_time" => Ok(Self::ReceiptTime),
            "upstream_timestamp" => Ok(Self::UpstreamTimestamp),
            other => Err(ConfigError::InvalidValue {
                key: "time_label",
                value: other.to_string(),
            }),
        }
    }
}
