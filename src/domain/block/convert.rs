//! Conversions from wire records to data points.

use super::wire::{BlockRecord, WireTimestamp};
use super::{DataPoint, TimeLabelPolicy, RECEIPT_TIME_FORMAT};
use crate::error::ValidationError;
use chrono::{DateTime, Local, Utc};

/// Unix values at or above this magnitude are read as milliseconds.
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

impl BlockRecord {
    /// Validate the record and resolve its label under `policy`.
    ///
    /// `received_at` is only consulted for [`TimeLabelPolicy::ReceiptTime`].
    pub fn into_point(
        self,
        policy: TimeLabelPolicy,
        received_at: &DateTime<Local>,
    ) -> Result<DataPoint, ValidationError> {
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ValidationError::InvalidPrice(self.price));
        }

        let time = match policy {
            TimeLabelPolicy::ReceiptTime => receipt_label(received_at),
            TimeLabelPolicy::UpstreamTimestamp => match self.timestamp.or(self.time) {
                Some(ts) => ts.label()?,
                None => return Err(ValidationError::MissingTimestamp),
            },
        };

        Ok(DataPoint {
            height: self.height,
            transactions: self.transactions,
            price: self.price,
            time,
        })
    }
}

impl WireTimestamp {
    /// Strings pass through verbatim; epoch numbers render as RFC 3339 UTC.
    pub fn label(self) -> Result<String, ValidationError> {
        match self {
            WireTimestamp::Text(text) => Ok(text),
            WireTimestamp::Unix(n) => {
                let parsed = if n.abs() >= MILLIS_THRESHOLD {
                    DateTime::<Utc>::from_timestamp_millis(n)
                } else {
                    DateTime::<Utc>::from_timestamp(n, 0)
                };
                parsed
                    .map(|dt| dt.to_rfc3339())
                    .ok_or(ValidationError::TimestampOutOfRange(n))
            }
            WireTimestamp::Fractional(f) => {
                let millis = if f.abs() >= MILLIS_THRESHOLD as f64 {
                    f.round() as i64
                } else {
                    (f * 1000.0).round() as i64
                };
                DateTime::<Utc>::from_timestamp_millis(millis)
                    .map(|dt| dt.to_rfc3339())
                    .ok_or(ValidationError::TimestampOutOfRange(millis))
            }
            WireTimestamp::Other(value) => {
                Err(ValidationError::UnsupportedTimestamp(value.to_string()))
            }
        }
    }
}

pub fn receipt_label(received_at: &DateTime<Local>) -> String {
    received_at.format(RECEIPT_TIME_FORMAT).to_string()
}
