//! Wire types for block metrics (snapshot endpoint and push channel).

use serde::{Deserialize, Serialize};

/// One block-metrics record as the upstream sends it.
///
/// The snapshot endpoint and the push channel share this shape. `height`,
/// `transactions` and `price` are required; a record missing any of them
/// fails to decode. The time fields are optional and never fail decoding on
/// their own: they are only interpreted under
/// [`TimeLabelPolicy::UpstreamTimestamp`](super::TimeLabelPolicy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub height: u64,
    pub transactions: u64,
    pub price: f64,
    /// Upstream time as sent on the push channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<WireTimestamp>,
    /// Upstream time as sent by snapshot rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<WireTimestamp>,
}

impl BlockRecord {
    /// `timestamp` if present, else `time`.
    pub fn upstream_time(&self) -> Option<&WireTimestamp> {
        self.timestamp.as_ref().or(self.time.as_ref())
    }
}

/// Upstream timestamp: a formatted string or a unix epoch number.
///
/// Anything else is kept as [`WireTimestamp::Other`] so the record still
/// decodes; it is rejected only when a label has to be derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    Text(String),
    Unix(i64),
    /// Fractional epoch, e.g. `Date.now() / 1000`.
    Fractional(f64),
    Other(serde_json::Value),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_push_record_without_time() {
        let record: BlockRecord =
            serde_json::from_str(r#"{"height": 870001, "transactions": 2981, "price": 64250.5}"#)
                .unwrap();
        assert_eq!(record.height, 870001);
        assert_eq!(record.transactions, 2981);
        assert_eq!(record.price, 64250.5);
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn test_decode_snapshot_record_with_time() {
        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3, "time": "2024-05-01T10:00:00+00:00"}"#,
        )
        .unwrap();
        assert!(record.timestamp.is_none());
        assert_eq!(
            record.upstream_time(),
            Some(&WireTimestamp::Text("2024-05-01T10:00:00+00:00".into()))
        );
    }

    #[test]
    fn test_timestamp_wins_over_time() {
        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3, "time": "a", "timestamp": "b"}"#,
        )
        .unwrap();
        assert_eq!(record.upstream_time(), Some(&WireTimestamp::Text("b".into())));
    }

    #[test]
    fn test_decode_fractional_and_unusual_timestamps() {
        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3, "timestamp": 1714557600.5}"#,
        )
        .unwrap();
        assert_eq!(record.timestamp, Some(WireTimestamp::Fractional(1714557600.5)));

        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3, "timestamp": {"secs": 1}}"#,
        )
        .unwrap();
        assert!(matches!(record.timestamp, Some(WireTimestamp::Other(_))));

        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3, "timestamp": null}"#,
        )
        .unwrap();
        assert!(record.timestamp.is_none());
    }

    #[test]
    fn test_decode_numeric_timestamp() {
        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3.5, "timestamp": 1714557600}"#,
        )
        .unwrap();
        assert_eq!(record.timestamp, Some(WireTimestamp::Unix(1714557600)));
    }

    #[test]
    fn test_missing_field_fails() {
        let result = serde_json::from_str::<BlockRecord>(r#"{"height": 1, "price": 3.5}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_negative_count_fails() {
        let result = serde_json::from_str::<BlockRecord>(
            r#"{"height": 1, "transactions": -4, "price": 3.5}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let record: BlockRecord = serde_json::from_str(
            r#"{"height": 1, "transactions": 2, "price": 3, "unconfirmed": true}"#,
        )
        .unwrap();
        assert_eq!(record.height, 1);
    }
}
