//! Integration tests for the snapshot loader against a loopback HTTP server.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use blockfeed::domain::block::TimeLabelPolicy;
use blockfeed::error::FetchError;
use blockfeed::http::retry::{RetryConfig, RetryPolicy};
use blockfeed::http::SnapshotLoader;
use blockfeed::shared::Backoff;

fn quick_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::Custom(RetryConfig {
        max_retries,
        backoff: Backoff {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            factor: 2.0,
            jitter: false,
        },
        retryable_statuses: vec![503],
    })
}

fn loader(url: &str, time_label: TimeLabelPolicy) -> SnapshotLoader {
    SnapshotLoader::new(url, time_label, Some(Duration::from_secs(5))).unwrap()
}

#[tokio::test]
async fn newest_first_rows_come_back_oldest_first() {
    let body = r#"[
        {"id": 3, "height": 840002, "transactions": 3100, "price": 64010.5, "time": "2024-05-01T10:20:00Z"},
        {"id": 2, "height": 840001, "transactions": 2900, "price": 64000.0, "time": "2024-05-01T10:10:00Z"},
        {"id": 1, "height": 840000, "transactions": 2500, "price": 63990.25, "time": "2024-05-01T10:00:00Z"}
    ]"#;
    let (url, hits) = common::serve_http(vec![(200, body.to_string())]).await;

    let points = assert_ok!(loader(&url, TimeLabelPolicy::UpstreamTimestamp).load().await);

    let heights: Vec<_> = points.iter().map(|p| p.height).collect();
    assert_eq!(heights, [840000, 840001, 840002]);
    assert_eq!(points[0].transactions, 2500);
    assert_eq!(points[0].price, 63990.25);
    assert_eq!(points[0].time, "2024-05-01T10:00:00Z");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn receipt_time_labels_share_one_instant() {
    let body = format!(
        "[{},{}]",
        common::block_json(11, 2, 10.0),
        common::block_json(10, 1, 9.5)
    );
    let (url, _) = common::serve_http(vec![(200, body)]).await;

    let points = assert_ok!(loader(&url, TimeLabelPolicy::ReceiptTime).load().await);

    assert_eq!(points.len(), 2);
    assert_eq!(points[0].time, points[1].time);
    assert_eq!(points[0].time.len(), "HH:MM:SS".len());
}

#[tokio::test]
async fn empty_array_is_an_empty_snapshot() {
    let (url, _) = common::serve_http(vec![(200, "[]".to_string())]).await;
    let points = assert_ok!(loader(&url, TimeLabelPolicy::ReceiptTime).load().await);
    assert!(points.is_empty());
}

#[tokio::test]
async fn error_status_is_not_retried_by_default() {
    let (url, hits) = common::serve_http(vec![(503, "busy".to_string())]).await;

    let err = assert_err!(loader(&url, TimeLabelPolicy::ReceiptTime).load().await);

    match err {
        FetchError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "busy");
        }
        other => panic!("expected Status, got {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_recovers_from_transient_status() {
    let ok = format!("[{}]", common::block_json(5, 1, 1.0));
    let (url, hits) =
        common::serve_http(vec![(503, "busy".to_string()), (200, ok)]).await;

    let points = assert_ok!(
        loader(&url, TimeLabelPolicy::ReceiptTime)
            .load_with(quick_retry(3))
            .await
    );

    assert_eq!(points.len(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retry_gives_up_after_max_retries() {
    let (url, hits) = common::serve_http(vec![(503, "busy".to_string())]).await;

    let err = assert_err!(
        loader(&url, TimeLabelPolicy::ReceiptTime)
            .load_with(quick_retry(2))
            .await
    );

    assert!(matches!(
        err,
        FetchError::MaxRetriesExceeded { attempts: 3, .. }
    ));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_retryable_status_fails_fast() {
    let (url, hits) = common::serve_http(vec![(500, "boom".to_string())]).await;

    let err = assert_err!(
        loader(&url, TimeLabelPolicy::ReceiptTime)
            .load_with(quick_retry(3))
            .await
    );

    assert!(matches!(err, FetchError::Status { status: 500, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let (url, _) = common::serve_http(vec![(200, "<html>oops</html>".to_string())]).await;
    let err = assert_err!(loader(&url, TimeLabelPolicy::ReceiptTime).load().await);
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn record_missing_a_field_is_a_decode_error() {
    let body = r#"[{"height": 1, "price": 2.0}]"#.to_string();
    let (url, _) = common::serve_http(vec![(200, body)]).await;
    let err = assert_err!(loader(&url, TimeLabelPolicy::ReceiptTime).load().await);
    assert!(matches!(err, FetchError::Decode(_)));
}

#[tokio::test]
async fn upstream_labels_require_a_timestamp() {
    let body = format!("[{}]", common::block_json(1, 1, 1.0));
    let (url, _) = common::serve_http(vec![(200, body)]).await;
    let err = assert_err!(
        loader(&url, TimeLabelPolicy::UpstreamTimestamp)
            .load()
            .await
    );
    assert!(matches!(err, FetchError::InvalidRecord { index: 0, .. }));
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    let url = common::silent_server()
        .await
        .replacen("ws://", "http://", 1);
    let loader = SnapshotLoader::new(
        &url,
        TimeLabelPolicy::ReceiptTime,
        Some(Duration::from_millis(200)),
    )
    .unwrap();

    let err = assert_err!(loader.load().await);
    assert!(matches!(err, FetchError::Timeout));
}
