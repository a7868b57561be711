//! Snapshot loader: one GET against the latest-blocks endpoint.
//!
//! Returns data points oldest-first whatever order the upstream used. Retries
//! only when the caller asks for them through a [`RetryPolicy`].

use crate::domain::block::wire::BlockRecord;
use crate::domain::block::{DataPoint, TimeLabelPolicy};
use crate::error::FetchError;
use crate::http::retry::RetryPolicy;

use chrono::{DateTime, Local};
use reqwest::Client;
use std::time::Duration;

/// Bulk fetch of the most recent block metrics.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    url: String,
    client: Client,
    time_label: TimeLabelPolicy,
}

impl SnapshotLoader {
    /// `timeout` bounds the whole request; `None` waits indefinitely.
    pub fn new(
        url: &str,
        time_label: TimeLabelPolicy,
        timeout: Option<Duration>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            url: url.to_string(),
            client: builder.build()?,
            time_label,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Exactly one request, no retry.
    pub async fn load(&self) -> Result<Vec<DataPoint>, FetchError> {
        self.load_with(RetryPolicy::None).await
    }

    /// Fetch with the caller's retry policy.
    pub async fn load_with(&self, retry: RetryPolicy) -> Result<Vec<DataPoint>, FetchError> {
        let records = self.request_with_retry(retry).await?;
        let points = normalize(records, self.time_label, &Local::now())?;
        tracing::debug!(points = points.len(), url = %self.url, "Snapshot loaded");
        Ok(points)
    }

    async fn request_with_retry(
        &self,
        retry: RetryPolicy,
    ) -> Result<Vec<BlockRecord>, FetchError> {
        let Some(config) = retry.config() else {
            return self.do_request().await;
        };

        let mut last_error = None;

        for attempt in 0..=config.max_retries {
            match self.do_request().await {
                Ok(records) => return Ok(records),
                Err(e) => {
                    let should_retry = match &e {
                        FetchError::Status { status, .. } => config.is_retryable_status(*status),
                        FetchError::Timeout => true,
                        FetchError::Request(re) => re.is_connect() || re.is_request(),
                        _ => false,
                    };

                    if should_retry && attempt < config.max_retries {
                        let delay = config.delay_for_attempt(attempt);
                        tracing::debug!(
                            attempt = attempt + 1,
                            max = config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            "Retrying snapshot request to {}",
                            self.url
                        );
                        futures_timer::Delay::new(delay).await;
                        last_error = Some(e);
                    } else if should_retry {
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            attempts: config.max_retries + 1,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
        })
    }

    async fn do_request(&self) -> Result<Vec<BlockRecord>, FetchError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(from_reqwest)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

fn from_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Request(e)
    }
}

/// Validate every record and order the result by ascending height.
///
/// The sort is stable, so records sharing a height keep upstream order.
pub fn normalize(
    records: Vec<BlockRecord>,
    time_label: TimeLabelPolicy,
    received_at: &DateTime<Local>,
) -> Result<Vec<DataPoint>, FetchError> {
    let mut points = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_point(time_label, received_at)
                .map_err(|source| FetchError::InvalidRecord { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    points.sort_by_key(|p| p.height);
    Ok(points)
}
