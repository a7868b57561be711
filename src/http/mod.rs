//! Snapshot layer: `SnapshotLoader` with caller-selected retry policies.

pub mod retry;

#[cfg(feature = "http")]
pub mod client;

#[cfg(feature = "http")]
pub use client::SnapshotLoader;
pub use retry::{RetryConfig, RetryPolicy};
