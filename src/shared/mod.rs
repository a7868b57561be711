//! Utilities shared by the snapshot loader and the push channel.

pub mod backoff;

pub use backoff::Backoff;
