//! # blockfeed
//!
//! Reconciliation core for a real-time block metrics dashboard: a one-shot
//! snapshot of recent blocks is merged with a live push feed into a trailing
//! window of the last ten data points.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: Data points, the trailing window, the reconciliation core (always available)
//! 2. **Snapshot**: `SnapshotLoader` over `reqwest` with opt-in retry (`http` feature)
//! 3. **Push channel**: `ConnectionManager` over `tokio-tungstenite` (`ws-native` feature)
//! 4. **Session**: `DashboardSession`, the context object wiring all three (`native`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use blockfeed::prelude::*;
//!
//! let config = DashboardConfig::builder()
//!     .base_url("http://explorer.internal:3030/api")
//!     .time_label(TimeLabelPolicy::ReceiptTime)
//!     .reconnect(ReconnectPolicy::backoff())
//!     .build()?;
//!
//! let mut session = DashboardSession::new(config)?;
//! let mut views = session.subscribe();
//! session.run(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared utilities (backoff).
pub mod shared;

/// Domain modules: data points, wire records, conversions, the window.
pub mod domain;

/// The single writer of the series window.
pub mod reconcile;

/// Error types.
pub mod error;

/// Endpoints and session settings.
pub mod config;

// ── Layer 2: Snapshot ────────────────────────────────────────────────────────

/// Snapshot loader and retry policies.
pub mod http;

// ── Layer 3: Push channel ────────────────────────────────────────────────────

/// Push channel: connection state, events, reconnect policy.
pub mod ws;

// ── Layer 4: Session ─────────────────────────────────────────────────────────

/// `DashboardSession`: the primary entry point.
#[cfg(all(feature = "http", feature = "ws-native"))]
pub mod session;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Domain
    pub use crate::domain::block::wire::{BlockRecord, WireTimestamp};
    pub use crate::domain::block::{
        DataPoint, SeriesWindow, TimeLabelPolicy, RECEIPT_TIME_FORMAT, WINDOW_CAPACITY,
    };

    // Core
    pub use crate::reconcile::{HeightRegression, ReconciliationCore};

    // Errors
    pub use crate::error::{
        ConfigError, ConnectionError, DashboardError, FetchError, IngestError, ValidationError,
    };

    // Config
    pub use crate::config::{DashboardConfig, DashboardConfigBuilder, Endpoints};
    pub use crate::shared::Backoff;

    // Snapshot
    pub use crate::http::retry::{RetryConfig, RetryPolicy};
    #[cfg(feature = "http")]
    pub use crate::http::SnapshotLoader;

    // Push channel
    #[cfg(feature = "ws-native")]
    pub use crate::ws::native::ConnectionManager;
    pub use crate::ws::{ConnectionEvent, ConnectionState, PushConfig, ReconnectPolicy};

    // Session
    #[cfg(all(feature = "http", feature = "ws-native"))]
    pub use crate::session::{DashboardSession, DashboardView};
}
