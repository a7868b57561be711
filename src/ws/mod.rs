//! Push channel: connection state, events, and configuration.
//!
//! The transport lives in `native.rs` behind the `ws-native` feature. This
//! module defines the types shared with the reconciliation core, which only
//! ever observes connection state.

#[cfg(feature = "ws-native")]
pub mod native;

use crate::error::{ConfigError, ConnectionError};
use crate::shared::Backoff;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ─── ConnectionState ─────────────────────────────────────────────────────────

/// Lifecycle of the push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Open = 2,
    Closing = 3,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Open,
            3 => Self::Closing,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
        };
        f.write_str(s)
    }
}

// ─── ConnectionEvent ─────────────────────────────────────────────────────────

/// Events emitted by the connection manager, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// The connection moved to a new state.
    StateChanged(ConnectionState),
    /// Raw payload of one text or binary frame.
    Message(Vec<u8>),
    /// A channel-level failure. Connection errors are followed by teardown to
    /// `Disconnected`; `ReconnectExhausted` is reported after it.
    Error(ConnectionError),
}

// ─── ReconnectPolicy ─────────────────────────────────────────────────────────

/// What the connection manager does after the channel drops.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ReconnectPolicy {
    /// Stay `Disconnected`.
    #[default]
    Disabled,
    /// Reconnect after an exponentially growing delay.
    Backoff {
        backoff: Backoff,
        /// `None` retries forever.
        max_attempts: Option<u32>,
    },
}

impl ReconnectPolicy {
    /// Backoff from 1s up to 30s, retrying forever.
    pub fn backoff() -> Self {
        Self::Backoff {
            backoff: Backoff {
                initial_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                factor: 2.0,
                jitter: true,
            },
            max_attempts: None,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-indexed), or `None` to give up.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Backoff {
                backoff,
                max_attempts,
            } => match max_attempts {
                Some(max) if attempt >= *max => None,
                _ => Some(backoff.delay_for_attempt(attempt)),
            },
        }
    }
}

impl FromStr for ReconnectPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            "backoff" => Ok(Self::backoff()),
            other => Err(ConfigError::InvalidValue {
                key: "reconnect",
                value: other.to_string(),
            }),
        }
    }
}

// ─── PushConfig ──────────────────────────────────────────────────────────────

/// Default cap on undelivered payloads.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Configuration for the connection manager.
#[derive(Debug, Clone)]
pub struct PushConfig {
    pub url: String,
    pub reconnect: ReconnectPolicy,
    /// Bound on the TCP + WebSocket handshake.
    pub connect_timeout: Duration,
    /// Send a WS ping this often while open. `None` (or zero) disables keepalive.
    pub ping_interval: Option<Duration>,
    /// Treat the channel as lost if no pong arrives within this time.
    pub pong_timeout: Duration,
    /// Most payloads held for a reader that has not caught up. Newer
    /// payloads are dropped while the buffer is full.
    pub event_buffer: usize,
}

impl PushConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect: ReconnectPolicy::Disabled,
            connect_timeout: Duration::from_secs(30),
            ping_interval: Some(Duration::from_secs(30)),
            pong_timeout: Duration::from_secs(60),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}
