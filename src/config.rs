//! Session configuration.
//!
//! Endpoints are always supplied by the deployment, either through the
//! builder or the environment. There are no built-in network addresses.

use crate::domain::block::TimeLabelPolicy;
use crate::error::ConfigError;
use crate::http::retry::RetryPolicy;
use crate::reconcile::HeightRegression;
use crate::ws::{PushConfig, ReconnectPolicy, DEFAULT_EVENT_BUFFER};
use std::time::Duration;

/// Snapshot path appended to a base URL.
pub const SNAPSHOT_PATH: &str = "latest_blocks";

/// Push path appended to a base URL.
pub const PUSH_PATH: &str = "ws";

pub const ENV_SNAPSHOT_URL: &str = "DASHBOARD_SNAPSHOT_URL";
pub const ENV_PUSH_URL: &str = "DASHBOARD_PUSH_URL";
pub const ENV_BASE_URL: &str = "DASHBOARD_BASE_URL";
pub const ENV_TIME_LABEL: &str = "DASHBOARD_TIME_LABEL";
pub const ENV_RECONNECT: &str = "DASHBOARD_RECONNECT";

/// The two upstream endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `http(s)://…/latest_blocks`
    pub snapshot_url: String,
    /// `ws(s)://…/ws`
    pub push_url: String,
}

impl Endpoints {
    /// Derive both endpoints from one base, e.g. `http://host:3030/api`.
    ///
    /// The push scheme follows the base: `http` → `ws`, `https` → `wss`.
    pub fn from_base(base: &str) -> Result<Self, ConfigError> {
        let base = base.trim().trim_end_matches('/');
        let (http_scheme, ws_scheme, host_and_path) = if let Some(rest) =
            base.strip_prefix("https://")
        {
            ("https", "wss", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            ("http", "ws", rest)
        } else {
            return Err(ConfigError::InvalidEndpoint {
                name: "base",
                url: base.to_string(),
                reason: "expected http:// or https://".to_string(),
            });
        };

        Ok(Self {
            snapshot_url: format!("{http_scheme}://{host_and_path}/{SNAPSHOT_PATH}"),
            push_url: format!("{ws_scheme}://{host_and_path}/{PUSH_PATH}"),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_scheme("snapshot", &self.snapshot_url, &["http://", "https://"])?;
        check_scheme("push", &self.push_url, &["ws://", "wss://"])
    }
}

fn check_scheme(name: &'static str, url: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        name,
        url: url.to_string(),
        reason,
    };
    let Some(scheme) = schemes.iter().find(|s| url.starts_with(*s)) else {
        return Err(invalid(format!("expected one of {}", schemes.join(", "))));
    };
    if url.len() == scheme.len() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

/// Everything a [`crate::session::DashboardSession`] needs.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub endpoints: Endpoints,
    pub time_label: TimeLabelPolicy,
    pub height_regression: HeightRegression,
    pub reconnect: ReconnectPolicy,
    pub snapshot_retry: RetryPolicy,
    /// Whole-request bound on the snapshot fetch. `None` waits indefinitely.
    pub snapshot_timeout: Option<Duration>,
    pub connect_timeout: Duration,
    pub ping_interval: Option<Duration>,
    pub pong_timeout: Duration,
    pub event_buffer: usize,
}

impl DashboardConfig {
    pub fn builder() -> DashboardConfigBuilder {
        DashboardConfigBuilder::default()
    }

    /// Build from `DASHBOARD_*` environment variables.
    ///
    /// Endpoints come from `DASHBOARD_SNAPSHOT_URL` + `DASHBOARD_PUSH_URL`,
    /// or `DASHBOARD_BASE_URL`. `DASHBOARD_TIME_LABEL` is required;
    /// `DASHBOARD_RECONNECT` defaults to `disabled`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`DashboardConfig::from_env`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(base) = lookup(ENV_BASE_URL) {
            builder = builder.base_url(&base);
        }
        if let Some(url) = lookup(ENV_SNAPSHOT_URL) {
            builder = builder.snapshot_url(&url);
        }
        if let Some(url) = lookup(ENV_PUSH_URL) {
            builder = builder.push_url(&url);
        }
        if let Some(label) = lookup(ENV_TIME_LABEL) {
            builder = builder.time_label(label.parse()?);
        }
        if let Some(reconnect) = lookup(ENV_RECONNECT) {
            builder = builder.reconnect(reconnect.parse()?);
        }

        builder.build()
    }

    /// Push-channel settings derived from this config.
    pub fn push_config(&self) -> PushConfig {
        PushConfig {
            url: self.endpoints.push_url.clone(),
            reconnect: self.reconnect.clone(),
            connect_timeout: self.connect_timeout,
            ping_interval: self.ping_interval,
            pong_timeout: self.pong_timeout,
            event_buffer: self.event_buffer,
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct DashboardConfigBuilder {
    base_url: Option<String>,
    snapshot_url: Option<String>,
    push_url: Option<String>,
    time_label: Option<TimeLabelPolicy>,
    height_regression: HeightRegression,
    reconnect: ReconnectPolicy,
    snapshot_retry: RetryPolicy,
    snapshot_timeout: Option<Duration>,
    connect_timeout: Duration,
    ping_interval: Option<Duration>,
    pong_timeout: Duration,
    event_buffer: usize,
}

impl Default for DashboardConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            snapshot_url: None,
            push_url: None,
            time_label: None,
            height_regression: HeightRegression::Accept,
            reconnect: ReconnectPolicy::Disabled,
            snapshot_retry: RetryPolicy::None,
            snapshot_timeout: Some(Duration::from_secs(30)),
            connect_timeout: Duration::from_secs(30),
            ping_interval: Some(Duration::from_secs(30)),
            pong_timeout: Duration::from_secs(60),
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl DashboardConfigBuilder {
    /// Derive both endpoints from a base URL. Explicit URLs take precedence.
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn snapshot_url(mut self, url: &str) -> Self {
        self.snapshot_url = Some(url.to_string());
        self
    }

    pub fn push_url(mut self, url: &str) -> Self {
        self.push_url = Some(url.to_string());
        self
    }

    pub fn time_label(mut self, policy: TimeLabelPolicy) -> Self {
        self.time_label = Some(policy);
        self
    }

    pub fn height_regression(mut self, policy: HeightRegression) -> Self {
        self.height_regression = policy;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn snapshot_retry(mut self, policy: RetryPolicy) -> Self {
        self.snapshot_retry = policy;
        self
    }

    pub fn snapshot_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Keepalive ping interval; `None` disables keepalive. Must be non-zero.
    pub fn ping_interval(mut self, interval: Option<Duration>) -> Self {
        self.ping_interval = interval;
        self
    }

    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }

    /// Cap on push payloads queued for the session. Must be non-zero.
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn build(self) -> Result<DashboardConfig, ConfigError> {
        let derived = self.base_url.as_deref().map(Endpoints::from_base).transpose()?;

        let snapshot_url = self
            .snapshot_url
            .or_else(|| derived.as_ref().map(|e| e.snapshot_url.clone()))
            .ok_or(ConfigError::Missing("snapshot_url"))?;
        let push_url = self
            .push_url
            .or_else(|| derived.as_ref().map(|e| e.push_url.clone()))
            .ok_or(ConfigError::Missing("push_url"))?;
        let time_label = self.time_label.ok_or(ConfigError::Missing("time_label"))?;

        let endpoints = Endpoints {
            snapshot_url: snapshot_url.trim().to_string(),
            push_url: push_url.trim().to_string(),
        };
        endpoints.validate()?;

        if self.ping_interval.is_some_and(|d| d.is_zero()) {
            return Err(ConfigError::InvalidValue {
                key: "ping_interval",
                value: "0s".to_string(),
            });
        }
        if self.event_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_buffer",
                value: "0".to_string(),
            });
        }

        Ok(DashboardConfig {
            endpoints,
            time_label,
            height_regression: self.height_regression,
            reconnect: self.reconnect,
            snapshot_retry: self.snapshot_retry,
            snapshot_timeout: self.snapshot_timeout,
            connect_timeout: self.connect_timeout,
            ping_interval: self.ping_interval,
            pong_timeout: self.pong_timeout,
            event_buffer: self.event_buffer,
        })
    }
}
