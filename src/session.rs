//! Dashboard session: one context object per dashboard.
//!
//! Owns the snapshot loader, the push connection and the reconciliation
//! core. All window mutations happen on the task that drives the session,
//! one event at a time; presenters only ever see copies through
//! [`DashboardSession::subscribe`].

use std::future::Future;

use futures_util::Stream;
use serde::Serialize;
use tokio::sync::watch;

use crate::config::DashboardConfig;
use crate::domain::block::DataPoint;
use crate::error::{DashboardError, FetchError};
use crate::http::SnapshotLoader;
use crate::reconcile::ReconciliationCore;
use crate::ws::native::ConnectionManager;
use crate::ws::{ConnectionEvent, ConnectionState};

/// What a presenter renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    /// Window contents, oldest first.
    pub points: Vec<DataPoint>,
    /// Whether the snapshot has been applied.
    pub seeded: bool,
    pub connection: ConnectionState,
    /// Most recent snapshot or channel failure, for an operator-facing banner.
    pub last_error: Option<String>,
}

impl DashboardView {
    /// Nothing to plot yet; show a "no data yet" state instead of an empty chart.
    pub fn awaiting_data(&self) -> bool {
        self.points.is_empty()
    }
}

/// Core + view publisher. Kept apart from the loader so the snapshot
/// future can borrow the loader while events are applied.
struct Reconciler {
    core: ReconciliationCore,
    view_tx: watch::Sender<DashboardView>,
    last_error: Option<String>,
}

impl Reconciler {
    fn view(&self) -> DashboardView {
        DashboardView {
            points: self.core.current(),
            seeded: self.core.is_seeded(),
            connection: self.core.connection_state(),
            last_error: self.last_error.clone(),
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    fn apply_snapshot(
        &mut self,
        result: Result<Vec<DataPoint>, FetchError>,
    ) -> Result<usize, FetchError> {
        let outcome = match result {
            Ok(points) => {
                let count = points.len();
                self.core.seed(points);
                tracing::info!(points = count, "Series seeded from snapshot");
                Ok(count)
            }
            Err(e) => {
                tracing::error!("Snapshot fetch failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(e)
            }
        };
        self.publish();
        outcome
    }

    fn apply_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged(state) => {
                tracing::debug!(%state, "Push channel state changed");
                self.core.observe(state);
            }
            ConnectionEvent::Message(raw) => {
                if let Err(e) = self.core.ingest(&raw) {
                    tracing::warn!(
                        "Dropping push message: {} (raw: {})",
                        e,
                        String::from_utf8_lossy(&raw)
                    );
                    return;
                }
            }
            ConnectionEvent::Error(e) => {
                tracing::warn!("Push channel error: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
        self.publish();
    }
}

pub struct DashboardSession {
    config: DashboardConfig,
    loader: SnapshotLoader,
    connection: ConnectionManager,
    reconciler: Reconciler,
}

impl DashboardSession {
    /// Build the session. Nothing is fetched or connected yet.
    pub fn new(config: DashboardConfig) -> Result<Self, DashboardError> {
        let loader = SnapshotLoader::new(
            &config.endpoints.snapshot_url,
            config.time_label,
            config.snapshot_timeout,
        )?;
        let connection = ConnectionManager::new(config.push_config());
        let core = ReconciliationCore::new(config.time_label)
            .with_height_regression(config.height_regression);

        let (view_tx, _) = watch::channel(DashboardView {
            points: Vec::new(),
            seeded: false,
            connection: ConnectionState::Disconnected,
            last_error: None,
        });

        Ok(Self {
            config,
            loader,
            connection,
            reconciler: Reconciler {
                core,
                view_tx,
                last_error: None,
            },
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Latest view, updated after every applied event.
    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.reconciler.view_tx.subscribe()
    }

    /// The current view followed by every later change.
    pub fn view_stream(&self) -> impl Stream<Item = DashboardView> + Send + 'static {
        let mut rx = self.subscribe();
        async_stream::stream! {
            let view = rx.borrow_and_update().clone();
            yield view;
            while rx.changed().await.is_ok() {
                let view = rx.borrow_and_update().clone();
                yield view;
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        self.reconciler.view()
    }

    pub fn current(&self) -> Vec<DataPoint> {
        self.reconciler.core.current()
    }

    pub fn core(&self) -> &ReconciliationCore {
        &self.reconciler.core
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Fetch the snapshot (with the configured retry policy) and seed the window.
    ///
    /// On failure the window is left as it was and the error is also shown
    /// in the view.
    pub async fn load_snapshot(&mut self) -> Result<usize, FetchError> {
        let result = self
            .loader
            .load_with(self.config.snapshot_retry.clone())
            .await;
        self.reconciler.apply_snapshot(result)
    }

    /// Start the push channel.
    pub fn open(&mut self) {
        self.connection.open();
    }

    /// Wait for one push-channel event and apply it.
    ///
    /// Returns `false` once the event channel has ended.
    pub async fn process_next(&mut self) -> bool {
        match self.connection.next_event().await {
            Some(event) => {
                self.reconciler.apply_event(event);
                true
            }
            None => false,
        }
    }

    /// Apply every event already queued, without waiting.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.connection.try_next_event() {
            self.reconciler.apply_event(event);
            applied += 1;
        }
        applied
    }

    /// Open the channel, fetch the snapshot concurrently, and apply events
    /// until `shutdown` resolves. The channel is closed before returning.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        self.connection.open();
        tokio::pin!(shutdown);

        {
            let snapshot = self
                .loader
                .load_with(self.config.snapshot_retry.clone());
            tokio::pin!(snapshot);
            let mut snapshot_pending = true;

            loop {
                tokio::select! {
                    result = &mut snapshot, if snapshot_pending => {
                        snapshot_pending = false;
                        let _ = self.reconciler.apply_snapshot(result);
                    }
                    event = self.connection.next_event() => match event {
                        Some(event) => self.reconciler.apply_event(event),
                        None => break,
                    },
                    () = &mut shutdown => break,
                }
            }
        }

        self.close().await;
    }

    /// Close the push channel. No message from it is ingested afterwards.
    pub async fn close(&mut self) {
        self.connection.close().await;
        self.process_pending();
        tracing::info!("Dashboard session closed");
    }
}
