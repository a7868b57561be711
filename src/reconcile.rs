//! Reconciliation core: the single writer of the series window.
//!
//! Both upstream paths end here: the snapshot seeds the window wholesale and
//! each push message appends one point. Capacity and ordering are enforced
//! by [`SeriesWindow`]; this module decides what is allowed in.

use crate::domain::block::wire::BlockRecord;
use crate::domain::block::{DataPoint, SeriesWindow, TimeLabelPolicy};
use crate::error::IngestError;
use crate::ws::ConnectionState;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// What to do with a push record whose height is below the latest point's.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightRegression {
    /// Append it anyway. The window is a trailing buffer, not a keyed store.
    #[default]
    Accept,
    /// Drop it with [`IngestError::HeightRegression`].
    Reject,
}

#[derive(Debug, Clone)]
pub struct ReconciliationCore {
    window: SeriesWindow,
    time_label: TimeLabelPolicy,
    height_regression: HeightRegression,
    seeded: bool,
    connection: ConnectionState,
    ingested: u64,
    dropped: u64,
}

impl ReconciliationCore {
    pub fn new(time_label: TimeLabelPolicy) -> Self {
        Self {
            window: SeriesWindow::new(),
            time_label,
            height_regression: HeightRegression::default(),
            seeded: false,
            connection: ConnectionState::Disconnected,
            ingested: 0,
            dropped: 0,
        }
    }

    pub fn with_height_regression(mut self, policy: HeightRegression) -> Self {
        self.height_regression = policy;
        self
    }

    /// Replace the window with snapshot points (oldest first).
    ///
    /// A later seed overwrites everything, including points appended since
    /// the previous one.
    pub fn seed(&mut self, points: Vec<DataPoint>) {
        tracing::debug!(points = points.len(), "Seeding series window");
        self.window.replace(points);
        self.seeded = true;
    }

    /// Decode one push message and append it, stamping receipt time now.
    pub fn ingest(&mut self, raw: &[u8]) -> Result<(), IngestError> {
        self.ingest_at(raw, Local::now())
    }

    /// Decode one push message received at `received_at` and append it.
    ///
    /// On error nothing is appended and the window is left as it was.
    pub fn ingest_at(
        &mut self,
        raw: &[u8],
        received_at: DateTime<Local>,
    ) -> Result<(), IngestError> {
        match self.decode(raw, &received_at) {
            Ok(point) => {
                self.window.append(point);
                self.ingested += 1;
                Ok(())
            }
            Err(e) => {
                self.dropped += 1;
                Err(e)
            }
        }
    }

    fn decode(
        &self,
        raw: &[u8],
        received_at: &DateTime<Local>,
    ) -> Result<DataPoint, IngestError> {
        let record: BlockRecord = serde_json::from_slice(raw)?;
        let point = record.into_point(self.time_label, received_at)?;

        if let Some(last) = self.window.latest() {
            if point.height < last.height {
                match self.height_regression {
                    HeightRegression::Accept => tracing::debug!(
                        previous = last.height,
                        received = point.height,
                        "Accepting out-of-order height"
                    ),
                    HeightRegression::Reject => {
                        return Err(IngestError::HeightRegression {
                            previous: last.height,
                            received: point.height,
                        })
                    }
                }
            }
        }

        Ok(point)
    }

    /// Record a push-channel transition. Never changes the window.
    pub fn observe(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    /// Owned copy of the window, oldest first.
    pub fn current(&self) -> Vec<DataPoint> {
        self.window.current()
    }

    pub fn window(&self) -> &SeriesWindow {
        &self.window
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
    }

    pub fn time_label(&self) -> TimeLabelPolicy {
        self.time_label
    }

    /// Messages appended since construction.
    pub fn ingested(&self) -> u64 {
        self.ingested
    }

    /// Messages rejected since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
