//! Native push-channel client: `tokio-tungstenite`.
//!
//! - Background tokio task owns the socket
//! - Ordered event delivery (state changes, raw payloads, errors) over one channel
//! - Optional keepalive ping with pong deadline
//! - Optional exponential backoff reconnection
//! - `close()` cancels in-flight connects and discards undelivered payloads
//! - Undelivered payloads are capped at `PushConfig::event_buffer`; excess is dropped

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::ConnectionError;
use crate::ws::{ConnectionEvent, ConnectionState, PushConfig, ReconnectPolicy};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `close()` waits for the task before aborting it.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on sending our close frame to a peer that stopped reading.
const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Close,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

enum DisconnectReason {
    UserRequested,
    Lost,
}

// ─── Payload backlog ─────────────────────────────────────────────────────────

/// Payloads queued but not yet taken by the reader.
///
/// State and error events are never dropped; only `Message` payloads count
/// against the limit.
#[derive(Default)]
struct Backlog {
    queued: AtomicUsize,
    overflowed: AtomicU64,
}

// ─── Background task state ───────────────────────────────────────────────────

struct TaskState {
    config: PushConfig,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    cmd_rx: mpsc::Receiver<Command>,
    reconnect_attempts: u32,
    state: Arc<AtomicU8>,
    backlog: Arc<Backlog>,
}

impl TaskState {
    fn emit(&self, event: ConnectionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_message(&self, payload: Vec<u8>) {
        let limit = self.config.event_buffer.max(1);
        if self.backlog.queued.load(Ordering::SeqCst) >= limit {
            let dropped = self.backlog.overflowed.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::warn!(limit, dropped, "Event buffer full, dropping push message");
            return;
        }
        self.backlog.queued.fetch_add(1, Ordering::SeqCst);
        self.emit(ConnectionEvent::Message(payload));
    }

    fn transition(&self, next: ConnectionState) {
        self.state.store(next as u8, Ordering::SeqCst);
        self.emit(ConnectionEvent::StateChanged(next));
    }

    fn current(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    /// `→ Closing → Disconnected`, skipping `Closing` if already there.
    fn teardown(&self) {
        if self.current() != ConnectionState::Closing {
            self.transition(ConnectionState::Closing);
        }
        self.transition(ConnectionState::Disconnected);
    }
}

// ─── Public ConnectionManager ────────────────────────────────────────────────

/// Owns one logical push subscription.
///
/// A background tokio task holds the socket; the manager talks to it over
/// mpsc channels. Events are read with [`ConnectionManager::next_event`].
pub struct ConnectionManager {
    config: PushConfig,
    cmd_tx: Option<mpsc::Sender<Command>>,
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
    event_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    task_handle: Option<JoinHandle<()>>,
    state: Arc<AtomicU8>,
    backlog: Arc<Backlog>,
}

impl ConnectionManager {
    /// Create a manager. Does not connect yet.
    pub fn new(config: PushConfig) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            config,
            cmd_tx: None,
            event_tx,
            event_rx,
            task_handle: None,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
            backlog: Arc::new(Backlog::default()),
        }
    }

    /// Start connecting. Must be called inside a tokio runtime.
    ///
    /// Failures are reported as events, never returned. Calling `open` while
    /// a connection task is alive does nothing.
    pub fn open(&mut self) {
        if self
            .task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
        {
            return;
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        self.cmd_tx = Some(cmd_tx);
        self.state
            .store(ConnectionState::Connecting as u8, Ordering::SeqCst);

        let state = TaskState {
            config: self.config.clone(),
            event_tx: self.event_tx.clone(),
            cmd_rx,
            reconnect_attempts: 0,
            state: Arc::clone(&self.state),
            backlog: Arc::clone(&self.backlog),
        };

        self.task_handle = Some(tokio::spawn(run_task(state)));
    }

    /// Tear the channel down and wait for the task to finish.
    ///
    /// Safe to call in any state, including mid-connect. When this returns
    /// the state is `Disconnected` and no payload from this channel will be
    /// delivered by [`ConnectionManager::next_event`].
    pub async fn close(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.try_send(Command::Close);
        }

        if let Some(mut handle) = self.task_handle.take() {
            if tokio::time::timeout(CLOSE_TIMEOUT, &mut handle).await.is_err() {
                tracing::warn!("Push channel task did not stop in time, aborting");
                handle.abort();
                // An aborted task may still be mid-poll; wait until it is gone
                // before draining.
                let _ = handle.await;
            }
        }

        let mut kept = Vec::new();
        let mut discarded = 0usize;
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ConnectionEvent::Message(_) => discarded += 1,
                other => kept.push(other),
            }
        }
        self.backlog.queued.store(0, Ordering::SeqCst);
        if discarded > 0 {
            tracing::debug!(discarded, "Discarded undelivered messages on close");
        }
        for event in kept {
            let _ = self.event_tx.send(event);
        }

        if self.state() != ConnectionState::Disconnected {
            self.state
                .store(ConnectionState::Disconnected as u8, Ordering::SeqCst);
            let _ = self
                .event_tx
                .send(ConnectionEvent::StateChanged(ConnectionState::Disconnected));
        }
    }

    /// Wait for the next event. Pending forever while idle.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        let event = self.event_rx.recv().await?;
        Some(self.delivered(event))
    }

    /// Next already-queued event, if any.
    pub fn try_next_event(&mut self) -> Option<ConnectionEvent> {
        let event = self.event_rx.try_recv().ok()?;
        Some(self.delivered(event))
    }

    fn delivered(&self, event: ConnectionEvent) -> ConnectionEvent {
        if let ConnectionEvent::Message(_) = event {
            self.backlog.queued.fetch_sub(1, Ordering::SeqCst);
        }
        event
    }

    /// Payloads dropped because `event_buffer` undelivered ones were queued.
    pub fn overflowed(&self) -> u64 {
        self.backlog.overflowed.load(Ordering::SeqCst)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn config(&self) -> &PushConfig {
        &self.config
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    let url = state.config.url.clone();
    let connect_timeout = state.config.connect_timeout;

    loop {
        // ── 1. Attempt connection (cancellable) ──────────────────────────
        state.transition(ConnectionState::Connecting);

        let connected = tokio::select! {
            biased;
            _ = state.cmd_rx.recv() => {
                tracing::debug!("Close requested while connecting");
                state.teardown();
                return;
            }
            result = attempt_connect(&url, connect_timeout) => result,
        };

        // ── 2. Run until the channel breaks ──────────────────────────────
        match connected {
            Ok(ws) => {
                state.reconnect_attempts = 0;
                state.transition(ConnectionState::Open);
                tracing::info!(url = %url, "Push channel open");

                let reason = run_open(&mut state, ws).await;
                state.teardown();

                if let DisconnectReason::UserRequested = reason {
                    return;
                }
            }
            Err(e) => {
                tracing::error!("Push channel connection failed: {}", e);
                state.emit(ConnectionEvent::Error(e));
                state.teardown();
            }
        }

        // ── 3. Reconnect decision ────────────────────────────────────────
        let Some(delay) = state
            .config
            .reconnect
            .delay_for_attempt(state.reconnect_attempts)
        else {
            if !matches!(state.config.reconnect, ReconnectPolicy::Disabled) {
                tracing::warn!(
                    attempts = state.reconnect_attempts,
                    "Giving up on push channel"
                );
                state.emit(ConnectionEvent::Error(ConnectionError::ReconnectExhausted {
                    attempts: state.reconnect_attempts,
                }));
            }
            return;
        };

        state.reconnect_attempts += 1;
        tracing::info!(
            "Reconnect attempt {} in {}ms",
            state.reconnect_attempts,
            delay.as_millis()
        );

        tokio::select! {
            biased;
            _ = state.cmd_rx.recv() => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// The open-connection loop. Runs until the channel breaks or close is requested.
async fn run_open(state: &mut TaskState, ws: WsStream) -> DisconnectReason {
    let (mut sink, mut stream): (SplitSink<WsStream, Message>, SplitStream<WsStream>) =
        ws.split();

    let ping_every = state.config.ping_interval.filter(|d| !d.is_zero());
    let pong_timeout = state.config.pong_timeout;

    let mut ping_interval =
        tokio::time::interval(ping_every.unwrap_or(Duration::from_secs(3600)));
    ping_interval.reset(); // skip immediate first tick

    let mut awaiting_pong = false;
    let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
    let pong_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(pong_sleep);

    loop {
        tokio::select! {
            biased;

            // ── a) Close from the public API (or manager dropped) ────────
            _ = state.cmd_rx.recv() => {
                state.transition(ConnectionState::Closing);
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "Client disconnect".into(),
                };
                let _ = tokio::time::timeout(
                    CLOSE_FRAME_TIMEOUT,
                    sink.send(Message::Close(Some(frame))),
                )
                .await;
                return DisconnectReason::UserRequested;
            }

            // ── b) Incoming frame ────────────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        state.emit_message(text.as_str().as_bytes().to_vec());
                    }
                    Some(Ok(Message::Binary(data))) => {
                        state.emit_message(data.to_vec());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                        pong_sleep.as_mut().reset(far_future);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!(code, reason = %reason, "Push channel closed by peer");
                        state.emit(ConnectionEvent::Error(ConnectionError::Closed {
                            code: Some(code),
                            reason,
                        }));
                        return DisconnectReason::Lost;
                    }
                    Some(Ok(_)) => {} // raw frames are not surfaced by the reader
                    Some(Err(e)) => {
                        tracing::error!("Push channel error: {}", e);
                        state.emit(ConnectionEvent::Error(e.into()));
                        return DisconnectReason::Lost;
                    }
                    None => {
                        tracing::warn!("Push channel stream ended");
                        state.emit(ConnectionEvent::Error(ConnectionError::Closed {
                            code: None,
                            reason: "Stream ended".into(),
                        }));
                        return DisconnectReason::Lost;
                    }
                }
            }

            // ── c) Keepalive ping ────────────────────────────────────────
            _ = ping_interval.tick(), if ping_every.is_some() => {
                if let Err(e) = sink.send(Message::Ping(Default::default())).await {
                    tracing::warn!("Failed to send ping: {}", e);
                } else if !awaiting_pong {
                    awaiting_pong = true;
                    pong_sleep
                        .as_mut()
                        .reset(tokio::time::Instant::now() + pong_timeout);
                }
            }

            // ── d) Pong timeout ──────────────────────────────────────────
            () = &mut pong_sleep, if awaiting_pong => {
                tracing::warn!(
                    "Pong timeout, no response within {}ms",
                    pong_timeout.as_millis()
                );
                state.emit(ConnectionEvent::Error(ConnectionError::PongTimeout));
                let _ = sink.close().await;
                return DisconnectReason::Lost;
            }
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

async fn attempt_connect(url: &str, timeout: Duration) -> Result<WsStream, ConnectionError> {
    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(url))
        .await
        .map_err(|_| ConnectionError::ConnectTimeout)??;
    Ok(ws_stream)
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
