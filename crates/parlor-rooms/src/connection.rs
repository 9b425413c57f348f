//! Live transport handle shared by the gateway and the coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use parlor_core::ConnectionId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Frames queued for a connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized JSON event.
    Text(Arc<str>),
    /// Protocol-level liveness probe.
    Ping,
}

/// Why a frame could not be queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendError {
    /// The outbound queue is full; the frame was dropped.
    Full,
    /// The writer has gone away; the connection is dead.
    Closed,
}

/// A connected client transport.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Bounded queue drained by the writer task.
    tx: mpsc::Sender<Outbound>,
    /// When this connection was established.
    connected_at: Instant,
    /// Set by every liveness signal, cleared before each probe.
    is_alive: AtomicBool,
    /// When the last liveness signal was received.
    last_seen: Mutex<Instant>,
    /// Count of frames dropped due to a full queue.
    dropped_messages: AtomicU64,
    /// Cancelled to terminate the transport.
    closed: CancellationToken,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        let now = Instant::now();
        Self {
            id,
            tx,
            connected_at: now,
            is_alive: AtomicBool::new(true),
            last_seen: Mutex::new(now),
            dropped_messages: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Queue a serialized event without waiting.
    pub fn send(&self, text: Arc<str>) -> Result<(), SendError> {
        self.enqueue(Outbound::Text(text))
    }

    /// Queue a protocol-level ping.
    pub fn probe(&self) -> Result<(), SendError> {
        self.enqueue(Outbound::Ping)
    }

    fn enqueue(&self, frame: Outbound) -> Result<(), SendError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Record a liveness signal (pong, ping, keep-alive or any frame).
    pub fn mark_alive(&self) {
        self.is_alive.store(true, Ordering::Relaxed);
        *self.last_seen.lock() = Instant::now();
    }

    /// Check and reset the alive flag.
    ///
    /// Returns `true` if a liveness signal arrived since the last check.
    pub fn check_alive(&self) -> bool {
        self.is_alive.swap(false, Ordering::Relaxed)
    }

    /// Time since the last liveness signal (or connection establishment).
    pub fn last_seen_elapsed(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Ask the transport to shut down. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection has been closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
