//! The Room Session Coordinator actor.
//!
//! One tokio task owns the Session Store, Room Registry, connection index and
//! timers. Every entry point is a [`Command`] on a single unbounded channel,
//! so transitions are serialized without locks and never await I/O. Timer
//! tasks post back onto the same channel through a weak sender, which lets
//! the actor stop once every [`CoordinatorHandle`] is gone.

mod machine;

use std::sync::Arc;

use parlor_core::{ClientId, ConnectionId, InboundEvent, Participant, RoomId, SessionToken};
use parlor_settings::RoomSettings;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::connection::ClientConnection;
use crate::timers::TimerEvent;
use crate::{Result, RoomError};

pub(crate) use machine::Coordinator;

/// Work items processed by the actor, in arrival order.
#[derive(Debug)]
pub(crate) enum Command {
    Join {
        room_id: RoomId,
        token: Option<SessionToken>,
        connection: Arc<ClientConnection>,
    },
    Inbound {
        connection_id: ConnectionId,
        event: InboundEvent,
    },
    Disconnect {
        connection_id: ConnectionId,
    },
    Timer(TimerEvent),
    Stats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
    Snapshot {
        room_id: RoomId,
        reply: oneshot::Sender<Option<RoomSnapshot>>,
    },
}

/// Process-wide counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Live rooms.
    pub rooms: usize,
    /// Known sessions, including detached ones.
    pub sessions: usize,
    /// Bound live connections.
    pub connections: usize,
    /// Pending host-eviction and guest-retention timers.
    pub pending_evictions: usize,
}

/// Read-only view of one room.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Room ID.
    pub room_id: RoomId,
    /// Current host's public ID.
    pub host: Option<ClientId>,
    /// Participants in join order.
    pub participants: Vec<Participant>,
    /// Members with a live connection.
    pub connected: usize,
    /// Whether the host is inside its eviction grace period.
    pub host_in_grace: bool,
    /// Whether a teardown check is pending.
    pub teardown_pending: bool,
    /// Next guest color to hand out.
    pub next_color_index: u32,
}

/// Cloneable front door to the coordinator task.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    fn send(&self, command: Command) -> Result<()> {
        self.tx.send(command).map_err(|_| RoomError::CoordinatorClosed)
    }

    /// Bind a new connection to a room, resuming the session behind `token`
    /// when it is known for that room.
    pub fn join(
        &self,
        room_id: RoomId,
        token: Option<SessionToken>,
        connection: Arc<ClientConnection>,
    ) -> Result<()> {
        self.send(Command::Join {
            room_id,
            token,
            connection,
        })
    }

    /// Deliver a decoded client event.
    pub fn inbound(&self, connection_id: ConnectionId, event: InboundEvent) -> Result<()> {
        self.send(Command::Inbound {
            connection_id,
            event,
        })
    }

    /// Report that a connection's transport has closed.
    pub fn disconnect(&self, connection_id: ConnectionId) -> Result<()> {
        self.send(Command::Disconnect { connection_id })
    }

    /// Fetch process-wide counters.
    pub async fn stats(&self) -> Result<CoordinatorStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply })?;
        rx.await.map_err(|_| RoomError::CoordinatorClosed)
    }

    /// Fetch a snapshot of one room, `None` if it does not exist.
    pub async fn room_snapshot(&self, room_id: RoomId) -> Result<Option<RoomSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { room_id, reply })?;
        rx.await.map_err(|_| RoomError::CoordinatorClosed)
    }
}

/// Start the coordinator task.
///
/// The task stops when `cancel` fires or every handle is dropped; on the way
/// out it cancels all timers and closes every bound connection.
pub fn spawn_coordinator(
    settings: RoomSettings,
    cancel: CancellationToken,
) -> (CoordinatorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let coordinator = Coordinator::new(settings, tx.downgrade());
    let task = tokio::spawn(run(coordinator, rx, cancel));
    (CoordinatorHandle { tx }, task)
}

async fn run(
    mut coordinator: Coordinator,
    mut rx: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
) {
    info!("room coordinator started");
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => coordinator.handle(command),
                None => break,
            },
        }
    }
    coordinator.shutdown();
    info!("room coordinator stopped");
}
