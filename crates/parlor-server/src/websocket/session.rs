//! WebSocket session lifecycle: handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use parlor_core::{ConnectionId, RoomId, SessionToken};
use parlor_rooms::{ClientConnection, CoordinatorHandle, Outbound};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use super::handler::{Decoded, decode_frame};
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::config::ServerConfig;

/// How long the writer may take to flush a close frame.
const WRITER_DRAIN: Duration = Duration::from_secs(2);

/// Run a WebSocket session for a connected client.
///
/// 1. Registers a [`ClientConnection`] and asks the coordinator to join it
/// 2. Forwards queued events and pings to the socket from a writer task
/// 3. Runs the liveness monitor, which closes the connection on timeout
/// 4. Decodes inbound frames and hands events to the coordinator
/// 5. Reports the disconnect once the socket or the connection closes
#[instrument(skip_all, fields(room_id = %room_id, connection_id = tracing::field::Empty))]
pub async fn run_ws_session(
    ws: WebSocket,
    room_id: RoomId,
    token: Option<SessionToken>,
    coordinator: CoordinatorHandle,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (send_tx, mut send_rx) = mpsc::channel::<Outbound>(config.outbound_queue);
    let connection = Arc::new(ClientConnection::new(ConnectionId::generate(), send_tx));
    let _ = Span::current().record("connection_id", tracing::field::display(&connection.id));
    info!(resume = token.is_some(), "client connected");

    if coordinator.join(room_id, token, Arc::clone(&connection)).is_err() {
        warn!("coordinator unavailable, dropping connection");
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    // Outbound forwarder
    let writer_conn = Arc::clone(&connection);
    let forward = async move {
        loop {
            tokio::select! {
                frame = send_rx.recv() => {
                    let message = match frame {
                        Some(Outbound::Text(text)) => Message::Text(text.as_ref().into()),
                        Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                        None => break,
                    };
                    if ws_tx.send(message).await.is_err() {
                        break;
                    }
                }
                () = writer_conn.closed() => break,
            }
        }
        let _ = ws_tx.send(Message::Close(None)).await;
        writer_conn.close();
    };
    let mut writer = tokio::spawn(forward.in_current_span());

    // Liveness monitor
    let heartbeat_conn = Arc::clone(&connection);
    let interval = config.heartbeat_interval();
    let timeout = config.heartbeat_timeout();
    let monitor = async move {
        let result = run_heartbeat(Arc::clone(&heartbeat_conn), interval, timeout, shutdown).await;
        if result == HeartbeatResult::TimedOut {
            warn!(
                silent_secs = heartbeat_conn.last_seen_elapsed().as_secs(),
                "client unresponsive, terminating"
            );
        }
        heartbeat_conn.close();
    };
    let heartbeat = tokio::spawn(monitor.in_current_span());

    // Inbound frames
    loop {
        let frame = tokio::select! {
            frame = ws_rx.next() => frame,
            () = connection.closed() => break,
        };
        let Some(Ok(message)) = frame else { break };
        connection.mark_alive();

        match decode_frame(message, config.max_frame_bytes) {
            Decoded::Event(event) => {
                debug!(event_type = event.kind(), "inbound event");
                if coordinator.inbound(connection.id.clone(), event).is_err() {
                    break;
                }
            }
            Decoded::Close => {
                debug!("client sent close frame");
                break;
            }
            Decoded::Control | Decoded::Dropped => {}
        }
    }

    // Clean up
    connection.close();
    let _ = coordinator.disconnect(connection.id.clone());
    heartbeat.abort();
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(
        age_secs = connection.age().as_secs(),
        dropped_messages = connection.drop_count(),
        "client disconnected"
    );
}
