//! Connection liveness monitor.
//!
//! On every tick the monitor checks when the connection last showed signs of
//! life. Past the timeout it gives up and the caller terminates the
//! transport; the normal close path then reports the disconnect. Otherwise it
//! clears the alive flag and queues a protocol-level ping.

use std::sync::Arc;
use std::time::Duration;

use parlor_rooms::{ClientConnection, SendError};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Outcome of the heartbeat loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No liveness signal within the timeout window.
    TimedOut,
    /// The connection closed on its own.
    Closed,
    /// The heartbeat was cancelled externally.
    Cancelled,
}

/// Run heartbeat probes for a connection until it dies, closes, or `cancel`
/// fires.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the immediate first tick
    let _ = ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.last_seen_elapsed() > timeout {
                    return HeartbeatResult::TimedOut;
                }
                // Pending until the next liveness signal
                let _ = connection.check_alive();
                if connection.probe() == Err(SendError::Closed) {
                    return HeartbeatResult::Closed;
                }
            }
            () = connection.closed() => return HeartbeatResult::Closed,
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
        }
    }
}
