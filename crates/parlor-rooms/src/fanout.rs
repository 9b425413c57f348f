//! Broadcast fan-out: serialize an event once and queue it on each target.
//!
//! Sends never block. A full queue drops the frame for that connection only;
//! a closed queue is reported back in [`Delivery::closed`] so the coordinator
//! can run the normal disconnect transition for it.

use std::sync::Arc;

use parlor_core::{ConnectionId, OutboundEvent};
use tracing::{debug, error, warn};

use crate::connection::{ClientConnection, SendError};

/// Outcome of a fan-out.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Connections the frame was queued on.
    pub delivered: usize,
    /// Connections whose queue was full.
    pub dropped: usize,
    /// Connections found closed.
    pub closed: Vec<ConnectionId>,
}

impl Delivery {
    fn record(&mut self, connection: &ClientConnection, result: Result<(), SendError>, kind: &str) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(SendError::Full) => {
                self.dropped += 1;
                warn!(
                    connection_id = %connection.id,
                    event_type = kind,
                    dropped_total = connection.drop_count(),
                    "outbound queue full, dropping event"
                );
            }
            Err(SendError::Closed) => {
                debug!(connection_id = %connection.id, event_type = kind, "send to closed connection");
                self.closed.push(connection.id.clone());
            }
        }
    }
}

fn encode(event: &OutboundEvent) -> Option<Arc<str>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            error!(event_type = event.kind(), error = %e, "failed to serialize event");
            None
        }
    }
}

/// Send an event to a single connection. The only way to deliver private events.
pub fn send_to(connection: &ClientConnection, event: &OutboundEvent) -> Delivery {
    let mut delivery = Delivery::default();
    if let Some(json) = encode(event) {
        delivery.record(connection, connection.send(json), event.kind());
    }
    delivery
}

/// Send an event to every target, optionally skipping one connection.
///
/// Private events are refused outright.
pub fn broadcast<'a, I>(targets: I, event: &OutboundEvent, exclude: Option<&ConnectionId>) -> Delivery
where
    I: IntoIterator<Item = &'a Arc<ClientConnection>>,
{
    let mut delivery = Delivery::default();
    if event.is_private() {
        error!(event_type = event.kind(), "refusing to broadcast private event");
        return delivery;
    }
    let Some(json) = encode(event) else {
        return delivery;
    };
    for connection in targets {
        if exclude == Some(&connection.id) {
            continue;
        }
        delivery.record(connection, connection.send(Arc::clone(&json)), event.kind());
    }
    debug!(
        event_type = event.kind(),
        recipients = delivery.delivered,
        dropped = delivery.dropped,
        closed = delivery.closed.len(),
        "broadcast event"
    );
    delivery
}
