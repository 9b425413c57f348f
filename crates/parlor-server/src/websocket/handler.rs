//! Inbound frame decoding.
//!
//! Turns raw WebSocket frames into [`InboundEvent`]s. Frames that fail to
//! decode are logged and dropped; they never close the connection.

use axum::extract::ws::Message;
use parlor_core::{InboundEvent, ProtocolError};
use tracing::{debug, warn};

/// What the session loop should do with a frame.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A client event for the coordinator.
    Event(InboundEvent),
    /// Protocol ping/pong; liveness only.
    Control,
    /// The client asked to close.
    Close,
    /// Rejected and already logged.
    Dropped,
}

/// Decode one frame. Binary frames are accepted when they hold UTF-8 JSON.
pub fn decode_frame(message: Message, max_bytes: usize) -> Decoded {
    let parsed = match message {
        Message::Text(text) => InboundEvent::parse(text.as_str(), max_bytes),
        Message::Binary(data) => match std::str::from_utf8(&data) {
            Ok(text) => InboundEvent::parse(text, max_bytes),
            Err(_) => {
                debug!(len = data.len(), "dropping non-UTF8 binary frame");
                return Decoded::Dropped;
            }
        },
        Message::Ping(_) | Message::Pong(_) => return Decoded::Control,
        Message::Close(_) => return Decoded::Close,
    };
    match parsed {
        Ok(event) => Decoded::Event(event),
        Err(err) => {
            log_rejected(&err);
            Decoded::Dropped
        }
    }
}

fn log_rejected(err: &ProtocolError) {
    match err {
        ProtocolError::UnknownType(kind) => {
            debug!(kind = %kind, "ignoring unknown event type");
        }
        _ => warn!(reason = err.kind(), error = %err, "dropping invalid frame"),
    }
}
