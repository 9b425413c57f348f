//! Wire protocol between the server and browser clients.
//!
//! Every frame is a JSON object tagged by `type`. Field names are camelCase
//! except where the client already depends on the snake-case type tags
//! (`name_change`, `keep_alive`).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ProtocolError;
use crate::ids::ClientId;

/// `colorIndex` sent for sessions without a guest color.
pub const NO_COLOR: i64 = -1;

const INBOUND_TYPES: &[&str] = &[
    "message",
    "name_change",
    "typing",
    "stopTyping",
    "ping",
    "keep_alive",
];

/// Events sent by clients.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// Chat message.
    #[serde(rename = "message")]
    Message {
        /// Message text.
        content: String,
    },
    /// Rename the sender's session.
    #[serde(rename = "name_change")]
    NameChange {
        /// Requested display name.
        name: String,
    },
    /// Sender started typing.
    #[serde(rename = "typing")]
    Typing,
    /// Sender stopped typing.
    #[serde(rename = "stopTyping")]
    StopTyping,
    /// Application-level liveness probe; answered with `pong`.
    #[serde(rename = "ping")]
    Ping,
    /// Background keep-alive; no reply.
    #[serde(rename = "keep_alive")]
    KeepAlive,
}

impl InboundEvent {
    /// Decode a text frame.
    ///
    /// Frames over `max_bytes` are rejected before parsing. A JSON object
    /// whose `type` is not recognised yields [`ProtocolError::UnknownType`];
    /// anything else that fails to decode is [`ProtocolError::Malformed`].
    pub fn parse(text: &str, max_bytes: usize) -> Result<Self, ProtocolError> {
        if text.len() > max_bytes {
            return Err(ProtocolError::Oversized {
                len: text.len(),
                max: max_bytes,
            });
        }
        let value: Value =
            serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Err(ProtocolError::Malformed("missing string field `type`".into()));
        };
        if !INBOUND_TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_owned()));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::NameChange { .. } => "name_change",
            Self::Typing => "typing",
            Self::StopTyping => "stopTyping",
            Self::Ping => "ping",
            Self::KeepAlive => "keep_alive",
        }
    }
}

/// One entry of a participant list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Public client ID.
    pub id: ClientId,
    /// Whether this session currently holds the host role.
    pub is_host: bool,
    /// Join time, epoch milliseconds. Lists are ordered by this field.
    pub join_time: i64,
    /// Display name.
    pub name: String,
    /// Guest color index, or [`NO_COLOR`].
    pub color_index: i64,
}

/// Events sent by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum OutboundEvent {
    /// Reconnection token for a brand-new session. Never broadcast.
    #[serde(rename = "session", rename_all = "camelCase")]
    Session {
        /// The raw token.
        session_id: String,
    },
    /// Private state snapshot sent right after a connection is bound.
    #[serde(rename = "init", rename_all = "camelCase")]
    Init {
        /// The receiver's public ID.
        client_id: ClientId,
        /// Whether the receiver is the host.
        is_host: bool,
        /// The receiver's color index, or [`NO_COLOR`].
        color_index: i64,
        /// Current participants ordered by join time.
        participants: Vec<Participant>,
    },
    /// Room-wide participant list update.
    #[serde(rename = "participants")]
    Participants {
        /// Current participants ordered by join time.
        participants: Vec<Participant>,
    },
    /// Chat message, echoed to the sender too.
    #[serde(rename = "message", rename_all = "camelCase")]
    Message {
        /// Message text.
        content: String,
        /// Sender's public ID.
        sender_id: ClientId,
        /// Sender's display name at send time.
        sender_name: String,
        /// Whether the sender is the host.
        is_host: bool,
        /// Server-assigned epoch milliseconds, strictly increasing.
        timestamp: i64,
    },
    /// A participant renamed themselves.
    #[serde(rename = "name_change", rename_all = "camelCase")]
    NameChange {
        /// Renamed client.
        client_id: ClientId,
        /// New display name.
        name: String,
        /// Whether the renamed client is the host.
        is_host: bool,
    },
    /// A participant started typing.
    #[serde(rename = "typing", rename_all = "camelCase")]
    Typing {
        /// Typing client.
        client_id: ClientId,
        /// Whether the typing client is the host.
        is_host: bool,
    },
    /// A participant stopped typing.
    #[serde(rename = "stopTyping", rename_all = "camelCase")]
    StopTyping {
        /// Client that stopped typing.
        client_id: ClientId,
        /// Whether that client is the host.
        is_host: bool,
    },
    /// Reply to an application `ping`.
    #[serde(rename = "pong")]
    Pong,
}

impl OutboundEvent {
    /// Whether this event may only go to its owner.
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Session { .. })
    }

    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::Init { .. } => "init",
            Self::Participants { .. } => "participants",
            Self::Message { .. } => "message",
            Self::NameChange { .. } => "name_change",
            Self::Typing { .. } => "typing",
            Self::StopTyping { .. } => "stopTyping",
            Self::Pong => "pong",
        }
    }
}

/// Map an optional guest color to its wire value.
pub fn wire_color(color_index: Option<u32>) -> i64 {
    color_index.map_or(NO_COLOR, i64::from)
}
