//! Session Store: reconnection token → durable session record.
//!
//! A session outlives any single socket. Guests whose connection drops stay
//! here detached, so replaying the token restores the same client ID and
//! color; records are purged when their room is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_core::protocol::{Participant, wire_color};
use parlor_core::{ClientId, RoomId, SessionToken};

use crate::connection::ClientConnection;

/// Session role within its room.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Room owner. At most one per room.
    Host,
    /// Everyone else.
    Guest,
}

/// Durable per-session state.
#[derive(Debug)]
pub struct Session {
    /// Reconnection credential. Never broadcast.
    pub token: SessionToken,
    /// Public identifier used in protocol messages.
    pub client_id: ClientId,
    /// Owning room.
    pub room_id: RoomId,
    /// Current role.
    pub role: Role,
    /// Guest color, assigned once at creation.
    pub color_index: Option<u32>,
    /// Display name.
    pub display_name: String,
    /// Creation time, epoch milliseconds.
    pub joined_at: i64,
    /// Last inbound activity, epoch milliseconds.
    pub last_active_at: i64,
    /// Live transport, if any.
    pub connection: Option<Arc<ClientConnection>>,
    /// When the last connection dropped, cleared on reconnect.
    pub disconnected_at: Option<i64>,
}

impl Session {
    /// Whether this session holds the host role.
    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    /// Whether a live transport is bound.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Participant-list entry for this session.
    pub fn participant(&self) -> Participant {
        Participant {
            id: self.client_id.clone(),
            is_host: self.is_host(),
            join_time: self.joined_at,
            name: self.display_name.clone(),
            color_index: wire_color(self.color_index),
        }
    }
}

/// Placeholder name for a new session: `Host`, or `Guest N` with N = color + 1.
pub fn default_display_name(role: Role, color_index: Option<u32>) -> String {
    match (role, color_index) {
        (Role::Host, _) | (Role::Guest, None) => "Host".to_string(),
        (Role::Guest, Some(color)) => format!("Guest {}", u64::from(color) + 1),
    }
}

/// All sessions known to the process, keyed by token.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<SessionToken, Session>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh token and client ID.
    pub fn create(
        &mut self,
        room_id: RoomId,
        role: Role,
        color_index: Option<u32>,
        joined_at: i64,
    ) -> &mut Session {
        let mut token = SessionToken::generate();
        while self.sessions.contains_key(&token) {
            token = SessionToken::generate();
        }
        let session = Session {
            token: token.clone(),
            client_id: ClientId::generate(),
            room_id,
            role,
            color_index,
            display_name: default_display_name(role, color_index),
            joined_at,
            last_active_at: joined_at,
            connection: None,
            disconnected_at: None,
        };
        self.sessions.entry(token).or_insert(session)
    }

    /// Look up a session by token. Never mutates.
    pub fn resolve(&self, token: &SessionToken) -> Option<&Session> {
        self.sessions.get(token)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, token: &SessionToken) -> Option<&mut Session> {
        self.sessions.get_mut(token)
    }

    /// Bind a live connection, returning the one it replaces.
    pub fn rebind(
        &mut self,
        token: &SessionToken,
        connection: Arc<ClientConnection>,
    ) -> Option<Arc<ClientConnection>> {
        let session = self.sessions.get_mut(token)?;
        session.disconnected_at = None;
        session.connection.replace(connection)
    }

    /// Record inbound activity.
    pub fn touch(&mut self, token: &SessionToken, at: i64) {
        if let Some(session) = self.sessions.get_mut(token) {
            session.last_active_at = at;
        }
    }

    /// Clear the live connection and stamp the disconnect time.
    pub fn detach(&mut self, token: &SessionToken, at: i64) -> Option<Arc<ClientConnection>> {
        let session = self.sessions.get_mut(token)?;
        session.disconnected_at = Some(at);
        session.connection.take()
    }

    /// Forget a session.
    pub fn remove(&mut self, token: &SessionToken) -> Option<Session> {
        self.sessions.remove(token)
    }

    /// Forget every session of a room. Returns how many were removed.
    pub fn purge_room(&mut self, room_id: &RoomId) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| &s.room_id != room_id);
        before - self.sessions.len()
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Iterate over every session.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }
}
