//! Coordinator state and transitions.
//!
//! Per-session lifecycle: `Joining → Active → Disconnected(grace) →
//! {Reconnected | Evicted}`. Only hosts keep their room slot through the
//! grace period. A guest whose connection drops leaves the room at once but
//! keeps its store record for `guest_retention`, so a reconnect inside that
//! window restores its client ID and color.
//!
//! Every method here is synchronous. Sends go through [`fanout`], and any
//! connection found closed while sending is queued in `pending_disconnects`
//! and run through [`Coordinator::disconnect`] before the next command.

use std::collections::HashMap;
use std::sync::Arc;

use parlor_core::{ConnectionId, InboundEvent, OutboundEvent, Participant, RoomId, SessionToken};
use parlor_settings::RoomSettings;
use tokio::sync::mpsc::WeakUnboundedSender;
use tracing::{debug, info, warn};

use super::{Command, CoordinatorStats, RoomSnapshot};
use crate::clock::Clock;
use crate::connection::ClientConnection;
use crate::fanout::{self, Delivery};
use crate::registry::RoomRegistry;
use crate::store::{Role, SessionStore};
use crate::timers::{TimerEvent, Timers};

pub(crate) struct Coordinator {
    settings: RoomSettings,
    store: SessionStore,
    registry: RoomRegistry,
    /// Bound live connections. A connection missing here is unbound or stale.
    connections: HashMap<ConnectionId, SessionToken>,
    evictions: Timers<SessionToken>,
    clock: Clock,
    pending_disconnects: Vec<ConnectionId>,
}

impl Coordinator {
    pub(crate) fn new(settings: RoomSettings, sink: WeakUnboundedSender<Command>) -> Self {
        Self {
            registry: RoomRegistry::new(settings.teardown_grace(), sink.clone()),
            evictions: Timers::new(sink),
            settings,
            store: SessionStore::new(),
            connections: HashMap::new(),
            clock: Clock::new(),
            pending_disconnects: Vec::new(),
        }
    }

    pub(crate) fn handle(&mut self, command: Command) {
        match command {
            Command::Join {
                room_id,
                token,
                connection,
            } => self.join(&room_id, token, connection),
            Command::Inbound {
                connection_id,
                event,
            } => self.inbound(&connection_id, event),
            Command::Disconnect { connection_id } => self.disconnect(&connection_id),
            Command::Timer(TimerEvent::Eviction { token, generation }) => {
                self.eviction_fired(&token, generation);
            }
            Command::Timer(TimerEvent::Teardown {
                room_id,
                generation,
            }) => self.teardown_fired(&room_id, generation),
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            Command::Snapshot { room_id, reply } => {
                let _ = reply.send(self.snapshot(&room_id));
            }
        }
        self.drain_pending_disconnects();
    }

    // ── Join ────────────────────────────────────────────────────────────

    pub(crate) fn join(
        &mut self,
        room_id: &RoomId,
        token: Option<SessionToken>,
        connection: Arc<ClientConnection>,
    ) {
        let now = self.clock.now();
        self.registry.cancel_teardown_check(room_id);
        self.registry.get_or_create(room_id, now).touch(now);

        let known = token.filter(|t| {
            self.store
                .resolve(t)
                .is_some_and(|session| &session.room_id == room_id)
        });
        match known {
            Some(token) => self.resume(room_id, &token, connection),
            None => self.create_session(room_id, connection, now),
        }
    }

    fn create_session(&mut self, room_id: &RoomId, connection: Arc<ClientConnection>, now: i64) {
        let Some(room) = self.registry.get_mut(room_id) else {
            return;
        };
        let (role, color_index) = if room.host().is_none() {
            (Role::Host, None)
        } else {
            (Role::Guest, Some(room.allocate_color()))
        };

        let session = self.store.create(room_id.clone(), role, color_index, now);
        session.connection = Some(Arc::clone(&connection));
        let token = session.token.clone();
        let client_id = session.client_id.clone();

        room.insert(token.clone(), now);
        if role == Role::Host {
            room.set_host(Some(token.clone()));
        }
        let _ = self.connections.insert(connection.id.clone(), token.clone());

        info!(
            room_id = %room_id,
            client_id = %client_id,
            connection_id = %connection.id,
            is_host = role == Role::Host,
            "session created"
        );

        let private = OutboundEvent::Session {
            session_id: token.expose().to_owned(),
        };
        self.deliver(fanout::send_to(&connection, &private));
        self.send_init(&token, &connection);
        self.broadcast_participants(room_id);
    }

    fn resume(&mut self, room_id: &RoomId, token: &SessionToken, connection: Arc<ClientConnection>) {
        let previous = self.store.rebind(token, Arc::clone(&connection));
        if let Some(previous) = previous.filter(|old| old.id != connection.id) {
            let _ = self.connections.remove(&previous.id);
            previous.close();
            debug!(connection_id = %previous.id, "unbound superseded connection");
        }
        let _ = self.connections.insert(connection.id.clone(), token.clone());
        let _ = self.evictions.cancel(token);

        let (Some(room), Some(session)) =
            (self.registry.get_mut(room_id), self.store.get_mut(token))
        else {
            return;
        };
        room.insert(token.clone(), session.joined_at);
        if room.host().is_none() {
            room.set_host(Some(token.clone()));
            session.role = Role::Host;
        }

        info!(
            room_id = %room_id,
            client_id = %session.client_id,
            connection_id = %connection.id,
            is_host = session.is_host(),
            "session resumed"
        );

        self.send_init(token, &connection);
        self.broadcast_participants(room_id);
    }

    fn send_init(&mut self, token: &SessionToken, connection: &ClientConnection) {
        let Some(session) = self.store.resolve(token) else {
            return;
        };
        let init = OutboundEvent::Init {
            client_id: session.client_id.clone(),
            is_host: session.is_host(),
            color_index: session.participant().color_index,
            participants: self.participants(&session.room_id),
        };
        self.deliver(fanout::send_to(connection, &init));
    }

    // ── Inbound ─────────────────────────────────────────────────────────

    pub(crate) fn inbound(&mut self, connection_id: &ConnectionId, event: InboundEvent) {
        let Some(token) = self.connections.get(connection_id).cloned() else {
            debug!(connection_id = %connection_id, event_type = event.kind(), "event from unbound connection");
            return;
        };
        let now = self.clock.now();
        self.store.touch(&token, now);
        let Some(session) = self.store.get_mut(&token) else {
            return;
        };
        let room_id = session.room_id.clone();
        if let Some(room) = self.registry.get_mut(&room_id) {
            room.touch(now);
        }

        match event {
            InboundEvent::Message { content } => {
                if content.trim().is_empty() {
                    debug!(room_id = %room_id, client_id = %session.client_id, "dropping blank message");
                    return;
                }
                let len = content.chars().count();
                if len > self.settings.max_message_chars {
                    warn!(
                        room_id = %room_id,
                        client_id = %session.client_id,
                        len,
                        max = self.settings.max_message_chars,
                        "dropping oversized message"
                    );
                    return;
                }
                let message = OutboundEvent::Message {
                    content,
                    sender_id: session.client_id.clone(),
                    sender_name: session.display_name.clone(),
                    is_host: session.is_host(),
                    timestamp: self.clock.now(),
                };
                self.broadcast(&room_id, &message, None);
            }
            InboundEvent::NameChange { name } => {
                let name = name.trim();
                let len = name.chars().count();
                if len == 0 || len > self.settings.max_name_chars {
                    warn!(
                        room_id = %room_id,
                        client_id = %session.client_id,
                        len,
                        max = self.settings.max_name_chars,
                        "rejecting display name"
                    );
                    return;
                }
                session.display_name = name.to_owned();
                let change = OutboundEvent::NameChange {
                    client_id: session.client_id.clone(),
                    name: session.display_name.clone(),
                    is_host: session.is_host(),
                };
                debug!(room_id = %room_id, client_id = %session.client_id, "display name changed");
                self.broadcast_participants(&room_id);
                self.broadcast(&room_id, &change, None);
            }
            InboundEvent::Typing => {
                let typing = OutboundEvent::Typing {
                    client_id: session.client_id.clone(),
                    is_host: session.is_host(),
                };
                self.broadcast(&room_id, &typing, Some(connection_id));
            }
            InboundEvent::StopTyping => {
                let stop = OutboundEvent::StopTyping {
                    client_id: session.client_id.clone(),
                    is_host: session.is_host(),
                };
                self.broadcast(&room_id, &stop, Some(connection_id));
            }
            InboundEvent::Ping => {
                if let Some(connection) = session.connection.clone() {
                    self.deliver(fanout::send_to(&connection, &OutboundEvent::Pong));
                }
            }
            InboundEvent::KeepAlive => {}
        }
    }

    // ── Disconnect ──────────────────────────────────────────────────────

    pub(crate) fn disconnect(&mut self, connection_id: &ConnectionId) {
        let Some(token) = self.connections.remove(connection_id) else {
            debug!(connection_id = %connection_id, "ignoring close of unbound connection");
            return;
        };
        let now = self.clock.now();
        let Some(session) = self.store.resolve(&token) else {
            return;
        };
        let room_id = session.room_id.clone();
        let client_id = session.client_id.clone();
        let is_host = session.is_host();
        let _ = self.store.detach(&token, now);

        if is_host {
            let grace = self.settings.host_grace();
            let generation = self.evictions.schedule(token, grace, |token, generation| {
                TimerEvent::Eviction { token, generation }
            });
            info!(
                room_id = %room_id,
                client_id = %client_id,
                grace_secs = grace.as_secs(),
                generation,
                "host disconnected, eviction scheduled"
            );
            return;
        }

        let now_empty = match self.registry.get_mut(&room_id) {
            Some(room) => {
                let _ = room.remove(&token);
                room.is_empty()
            }
            None => false,
        };
        let retention = self.settings.guest_retention();
        let generation = self.evictions.schedule(token, retention, |token, generation| {
            TimerEvent::Eviction { token, generation }
        });
        info!(
            room_id = %room_id,
            client_id = %client_id,
            retention_secs = retention.as_secs(),
            generation,
            "guest disconnected"
        );
        self.broadcast_participants(&room_id);
        if now_empty {
            self.registry.schedule_teardown_check(&room_id);
        }
    }

    fn drain_pending_disconnects(&mut self) {
        while let Some(connection_id) = self.pending_disconnects.pop() {
            self.disconnect(&connection_id);
        }
    }

    // ── Timers ──────────────────────────────────────────────────────────

    pub(crate) fn eviction_fired(&mut self, token: &SessionToken, generation: u64) {
        if !self.evictions.take_fired(token, generation) {
            debug!(generation, "ignoring stale eviction");
            return;
        }
        if self.store.resolve(token).is_none_or(|s| s.is_connected()) {
            return;
        }
        if self.store.resolve(token).is_some_and(|s| !s.is_host()) {
            if let Some(expired) = self.store.remove(token) {
                debug!(
                    room_id = %expired.room_id,
                    client_id = %expired.client_id,
                    "detached guest expired"
                );
            }
            return;
        }
        let Some(evicted) = self.store.remove(token) else {
            return;
        };
        let room_id = evicted.room_id;
        let Some(room) = self.registry.get_mut(&room_id) else {
            return;
        };
        let _ = room.remove(token);

        let successor = if room.host().is_none() {
            room.first().cloned()
        } else {
            None
        };
        if let Some(next) = successor {
            room.set_host(Some(next.clone()));
            if let Some(promoted) = self.store.get_mut(&next) {
                promoted.role = Role::Host;
                info!(
                    room_id = %room_id,
                    evicted = %evicted.client_id,
                    new_host = %promoted.client_id,
                    "host evicted, failed over"
                );
            }
        } else {
            info!(room_id = %room_id, evicted = %evicted.client_id, "host evicted");
        }

        let now_empty = room.is_empty();
        self.broadcast_participants(&room_id);
        if now_empty {
            self.registry.schedule_teardown_check(&room_id);
        }
    }

    pub(crate) fn teardown_fired(&mut self, room_id: &RoomId, generation: u64) {
        if self.registry.teardown_fired(room_id, generation) {
            let stale: Vec<SessionToken> = self
                .store
                .iter()
                .filter(|s| &s.room_id == room_id)
                .map(|s| s.token.clone())
                .collect();
            for token in &stale {
                let _ = self.evictions.cancel(token);
            }
            let purged = self.store.purge_room(room_id);
            info!(room_id = %room_id, purged_sessions = purged, "room torn down");
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub(crate) fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            rooms: self.registry.len(),
            sessions: self.store.len(),
            connections: self.connections.len(),
            pending_evictions: self.evictions.len(),
        }
    }

    pub(crate) fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        let room = self.registry.get(room_id)?;
        let host = room.host().and_then(|t| self.store.resolve(t));
        Some(RoomSnapshot {
            room_id: room_id.clone(),
            host: host.map(|s| s.client_id.clone()),
            participants: self.participants(room_id),
            connected: self.live_connections(room_id).len(),
            host_in_grace: room.host().is_some_and(|t| self.evictions.is_pending(t)),
            teardown_pending: self.registry.teardown_pending(room_id),
            next_color_index: room.next_color_index(),
        })
    }

    /// Participants of a room in join order.
    fn participants(&self, room_id: &RoomId) -> Vec<Participant> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        room.members()
            .iter()
            .filter_map(|m| self.store.resolve(&m.token))
            .map(crate::store::Session::participant)
            .collect()
    }

    /// Live connections of a room's members in join order.
    fn live_connections(&self, room_id: &RoomId) -> Vec<Arc<ClientConnection>> {
        let Some(room) = self.registry.get(room_id) else {
            return Vec::new();
        };
        room.members()
            .iter()
            .filter_map(|m| self.store.resolve(&m.token))
            .filter_map(|s| s.connection.clone())
            .collect()
    }

    // ── Fan-out ─────────────────────────────────────────────────────────

    fn broadcast(&mut self, room_id: &RoomId, event: &OutboundEvent, exclude: Option<&ConnectionId>) {
        let targets = self.live_connections(room_id);
        let delivery = fanout::broadcast(&targets, event, exclude);
        self.deliver(delivery);
    }

    fn broadcast_participants(&mut self, room_id: &RoomId) {
        let update = OutboundEvent::Participants {
            participants: self.participants(room_id),
        };
        self.broadcast(room_id, &update, None);
    }

    fn deliver(&mut self, delivery: Delivery) {
        self.pending_disconnects.extend(delivery.closed);
    }

    // ── Shutdown ────────────────────────────────────────────────────────

    pub(crate) fn shutdown(&mut self) {
        self.evictions.cancel_all();
        self.registry.clear();
        for session in self.store.iter() {
            if let Some(connection) = &session.connection {
                connection.close();
            }
        }
        self.connections.clear();
        info!(sessions = self.store.len(), "coordinator state released");
    }
}
