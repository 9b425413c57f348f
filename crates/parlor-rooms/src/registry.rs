//! Room Registry: room ID → [`Room`], created lazily and torn down after a
//! grace period once empty.

use std::collections::HashMap;
use std::time::Duration;

use parlor_core::{RoomId, SessionToken};
use tokio::sync::mpsc::WeakUnboundedSender;
use tracing::{debug, info};

use crate::coordinator::Command;
use crate::timers::{TimerEvent, Timers};

/// A session's slot in a room, ordered by join time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    /// Session token.
    pub token: SessionToken,
    /// The session's join time, epoch milliseconds.
    pub joined_at: i64,
}

/// One chat room.
#[derive(Debug)]
pub struct Room {
    /// Externally supplied ID.
    pub id: RoomId,
    members: Vec<Member>,
    host: Option<SessionToken>,
    next_color_index: u32,
    /// Creation time, epoch milliseconds.
    pub created_at: i64,
    /// Last join or inbound event, epoch milliseconds.
    pub last_activity_at: i64,
}

impl Room {
    /// Create an empty room.
    pub fn new(id: RoomId, now: i64) -> Self {
        Self {
            id,
            members: Vec::new(),
            host: None,
            next_color_index: 0,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Members in ascending join order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Whether `token` is a member.
    pub fn contains(&self, token: &SessionToken) -> bool {
        self.members.iter().any(|m| &m.token == token)
    }

    /// Insert a member at its join-time position. No-op if already present.
    pub fn insert(&mut self, token: SessionToken, joined_at: i64) {
        if self.contains(&token) {
            return;
        }
        let at = self.members.partition_point(|m| m.joined_at <= joined_at);
        self.members.insert(at, Member { token, joined_at });
    }

    /// Remove a member, clearing the host slot if it held it.
    pub fn remove(&mut self, token: &SessionToken) -> bool {
        let before = self.members.len();
        self.members.retain(|m| &m.token != token);
        if self.host.as_ref() == Some(token) {
            self.host = None;
        }
        self.members.len() != before
    }

    /// Earliest-joined member, the failover candidate.
    pub fn first(&self) -> Option<&SessionToken> {
        self.members.first().map(|m| &m.token)
    }

    /// Current host's token.
    pub fn host(&self) -> Option<&SessionToken> {
        self.host.as_ref()
    }

    /// Set or clear the host slot.
    pub fn set_host(&mut self, token: Option<SessionToken>) {
        self.host = token;
    }

    /// Hand out the next guest color. Never reused while the room exists.
    pub fn allocate_color(&mut self) -> u32 {
        let color = self.next_color_index;
        self.next_color_index += 1;
        color
    }

    /// The color the next guest will get.
    pub fn next_color_index(&self) -> u32 {
        self.next_color_index
    }

    /// Record activity.
    pub fn touch(&mut self, now: i64) {
        self.last_activity_at = now;
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All live rooms plus their pending teardown checks.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    teardown: Timers<RoomId>,
    teardown_grace: Duration,
}

impl RoomRegistry {
    pub(crate) fn new(teardown_grace: Duration, sink: WeakUnboundedSender<Command>) -> Self {
        Self {
            rooms: HashMap::new(),
            teardown: Timers::new(sink),
            teardown_grace,
        }
    }

    /// Return the room, creating it if unknown.
    pub fn get_or_create(&mut self, id: &RoomId, now: i64) -> &mut Room {
        self.rooms.entry(id.clone()).or_insert_with(|| {
            info!(room_id = %id, "room created");
            Room::new(id.clone(), now)
        })
    }

    /// Look up a room.
    pub fn get(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(id)
    }

    /// Start the teardown grace period for a room, restarting any pending one.
    pub fn schedule_teardown_check(&mut self, id: &RoomId) {
        let generation = self.teardown.schedule(id.clone(), self.teardown_grace, |room_id, generation| {
            TimerEvent::Teardown {
                room_id,
                generation,
            }
        });
        debug!(room_id = %id, generation, "teardown check scheduled");
    }

    /// Cancel a pending teardown check. Idempotent.
    pub fn cancel_teardown_check(&mut self, id: &RoomId) {
        if self.teardown.cancel(id) {
            debug!(room_id = %id, "teardown check cancelled");
        }
    }

    /// Whether a teardown check is pending for a room.
    pub fn teardown_pending(&self, id: &RoomId) -> bool {
        self.teardown.is_pending(id)
    }

    /// Handle a fired teardown check.
    ///
    /// Deletes the room only if `generation` is current and the room is still
    /// empty. Returns whether the room was deleted.
    pub(crate) fn teardown_fired(&mut self, id: &RoomId, generation: u64) -> bool {
        if !self.teardown.take_fired(id, generation) {
            debug!(room_id = %id, generation, "ignoring stale teardown check");
            return false;
        }
        if !self.rooms.get(id).is_some_and(Room::is_empty) {
            return false;
        }
        let _ = self.rooms.remove(id);
        true
    }

    /// Drop every room and pending check.
    pub(crate) fn clear(&mut self) {
        self.teardown.cancel_all();
        self.rooms.clear();
    }

    /// Number of rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether there are no rooms.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn pending_teardowns(&self) -> Vec<(RoomId, u64)> {
        self.teardown.pending()
    }
}
