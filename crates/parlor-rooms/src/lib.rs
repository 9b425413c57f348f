//! # parlor-rooms
//!
//! The Room Session Coordinator and the state it owns:
//!
//! - **Connection**: [`ClientConnection`], the coordinator's handle on one
//!   live transport (bounded outbound queue, liveness flag, close signal)
//! - **Session Store**: reconnection token → durable [`Session`] record
//! - **Room Registry**: room ID → [`Room`], with delayed teardown of empty rooms
//! - **Fan-out**: serialize once, `try_send` to a computed target set
//! - **Coordinator**: a single actor task that serializes every join,
//!   inbound event, disconnect and timer fire
//!
//! Callers interact only through [`CoordinatorHandle`].

#![deny(unsafe_code)]

pub mod clock;
pub mod connection;
pub mod coordinator;
pub mod fanout;
pub mod registry;
pub mod store;
mod timers;

pub use connection::{ClientConnection, Outbound, SendError};
pub use coordinator::{CoordinatorHandle, CoordinatorStats, RoomSnapshot, spawn_coordinator};
pub use registry::{Room, RoomRegistry};
pub use store::{Role, Session, SessionStore};

use thiserror::Error;

/// Errors returned by [`CoordinatorHandle`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    /// The coordinator task has stopped (only happens during shutdown).
    #[error("room coordinator is not running")]
    CoordinatorClosed,
}

/// Result type for coordinator calls.
pub type Result<T> = std::result::Result<T, RoomError>;
