//! # parlor-server
//!
//! Axum HTTP + WebSocket gateway in front of the room coordinator.
//!
//! - `GET /ws?room=<id>&sessionId=<token>` (also `/`): join a room
//! - `GET /health`: liveness plus room and connection counts
//! - `GET /keep-alive`: 204 for platform idle pingers
//!
//! Each WebSocket gets its own session task with a bounded outbound queue,
//! a writer task and a liveness monitor. All room state lives in the
//! coordinator; this crate only moves frames.

pub mod config;
pub mod health;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use server::{AppState, ParlorServer};
pub use shutdown::ShutdownCoordinator;
