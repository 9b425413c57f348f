//! WebSocket gateway: frame decoding, liveness monitoring and the
//! per-connection session task.

pub mod handler;
pub mod heartbeat;
pub mod session;
