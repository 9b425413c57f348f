//! # parlor-core
//!
//! Foundation types shared by every Parlor crate:
//!
//! - **Branded IDs**: `RoomId`, `ClientId`, `ConnectionId` newtypes and the
//!   secret `SessionToken` reconnection credential
//! - **Protocol**: [`protocol::InboundEvent`] / [`protocol::OutboundEvent`],
//!   the JSON events exchanged with browser clients
//! - **Errors**: [`errors::ProtocolError`] for rejected inbound frames
//! - **Logging**: `tracing` subscriber initialisation

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod protocol;

pub use errors::ProtocolError;
pub use ids::{ClientId, ConnectionId, RoomId, SessionToken};
pub use protocol::{InboundEvent, OutboundEvent, Participant};
