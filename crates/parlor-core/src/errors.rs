//! Errors produced while decoding client frames.
//!
//! None of these ever reach the client or close the connection: the gateway
//! logs the error and drops the frame.

use thiserror::Error;

/// Why an inbound frame was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Not JSON, not an object, missing `type`, or wrong field shapes.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Well-formed JSON carrying a `type` the server does not handle.
    #[error("unknown event type: {0}")]
    UnknownType(String),

    /// Frame longer than the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    Oversized {
        /// Actual frame length in bytes.
        len: usize,
        /// Configured limit in bytes.
        max: usize,
    },
}

impl ProtocolError {
    /// Short classification string for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::UnknownType(_) => "unknown_type",
            Self::Oversized { .. } => "oversized",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ProtocolError::UnknownType("dance".into()).to_string(),
            "unknown event type: dance"
        );
        assert_eq!(
            ProtocolError::Oversized { len: 10, max: 4 }.to_string(),
            "frame of 10 bytes exceeds limit of 4 bytes"
        );
    }

    #[test]
    fn kinds() {
        assert_eq!(ProtocolError::Malformed(String::new()).kind(), "malformed");
        assert_eq!(ProtocolError::UnknownType(String::new()).kind(), "unknown_type");
        assert_eq!(ProtocolError::Oversized { len: 1, max: 0 }.kind(), "oversized");
    }
}
