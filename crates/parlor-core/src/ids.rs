//! Branded ID newtypes.
//!
//! Rooms, clients and connections each get a distinct ID type so a client ID
//! can never be passed where a connection ID is expected. [`SessionToken`] is
//! the reconnection credential and is kept apart from the public IDs: it has
//! no `Display` impl and its `Debug` output is redacted.

use std::fmt;

use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of a generated [`SessionToken`] (62^32 possible values).
pub const SESSION_TOKEN_LEN: usize = 32;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

branded_id! {
    /// Externally supplied room identifier (the `room` query parameter).
    RoomId
}

branded_id! {
    /// Public per-session identifier, safe to broadcast.
    ClientId
}

branded_id! {
    /// Identifier of a single transport connection.
    ConnectionId
}

impl ClientId {
    /// Generate a new client ID (UUID v7).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl ConnectionId {
    /// Generate a new connection ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7().simple()))
    }
}

/// Opaque reconnection credential handed to a client exactly once.
///
/// Possession of the token is the only proof of identity on reconnect.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generate a fresh random alphanumeric token.
    #[must_use]
    pub fn generate() -> Self {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Wrap a token replayed by a client.
    #[must_use]
    pub fn from_client(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (!raw.is_empty() && raw.len() <= 128).then(|| Self(raw.to_owned()))
    }

    /// The raw token value, for delivery to its owner only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}
