//! Settings types and validation.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParlorSettings {
    /// Network and transport settings.
    pub server: ServerSettings,
    /// Room and session lifecycle settings.
    pub rooms: RoomSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl ParlorSettings {
    /// Check cross-field constraints.
    ///
    /// The heartbeat timeout must be at least twice the probe interval so a
    /// single missed probe (common with throttled background tabs) never
    /// evicts a client.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.heartbeat_interval_secs == 0 {
            return Err(invalid("server.heartbeatIntervalSecs must be > 0"));
        }
        let min_timeout = server.heartbeat_interval_secs.checked_mul(2);
        if min_timeout.is_none_or(|min| server.heartbeat_timeout_secs < min) {
            return Err(invalid(format!(
                "server.heartbeatTimeoutSecs ({}) must be at least twice \
                 server.heartbeatIntervalSecs ({})",
                server.heartbeat_timeout_secs, server.heartbeat_interval_secs
            )));
        }
        if server.outbound_queue == 0 {
            return Err(invalid("server.outboundQueue must be > 0"));
        }
        if server.max_frame_bytes < 256 {
            return Err(invalid("server.maxFrameBytes must be >= 256"));
        }
        let rooms = &self.rooms;
        if rooms.host_grace_secs == 0 {
            return Err(invalid("rooms.hostGraceSecs must be > 0"));
        }
        if rooms.teardown_grace_secs == 0 {
            return Err(invalid("rooms.teardownGraceSecs must be > 0"));
        }
        if rooms.guest_retention_secs == 0 {
            return Err(invalid("rooms.guestRetentionSecs must be > 0"));
        }
        if rooms.max_name_chars == 0 || rooms.max_message_chars == 0 || rooms.max_room_id_chars == 0
        {
            return Err(invalid("rooms length limits must be > 0"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue(message.into())
}

/// Network and transport settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port (`0` picks a free port).
    pub port: u16,
    /// Externally reachable URL, printed at startup when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// Seconds between liveness probes.
    pub heartbeat_interval_secs: u64,
    /// Seconds without any liveness signal before a connection is dropped.
    pub heartbeat_timeout_secs: u64,
    /// Outbound messages buffered per connection before sends are dropped.
    pub outbound_queue: usize,
    /// Largest accepted inbound frame in bytes.
    pub max_frame_bytes: usize,
    /// Seconds to wait for tasks during graceful shutdown.
    pub shutdown_timeout_secs: u64,
}

impl ServerSettings {
    /// Liveness probe interval.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Liveness timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Graceful shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3005,
            public_url: None,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            outbound_queue: 256,
            max_frame_bytes: 64 * 1024,
            shutdown_timeout_secs: 10,
        }
    }
}

/// Room and session lifecycle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Seconds a disconnected host keeps its session before failover.
    pub host_grace_secs: u64,
    /// Seconds an empty room survives before it is deleted.
    pub teardown_grace_secs: u64,
    /// Seconds a disconnected guest stays resumable before its session is dropped.
    pub guest_retention_secs: u64,
    /// Longest accepted display name, in characters.
    pub max_name_chars: usize,
    /// Longest accepted chat message, in characters.
    pub max_message_chars: usize,
    /// Longest accepted room ID, in characters.
    pub max_room_id_chars: usize,
}

impl RoomSettings {
    /// Host eviction window.
    pub fn host_grace(&self) -> Duration {
        Duration::from_secs(self.host_grace_secs)
    }

    /// Empty-room teardown window.
    pub fn teardown_grace(&self) -> Duration {
        Duration::from_secs(self.teardown_grace_secs)
    }

    /// Detached-guest resume window.
    pub fn guest_retention(&self) -> Duration {
        Duration::from_secs(self.guest_retention_secs)
    }
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            host_grace_secs: 30,
            teardown_grace_secs: 300,
            guest_retention_secs: 300,
            max_name_chars: 32,
            max_message_chars: 2000,
            max_room_id_chars: 64,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
