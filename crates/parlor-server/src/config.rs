//! Server configuration.

use std::time::Duration;

use parlor_settings::ParlorSettings;
use serde::{Deserialize, Serialize};

/// Runtime configuration for the gateway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Externally reachable URL, if any.
    pub public_url: Option<String>,
    /// Heartbeat tick in seconds.
    pub heartbeat_interval_secs: u64,
    /// Silence after which a connection is terminated, in seconds.
    pub heartbeat_timeout_secs: u64,
    /// Per-connection outbound queue capacity.
    pub outbound_queue: usize,
    /// Largest accepted inbound frame in bytes.
    pub max_frame_bytes: usize,
    /// Longest accepted room ID, in characters.
    pub max_room_id_chars: usize,
    /// Seconds to wait for tasks on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Heartbeat tick.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    /// Liveness timeout.
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    /// Shutdown drain timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            public_url: None,
            heartbeat_interval_secs: 25,
            heartbeat_timeout_secs: 60,
            outbound_queue: 256,
            max_frame_bytes: 64 * 1024,
            max_room_id_chars: 64,
            shutdown_timeout_secs: 10,
        }
    }
}

impl From<&ParlorSettings> for ServerConfig {
    fn from(settings: &ParlorSettings) -> Self {
        let server = &settings.server;
        Self {
            host: server.host.clone(),
            port: server.port,
            public_url: server.public_url.clone(),
            heartbeat_interval_secs: server.heartbeat_interval_secs,
            heartbeat_timeout_secs: server.heartbeat_timeout_secs,
            outbound_queue: server.outbound_queue,
            max_frame_bytes: server.max_frame_bytes,
            max_room_id_chars: settings.rooms.max_room_id_chars,
            shutdown_timeout_secs: server.shutdown_timeout_secs,
        }
    }
}
