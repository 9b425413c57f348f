//! `/health` endpoint.

use std::time::Instant;

use parlor_rooms::CoordinatorStats;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Bound WebSocket connections.
    pub connections: usize,
    /// Live rooms.
    pub rooms: usize,
    /// Known sessions, including ones waiting for a reconnect.
    pub sessions: usize,
}

/// Build a health response from coordinator counters.
pub fn health_check(start_time: Instant, stats: CoordinatorStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.connections,
        rooms: stats.rooms,
        sessions: stats.sessions,
    }
}
