//! Strictly increasing wall-clock timestamps.

use chrono::Utc;

/// Epoch-millisecond source that never repeats a value.
///
/// Join times order host failover and participant lists, and message
/// timestamps order chat history on the client, so two events processed in
/// the same millisecond still get distinct, ordered stamps.
#[derive(Debug, Default)]
pub struct Clock {
    last: i64,
}

impl Clock {
    /// Create a clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current epoch milliseconds, bumped past the previous reading if needed.
    pub fn now(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis().max(self.last + 1);
        self.last = now;
        now
    }
}
