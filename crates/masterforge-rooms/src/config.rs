//! Room subsystem configuration.

use std::time::Duration;

/// Configuration for the room registry and its handlers.
#[derive(Debug, Clone)]
pub struct RoomsConfig {
    /// Minimum permission level a peer needs to register a room.
    pub register_permission_level: i32,

    /// How long the master waits for a room owner to confirm or deny an
    /// access request before answering the client with Timeout. Kept
    /// short: the provider is a local decision, not a long computation.
    pub access_check_timeout: Duration,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            register_permission_level: 0,
            access_check_timeout: Duration::from_secs(5),
        }
    }
}
