//! Spawner subsystem configuration.

use std::time::Duration;

/// Configuration for the spawner registry and its handlers.
#[derive(Debug, Clone)]
pub struct SpawnerConfig {
    /// Minimum permission level a peer needs to register a spawner.
    /// Spawner agents are infrastructure; in a deployment with real
    /// authentication this is normally above the default client level.
    pub create_permission_level: i32,

    /// How often spawner queues are drained.
    pub queue_update_interval: Duration,

    /// If false, ClientSpawnRequest is refused outright and spawns can
    /// only be created by server-side code (matchmaker, admin tools).
    pub enable_client_spawn_requests: bool,
}

impl Default for SpawnerConfig {
    fn default() -> Self {
        Self {
            create_permission_level: 0,
            queue_update_interval: Duration::from_millis(100),
            enable_client_spawn_requests: true,
        }
    }
}
