//! The master's shared state: one context object per server instance.
//!
//! Registries, the peer store, and configuration all hang off a
//! [`MasterContext`] passed (inside an `Arc`) to every connection task
//! and the maintenance loop. There is no process-global state anywhere:
//! two masters in one process — the integration tests do this — keep
//! entirely separate rooms, spawners, peers, and id counters.

use std::time::Duration;

use masterforge_peer::{PeerConfig, PeerSessionStore};
use masterforge_rooms::{RoomRegistry, RoomsConfig};
use masterforge_spawner::{SpawnerConfig, SpawnerRegistry};
use tokio::sync::Mutex;

/// Configuration for one master server instance.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    pub rooms: RoomsConfig,
    pub spawners: SpawnerConfig,
    pub peer: PeerConfig,
    /// How often unclaimed room accesses are swept for expiry.
    pub expiry_sweep_interval: Duration,
}

impl MasterConfig {
    pub fn new() -> Self {
        Self {
            rooms: RoomsConfig::default(),
            spawners: SpawnerConfig::default(),
            peer: PeerConfig::default(),
            expiry_sweep_interval: Duration::from_secs(1),
        }
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state for one master server instance.
///
/// Each component sits behind its own mutex; handlers lock exactly the
/// component they touch and NEVER hold a lock across a network round
/// trip (see the access-check handler for the begin/complete split this
/// forces).
pub struct MasterContext {
    pub peers: Mutex<PeerSessionStore>,
    pub rooms: Mutex<RoomRegistry>,
    pub spawners: Mutex<SpawnerRegistry>,
    pub config: MasterConfig,
}

impl MasterContext {
    pub fn new(config: MasterConfig) -> Self {
        Self {
            peers: Mutex::new(PeerSessionStore::new()),
            rooms: Mutex::new(RoomRegistry::new(config.rooms.clone())),
            spawners: Mutex::new(SpawnerRegistry::new(
                config.spawners.clone(),
            )),
            config,
        }
    }
}
