//! Per-peer session record and peer configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Identity and application state attached to a peer session.
///
/// A fixed set of optional fields plus a free-form string map: who the
/// peer authenticated as, what it's allowed to do, and whatever small
/// facts modules want to remember about it.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Authenticated username, if any.
    pub username: Option<String>,
    /// Permission level; registries gate privileged operations
    /// (registering rooms/spawners) on a configurable minimum.
    pub permission_level: i32,
    /// Free-form per-peer properties.
    pub properties: HashMap<String, String>,
}

/// Configuration for peer behavior.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    /// Timeout applied to [`Peer::request`](crate::Peer::request) when
    /// the call site doesn't pick its own.
    pub default_request_timeout: Duration,
    /// How often the peer's pump sweeps the ack registry for expired
    /// entries.
    pub sweep_interval: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            default_request_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(1),
        }
    }
}
