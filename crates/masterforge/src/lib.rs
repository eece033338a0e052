//! # Masterforge
//!
//! A master server for multiplayer game backends. It authenticates
//! nothing about gameplay — instead it keeps the fleet honest: tracks
//! peer sessions, registers dedicated game-server processes ("rooms"),
//! brokers single-use access tokens between clients and rooms, and
//! orchestrates spawner agents that launch room processes on demand.
//!
//! ## The cast
//!
//! - **client** — asks for spawns and for access to rooms
//! - **room process** — a dedicated game server; registers itself,
//!   approves/denies access requests, validates tokens
//! - **spawner agent** — runs on a game-server machine; launches room
//!   processes when the master says so (see `masterforge-agent`)
//! - **master** (this crate) — the hub everything above connects to
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use masterforge::MasterServerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     masterforge::init_tracing();
//!     let server = MasterServerBuilder::new()
//!         .bind("0.0.0.0:5000")
//!         .build()
//!         .await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod context;
mod error;
mod handlers;
mod maintenance;
mod server;

pub use context::{MasterConfig, MasterContext};
pub use error::MasterforgeError;
pub use server::{MasterServer, MasterServerBuilder};

/// Commonly needed types from across the workspace.
pub mod prelude {
    pub use crate::{
        MasterConfig, MasterContext, MasterServer, MasterServerBuilder,
        MasterforgeError,
    };
    pub use masterforge_peer::{Peer, PeerConfig};
    pub use masterforge_protocol::{
        Codec, Frame, JsonCodec, OpCode, PeerId, ResponseStatus,
        RoomId, RoomOptions, SpawnId, SpawnStatus, SpawnerId,
        SpawnerOptions,
    };
    pub use masterforge_rooms::RoomsConfig;
    pub use masterforge_spawner::SpawnerConfig;
}

/// Installs a `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `info`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}
