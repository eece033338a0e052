//! Unified error type for the master server.

use masterforge_peer::PeerError;
use masterforge_protocol::ProtocolError;
use masterforge_rooms::RoomError;
use masterforge_spawner::SpawnerError;
use masterforge_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attributes generate `From` impls so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MasterforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A peer-level error (dead connection).
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// A room-layer error.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A spawner-layer error.
    #[error(transparent)]
    Spawner(#[from] SpawnerError),
}
