//! Error types for the spawner agent.

use masterforge_peer::PeerError;
use masterforge_protocol::ProtocolError;
use masterforge_transport::TransportError;

/// Errors that can occur on the agent side.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Connecting to or talking over the master connection failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding a packet failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A peer-level send failure.
    #[error(transparent)]
    Peer(#[from] PeerError),

    /// The master refused to register this agent as a spawner.
    #[error("spawner registration refused: {0}")]
    RegistrationRefused(String),

    /// The OS refused to start the room process.
    #[error("failed to launch process: {0}")]
    LaunchFailed(#[source] std::io::Error),
}
