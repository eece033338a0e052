//! Error types for the peer layer.

use masterforge_protocol::{PeerId, ProtocolError};

/// Errors that can occur when talking to a peer.
///
/// Round-trip outcomes (timeouts, refusals) are NOT errors — they come
/// back as [`Response`](crate::Response) statuses. This enum covers the
/// cases where a message couldn't be put on the wire at all.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// The peer's connection is gone.
    #[error("{0} is not connected")]
    NotConnected(PeerId),

    /// A protocol-level failure while encoding or decoding.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
