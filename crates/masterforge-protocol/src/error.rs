//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding, or interpreting
/// wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a packet into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed. Common causes: malformed payload, missing
    /// fields, a peer speaking a different protocol version.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame decoded fine but violates protocol rules — e.g. a
    /// response without a status, or a request for an op nobody handles.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The frame carried an operation code this build doesn't know.
    #[error("unknown operation code {0}")]
    UnknownOpCode(u16),
}
