//! Codec trait and implementations for serializing packets and frames.
//!
//! The protocol layer doesn't care how messages become bytes — it only
//! needs something implementing [`Codec`]. [`JsonCodec`] is the default
//! (readable in logs and easy to poke at with any WebSocket client); a
//! binary codec can be swapped in later without touching other crates.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because the codec is shared across connection
/// tasks for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed,
    /// truncated, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use masterforge_protocol::{Codec, JsonCodec, Frame, OpCode, AckId};
///
/// let codec = JsonCodec;
/// let frame = Frame::request(OpCode::RegisterRoom, AckId(1), vec![]);
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: Frame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::{
        AckId, Frame, OpCode, ResponseStatus, RoomAccessPacket, RoomId,
    };

    #[test]
    fn test_frame_roundtrip_preserves_all_fields() {
        let codec = JsonCodec;
        let body = codec
            .encode(&RoomAccessPacket {
                room_ip: "10.0.0.2".into(),
                room_port: 7777,
                token: "abc123".into(),
                room_id: RoomId(4),
                scene_name: "arena".into(),
                properties: Default::default(),
            })
            .unwrap();

        let frame = Frame::response(
            OpCode::GetRoomAccess.into(),
            AckId(42),
            ResponseStatus::Success,
            body,
        );

        let bytes = codec.encode(&frame).unwrap();
        let decoded: Frame = codec.decode(&bytes).unwrap();
        assert_eq!(frame, decoded);

        let access: RoomAccessPacket = codec.decode(&decoded.body).unwrap();
        assert_eq!(access.token, "abc123");
        assert_eq!(access.room_id, RoomId(4));
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let codec = JsonCodec;
        let result: Result<Frame, _> = codec.decode(b"not json");
        assert!(matches!(
            result,
            Err(crate::ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_unknown_op_still_decodes_as_frame() {
        // The dispatcher needs the frame even when it can't name the op,
        // so it can answer NotHandled instead of dropping the message.
        let codec = JsonCodec;
        let frame = Frame {
            op: 9999,
            ack_request: Some(AckId(1)),
            ack_response: None,
            status: None,
            body: vec![],
        };
        let bytes = codec.encode(&frame).unwrap();
        let decoded: Frame = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.op, 9999);
        assert_eq!(OpCode::from_u16(decoded.op), None);
    }
}
