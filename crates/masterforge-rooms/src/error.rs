//! Error types for the room layer.
//!
//! Admission refusals (full, duplicate, already inside) are expected
//! outcomes a client is meant to retry or give up on — they're typed
//! here rather than thrown away as strings so handlers can map each to
//! the right wire status.

use masterforge_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} does not exist")]
    NotFound(RoomId),

    /// The requesting peer is not the room's registered owner.
    #[error("you are not the owner of room {0}")]
    NotOwner(RoomId),

    /// This peer already has an access check in flight for the room.
    #[error("you have already requested access to room {0}")]
    AlreadyRequested(RoomId),

    /// This peer already holds an active access to the room.
    #[error("you are already in room {0}")]
    AlreadyInRoom(RoomId),

    /// Every slot is taken (pending + unclaimed + active).
    #[error("room {0} is already full")]
    RoomFull(RoomId),

    /// The room has a password and the request's didn't match.
    #[error("invalid room password")]
    WrongPassword,

    /// The room opted out of direct client access requests.
    #[error("room {0} does not accept direct access requests")]
    DirectAccessDisabled(RoomId),

    /// The token was never granted, was already used, or expired.
    #[error("invalid access token")]
    UnknownToken,

    /// The peer the token was granted to disconnected before using it.
    #[error("access token holder is no longer connected")]
    TokenHolderGone,
}
