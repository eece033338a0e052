//! Core protocol types for Masterforge's wire format.
//!
//! Everything the master, game clients, room processes, and spawner agents
//! exchange is a [`Frame`]: an operation code, optional correlation ids,
//! an optional response status, and an opaque body. The body is itself an
//! encoded packet (see [`crate::packets`]) — the frame layer doesn't care
//! what's inside.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected peer (client, room process, or
/// spawner agent — the master treats them all uniformly).
///
/// Newtype over `u64` so a `PeerId` can't be confused with a `RoomId`
/// even though both are integers underneath. `#[serde(transparent)]`
/// keeps the wire representation a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// A unique identifier for a registered room (a dedicated game-server
/// process that has checked in with the master).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// A unique identifier for a registered spawner agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnerId(pub u64);

impl fmt::Display for SpawnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawner-{}", self.0)
    }
}

/// A unique identifier for a spawn task (one request to launch a room
/// process, tracked through its whole lifecycle).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpawnId(pub u64);

impl fmt::Display for SpawnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spawn-{}", self.0)
    }
}

/// Correlation id linking a request frame to its response frame.
///
/// Ids are allocated per peer connection and never reused while a request
/// is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckId(pub u64);

impl fmt::Display for AckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ack-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Operation codes
// ---------------------------------------------------------------------------

/// Every operation the protocol supports, with its wire value.
///
/// On the wire an op is a bare `u16` (see [`Frame::op`]); unknown values
/// survive decoding so the dispatcher can answer them with
/// [`ResponseStatus::NotHandled`] instead of dropping the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum OpCode {
    // Rooms
    RegisterRoom = 10,
    DestroyRoom = 11,
    SaveRoomOptions = 12,
    GetRoomAccess = 13,
    ValidateRoomAccess = 14,
    PlayerLeftRoom = 15,
    ListGames = 16,
    /// Master → room owner: confirm or deny an access request.
    ProvideRoomAccessCheck = 17,

    // Spawners
    RegisterSpawner = 30,
    ClientSpawnRequest = 31,
    AbortSpawnRequest = 32,
    /// Master → spawner agent: launch a process for a spawn task.
    SpawnProcessRequest = 33,
    /// Master → spawner agent: kill a previously spawned process.
    KillProcessRequest = 34,
    /// Spawned process → master: claim a spawn task with its secret code.
    RegisterSpawnedProcess = 35,
    /// Spawned process → master: deliver the finalization payload.
    CompleteSpawnProcess = 36,
    /// Agent → master notification: the OS process is up.
    ProcessStarted = 37,
    /// Agent → master notification: the OS process exited.
    ProcessKilled = 38,
    GetSpawnFinalizationData = 39,
    /// Master → requesting client push: a spawn task changed status.
    SpawnStatusUpdate = 40,
}

impl OpCode {
    /// Decodes a wire value back into an op code.
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            10 => Self::RegisterRoom,
            11 => Self::DestroyRoom,
            12 => Self::SaveRoomOptions,
            13 => Self::GetRoomAccess,
            14 => Self::ValidateRoomAccess,
            15 => Self::PlayerLeftRoom,
            16 => Self::ListGames,
            17 => Self::ProvideRoomAccessCheck,
            30 => Self::RegisterSpawner,
            31 => Self::ClientSpawnRequest,
            32 => Self::AbortSpawnRequest,
            33 => Self::SpawnProcessRequest,
            34 => Self::KillProcessRequest,
            35 => Self::RegisterSpawnedProcess,
            36 => Self::CompleteSpawnProcess,
            37 => Self::ProcessStarted,
            38 => Self::ProcessKilled,
            39 => Self::GetSpawnFinalizationData,
            40 => Self::SpawnStatusUpdate,
            _ => return None,
        })
    }
}

impl From<OpCode> for u16 {
    fn from(op: OpCode) -> u16 {
        op as u16
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Response status
// ---------------------------------------------------------------------------

/// Outcome of a request, carried by every response frame.
///
/// `Timeout` and `NotConnected` are synthesized locally by the ack
/// registry — they never actually travel on the wire from the remote side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum ResponseStatus {
    /// The request succeeded.
    Success,
    /// The request was understood but could not be satisfied — capacity
    /// exceeded, duplicate request, unknown id. Usually retryable.
    Failed,
    /// An unexpected internal error while handling the request.
    Error,
    /// Wrong peer, insufficient permission level, or a bad token.
    Unauthorized,
    /// No handler is registered for the operation.
    NotHandled,
    /// The request's deadline passed with no response.
    Timeout,
    /// The target peer's connection is gone.
    NotConnected,
}

impl ResponseStatus {
    /// `true` only for [`ResponseStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// One message on the wire.
///
/// Three shapes, distinguished by the correlation fields:
///
/// ```text
/// notification:  { op, body }
/// request:       { op, ack_request: id, body }
/// response:      { op, ack_response: id, status, body }
/// ```
///
/// A peer receiving a frame with `ack_response` set routes it into its
/// ack registry; everything else is dispatched to the op's handler. A
/// handler answering a request echoes the request's `ack_request` id as
/// its `ack_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Operation code. Kept as a raw `u16` so frames carrying ops this
    /// build doesn't know still decode (and get a NotHandled answer).
    pub op: u16,

    /// Set on requests that expect a response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_request: Option<AckId>,

    /// Set on responses; echoes the request's `ack_request`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_response: Option<AckId>,

    /// Set on responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,

    /// Encoded packet payload; may be empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub body: Vec<u8>,
}

impl Frame {
    /// A fire-and-forget notification.
    pub fn notification(op: OpCode, body: Vec<u8>) -> Self {
        Self {
            op: op.into(),
            ack_request: None,
            ack_response: None,
            status: None,
            body,
        }
    }

    /// A request expecting a response correlated by `ack`.
    pub fn request(op: OpCode, ack: AckId, body: Vec<u8>) -> Self {
        Self {
            op: op.into(),
            ack_request: Some(ack),
            ack_response: None,
            status: None,
            body,
        }
    }

    /// A response to the request that carried `ack`.
    ///
    /// `op` echoes the request's op; it's informational, the correlation
    /// id alone routes the response.
    pub fn response(
        op: u16,
        ack: AckId,
        status: ResponseStatus,
        body: Vec<u8>,
    ) -> Self {
        Self {
            op,
            ack_request: None,
            ack_response: Some(ack),
            status: Some(status),
            body,
        }
    }

    /// `true` if this frame answers a request (routes to the ack registry).
    pub fn is_response(&self) -> bool {
        self.ack_response.is_some()
    }

    /// `true` if the sender expects a response to this frame.
    pub fn expects_response(&self) -> bool {
        self.ack_request.is_some()
    }
}
