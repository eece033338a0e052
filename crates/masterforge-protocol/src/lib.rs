//! Wire protocol for Masterforge.
//!
//! This crate defines the language spoken between the master server and
//! everything that connects to it — game clients, room processes, and
//! spawner agents:
//!
//! - **Types** ([`Frame`], [`OpCode`], [`ResponseStatus`], identity
//!   newtypes) — the structures that travel on the wire.
//! - **Packets** ([`RoomOptions`], [`RoomAccessPacket`],
//!   [`SpawnRequest`], ...) — the operation-specific bodies.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those structures
//!   become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the peer
//! layer (session identity, request correlation). It knows nothing about
//! connections, rooms, or spawners — only how messages are shaped.
//!
//! ```text
//! Transport (bytes) → Protocol (Frame + packets) → Peer (correlation)
//! ```

mod codec;
mod error;
mod packets;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use packets::prop_keys;
pub use packets::{
    ClientSpawnRequest, GameInfo, KillSpawn, PlayerLeft,
    RegisterSpawnedProcess, RoomAccessCheck, RoomAccessPacket,
    RoomAccessRequest, RoomAccessValidate, RoomOptions, SaveRoomOptions,
    SpawnFinalization, SpawnRequest, SpawnStatus, SpawnStatusUpdate,
    SpawnerOptions, UsernameAndPeerId,
};
pub use types::{
    AckId, Frame, OpCode, PeerId, ResponseStatus, RoomId, SpawnId,
    SpawnerId,
};
