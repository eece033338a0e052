//! Room lifecycle management for Masterforge.
//!
//! A "room" is a dedicated game-server process that registered itself
//! with the master. This crate tracks those registrations and brokers
//! access to them:
//!
//! - [`RoomRegistry`] — registers/destroys rooms, cascades on owner
//!   disconnect, sweeps expired accesses, lists public games
//! - [`RegisteredRoom`] — one room's options, capacity accounting, and
//!   access collections
//! - [`AccessReply`] — what an access request needs next (reuse an
//!   unclaimed token, or round-trip to the owner)
//! - [`generate_access_token`] — token minting for access providers
//!
//! # The access handshake
//!
//! ```text
//! client ──GetRoomAccess──▶ master ──ProvideRoomAccessCheck──▶ room owner
//!                             │                                    │
//!                             ◀───────── RoomAccessPacket ─────────┘
//!    ◀──── access packet ────┘        (token minted by the room)
//!
//! client ──token──▶ room ──ValidateRoomAccess──▶ master   (single use)
//! ```
//!
//! The registry holds the room-side bookkeeping for every arrow above;
//! the wire work lives in the master's handlers.

mod config;
mod error;
mod registry;
mod room;
mod token;

pub use config::RoomsConfig;
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{AccessReply, RegisteredRoom};
pub use token::generate_access_token;
