//! Peer session layer for Masterforge.
//!
//! Everything that connects to a master — game client, room process,
//! spawner agent — is a *peer*: one session over one reliable ordered
//! connection. This crate provides:
//!
//! 1. **Request correlation** — [`AckTimeoutRegistry`] links outgoing
//!    requests to the futures awaiting their responses, with timeout
//!    expiry and disconnect fail-fast.
//! 2. **The peer handle** — [`Peer`]: send notifications, make awaited
//!    round trips, answer requests, and stash session state (identity,
//!    permission level, properties).
//! 3. **The I/O pump** — [`attach`] wires a raw connection to a peer
//!    handle and a stream of [`IncomingMessage`]s.
//! 4. **The session store** — [`PeerSessionStore`] tracks attached peers
//!    and allocates their ids.
//!
//! # How it fits in the stack
//!
//! ```text
//! Registries (above)   ← hold Peer handles, index entities per owner
//!     ↕
//! Peer layer (this crate)  ← correlation, session identity, I/O pump
//!     ↕
//! Protocol / Transport (below)  ← frames, codecs, sockets
//! ```
//!
//! # Disconnect semantics
//!
//! When a peer's socket closes, its pump fails every pending request
//! with `NotConnected` immediately — callers waiting on a dead peer
//! learn at disconnect time, not when their timeout would have expired.
//! The inbound stream then ends, which is the consumer's cue to run the
//! registry cascade (destroy owned rooms/spawners).

mod ack;
mod error;
mod peer;
mod pump;
mod session;
mod store;

pub use ack::{AckTimeoutRegistry, Response};
pub use error::PeerError;
pub use peer::Peer;
pub use pump::{attach, IncomingMessage};
pub use session::{PeerConfig, SessionData};
pub use store::PeerSessionStore;
