//! Spawner orchestration for Masterforge.
//!
//! Spawner agents are processes that can launch game-server ("room")
//! processes on demand. This crate is the master's view of that fleet:
//!
//! - [`SpawnerRegistry`] — registers agents, picks the least-busy one
//!   for each spawn, drains queues, cascades on agent disconnect
//! - [`RegisteredSpawner`] — one agent's capacity accounting and queue
//! - [`SpawnTask`] — one spawn request's lifecycle, secret code, and
//!   authorization rules
//!
//! # A spawn, end to end
//!
//! ```text
//! client ──ClientSpawnRequest──▶ master            queue: [task]
//!                                  │ drain (100 ms cadence)
//!                                  ├──SpawnProcessRequest──▶ agent
//!                                  ◀──ProcessStarted─────── agent (OS process up)
//!          new room process ──RegisterSpawnedProcess(code)──▶ master
//!          new room process ──CompleteSpawnProcess(data)────▶ master
//! client ──GetSpawnFinalizationData──▶ master      (requester only)
//! ```
//!
//! Every status change along the way is pushed to the requester as a
//! `SpawnStatusUpdate`.

mod config;
mod error;
mod registry;
mod spawner;
mod task;

pub use config::SpawnerConfig;
pub use error::SpawnerError;
pub use registry::{KillPlan, SpawnPlan, SpawnerRegistry, StatusNotice};
pub use spawner::RegisteredSpawner;
pub use task::SpawnTask;
