//! The spawner agent for Masterforge.
//!
//! An agent is the process that actually runs on a game-server machine:
//! it registers with the master as a spawner, and when the master asks,
//! launches a room process with a composed command line, supervises it,
//! and reports its fate back.
//!
//! # Pieces
//!
//! - [`SpawnerAgent`] — connect, register, service commands
//! - [`SpawnerController`] — spawn/kill handling, command-line
//!   composition, port bookkeeping, master notifications
//! - [`ProcessSupervisor`] — owns the OS handles; launch, kill, and a
//!   single exit event per process
//! - [`PortPool`] — one reserved port per live room process
//!
//! # Resource guarantees
//!
//! Whatever way a process dies — natural exit, kill request from the
//! master, agent shutdown — its port is released exactly once and the
//! master gets exactly one `ProcessKilled` notification, because both
//! happen on the supervisor's single per-process exit event.

mod agent;
mod config;
mod controller;
mod error;
mod ports;
mod supervisor;

pub use agent::SpawnerAgent;
pub use config::AgentConfig;
pub use controller::SpawnerController;
pub use error::AgentError;
pub use ports::PortPool;
pub use supervisor::{LaunchSpec, ProcessSupervisor};
