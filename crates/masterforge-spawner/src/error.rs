//! Error types for the spawner layer.

use masterforge_protocol::{SpawnId, SpawnStatus, SpawnerId};

/// Errors that can occur during spawner and spawn-task operations.
#[derive(Debug, thiserror::Error)]
pub enum SpawnerError {
    /// The spawner does not exist.
    #[error("spawner {0} does not exist")]
    SpawnerNotFound(SpawnerId),

    /// The spawn task does not exist.
    #[error("spawn task {0} does not exist")]
    TaskNotFound(SpawnId),

    /// Every eligible spawner is at capacity. Transient; retry later.
    #[error("all spawners are busy, try again later")]
    NoCapacity,

    /// Client-initiated spawn requests are switched off.
    #[error("client spawn requests are disabled")]
    ClientSpawnDisabled,

    /// The peer already has a spawn request that hasn't finished
    /// starting.
    #[error("you already have an active spawn request ({0})")]
    AlreadyActiveRequest(SpawnId),

    /// The presented spawn code doesn't match the task's secret.
    #[error("spawn code mismatch for task {0}")]
    CodeMismatch(SpawnId),

    /// The peer is not the task's original requester.
    #[error("you are not the requester of task {0}")]
    NotRequester(SpawnId),

    /// The peer is not the process that registered to the task.
    #[error("a different process registered to task {0}")]
    NotRegisteredPeer(SpawnId),

    /// Finalized tasks can't be aborted.
    #[error("task {0} has already been finalized")]
    CannotAbortFinalized(SpawnId),

    /// The task hasn't delivered finalization data (yet, or ever).
    #[error("task {0} has no finalization data")]
    NoFinalizationData(SpawnId),

    /// A status change that would stand still, regress, or leave a
    /// terminal status.
    #[error("task {spawn_id}: invalid status transition {from} -> {to}")]
    InvalidTransition {
        spawn_id: SpawnId,
        from: SpawnStatus,
        to: SpawnStatus,
    },
}
