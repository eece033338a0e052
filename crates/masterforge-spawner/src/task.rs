//! One spawn task: a single request to launch a room process, tracked
//! from queueing to finalization (or an early death).
//!
//! ```text
//! Queued ─▶ ProcessRequested ─▶ ProcessStarted ─▶ ProcessRegistered ─▶ Finalized
//!    │              │                  │                  │
//!    └──────────────┴────── Aborted / Killed ◀────────────┘
//! ```
//!
//! Status only ever moves forward; the two early terminals are reachable
//! from any non-terminal status, and nothing follows a terminal one.
//! A `ProcessKilled` arriving for a `Finalized` task is the process's
//! normal end of life, not a regression — the status stays `Finalized`.

use std::collections::HashMap;

use masterforge_peer::Peer;
use masterforge_protocol::{SpawnId, SpawnStatus, SpawnerId};

use crate::SpawnerError;

/// Generates the task's secret: a random 32-character hex string the
/// spawned process must present to claim the task. Without it, any
/// connected process could hijack a task id it guessed.
fn generate_spawn_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A single tracked spawn request.
pub struct SpawnTask {
    id: SpawnId,
    spawner_id: SpawnerId,
    /// The client that asked for the spawn, if any. Receives status
    /// pushes and may fetch finalization data or abort.
    requester: Option<Peer>,
    /// The spawned process, once it claims the task with the code.
    registered_peer: Option<Peer>,
    options: HashMap<String, String>,
    custom_args: String,
    unique_code: String,
    status: SpawnStatus,
    /// `true` while the task counts against its spawner's running
    /// processes (set when the spawn command is dispatched, cleared when
    /// the process is known dead).
    counts_running: bool,
    finalization: Option<HashMap<String, String>>,
}

impl SpawnTask {
    pub(crate) fn new(
        id: SpawnId,
        spawner_id: SpawnerId,
        options: HashMap<String, String>,
        custom_args: String,
    ) -> Self {
        Self {
            id,
            spawner_id,
            requester: None,
            registered_peer: None,
            options,
            custom_args,
            unique_code: generate_spawn_code(),
            status: SpawnStatus::Queued,
            counts_running: false,
            finalization: None,
        }
    }

    pub fn id(&self) -> SpawnId {
        self.id
    }

    pub fn spawner_id(&self) -> SpawnerId {
        self.spawner_id
    }

    pub fn status(&self) -> SpawnStatus {
        self.status
    }

    pub fn unique_code(&self) -> &str {
        &self.unique_code
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    pub fn custom_args(&self) -> &str {
        &self.custom_args
    }

    pub fn requester(&self) -> Option<&Peer> {
        self.requester.as_ref()
    }

    pub(crate) fn set_requester(&mut self, peer: Peer) {
        self.requester = Some(peer);
    }

    pub fn registered_peer(&self) -> Option<&Peer> {
        self.registered_peer.as_ref()
    }

    pub(crate) fn counts_running(&self) -> bool {
        self.counts_running
    }

    pub(crate) fn clear_counts_running(&mut self) {
        self.counts_running = false;
    }

    /// Moves forward along the normal chain. Any attempt to stand still,
    /// go back, or leave a terminal status is an invalid transition.
    fn advance(
        &mut self,
        to: SpawnStatus,
    ) -> Result<SpawnStatus, SpawnerError> {
        if self.status.is_terminal() || to <= self.status {
            return Err(SpawnerError::InvalidTransition {
                spawn_id: self.id,
                from: self.status,
                to,
            });
        }
        tracing::debug!(
            spawn_id = %self.id,
            from = %self.status,
            to = %to,
            "spawn task status changed"
        );
        self.status = to;
        Ok(to)
    }

    /// The spawn command went out to the agent.
    pub(crate) fn mark_process_requested(
        &mut self,
    ) -> Result<SpawnStatus, SpawnerError> {
        let status = self.advance(SpawnStatus::ProcessRequested)?;
        self.counts_running = true;
        Ok(status)
    }

    /// The agent reported the OS process is up.
    pub(crate) fn mark_process_started(
        &mut self,
    ) -> Result<SpawnStatus, SpawnerError> {
        self.advance(SpawnStatus::ProcessStarted)
    }

    /// The spawned process claims the task. The presented code must
    /// match the task's secret.
    pub(crate) fn register_process(
        &mut self,
        peer: Peer,
        code: &str,
    ) -> Result<SpawnStatus, SpawnerError> {
        if code != self.unique_code {
            return Err(SpawnerError::CodeMismatch(self.id));
        }
        let status = self.advance(SpawnStatus::ProcessRegistered)?;
        self.registered_peer = Some(peer);
        Ok(status)
    }

    /// The spawned process delivers its completion payload. Only the
    /// peer that registered to the task may finalize it.
    pub(crate) fn finalize(
        &mut self,
        peer: &Peer,
        data: HashMap<String, String>,
    ) -> Result<SpawnStatus, SpawnerError> {
        match &self.registered_peer {
            Some(registered) if registered.same_peer(peer) => {}
            _ => return Err(SpawnerError::NotRegisteredPeer(self.id)),
        }
        let status = self.advance(SpawnStatus::Finalized)?;
        self.finalization = Some(data);
        Ok(status)
    }

    /// Aborts the task. Legal from any status before `Finalized`;
    /// aborting an already-dead task is a quiet no-op.
    pub(crate) fn abort(
        &mut self,
    ) -> Result<Option<SpawnStatus>, SpawnerError> {
        match self.status {
            SpawnStatus::Finalized => {
                Err(SpawnerError::CannotAbortFinalized(self.id))
            }
            SpawnStatus::Aborted | SpawnStatus::Killed => Ok(None),
            _ => {
                tracing::info!(
                    spawn_id = %self.id,
                    from = %self.status,
                    "spawn task aborted"
                );
                self.status = SpawnStatus::Aborted;
                Ok(Some(SpawnStatus::Aborted))
            }
        }
    }

    /// The OS process died. For a non-terminal task this is the `Killed`
    /// terminal; for a `Finalized` (or already aborted) task it's just
    /// the process's end of life and the status stands.
    pub(crate) fn mark_killed(&mut self) -> Option<SpawnStatus> {
        if self.status.is_terminal() {
            return None;
        }
        tracing::info!(
            spawn_id = %self.id,
            from = %self.status,
            "spawned process died"
        );
        self.status = SpawnStatus::Killed;
        Some(SpawnStatus::Killed)
    }

    /// The finalization payload, gated on being the original requester.
    pub fn finalization_data(
        &self,
        peer: &Peer,
    ) -> Result<&HashMap<String, String>, SpawnerError> {
        match &self.requester {
            Some(requester) if requester.same_peer(peer) => {}
            _ => return Err(SpawnerError::NotRequester(self.id)),
        }
        self.finalization
            .as_ref()
            .ok_or(SpawnerError::NoFinalizationData(self.id))
    }
}

// =========================================================================
// Tests
// =========================================================================
