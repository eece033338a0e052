//! The process supervisor: launches room processes and watches them die.
//!
//! The supervisor owns the spawn-id → process bookkeeping outright;
//! nothing else ever sees an OS handle. Its surface is three moves:
//!
//! - [`launch`](ProcessSupervisor::launch) — start a child, watch it
//! - [`kill`](ProcessSupervisor::kill) — force-terminate by spawn id
//!   (unknown id is a no-op, not an error: the process may simply have
//!   exited already)
//! - the **exit channel** — exactly one event per launched process,
//!   whatever way it died
//!
//! # Concurrency note
//!
//! Spawn completion and kill requests race. Each child is owned by its
//! own monitor task; the shared map holds only kill triggers, behind
//! one lock. The monitor is the sole path to the exit event, so "port
//! released and killed-notification sent exactly once" holds no matter
//! who wins the race.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use masterforge_protocol::SpawnId;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::AgentError;

/// What to run for one spawn task: the executable and its full argument
/// list, already composed.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
}

/// Launches and supervises room processes.
pub struct ProcessSupervisor {
    kill_triggers:
        Arc<Mutex<HashMap<SpawnId, oneshot::Sender<()>>>>,
    exit_tx: mpsc::UnboundedSender<SpawnId>,
}

impl ProcessSupervisor {
    /// Creates a supervisor and the channel its exit events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SpawnId>) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        (
            Self {
                kill_triggers: Arc::new(Mutex::new(HashMap::new())),
                exit_tx,
            },
            exit_rx,
        )
    }

    /// Spawns the child process and a monitor task that waits for it.
    /// Returns the OS pid. Launching is non-blocking; only the monitor
    /// ever waits on the child.
    ///
    /// # Errors
    /// [`AgentError::LaunchFailed`] if the OS refuses to start the
    /// process (bad path, permissions). No exit event is emitted in
    /// that case.
    pub async fn launch(
        &self,
        spawn_id: SpawnId,
        spec: LaunchSpec,
    ) -> Result<u32, AgentError> {
        let mut child = Command::new(&spec.executable)
            .args(&spec.args)
            .kill_on_drop(true)
            .spawn()
            .map_err(AgentError::LaunchFailed)?;
        let pid = child.id().unwrap_or(0);

        tracing::info!(
            %spawn_id,
            pid,
            executable = %spec.executable.display(),
            "process launched"
        );

        let (kill_tx, mut kill_rx) = oneshot::channel();
        self.kill_triggers.lock().await.insert(spawn_id, kill_tx);

        let triggers = Arc::clone(&self.kill_triggers);
        let exit_tx = self.exit_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    tracing::info!(
                        %spawn_id,
                        status = ?status.as_ref().ok(),
                        "process exited"
                    );
                }
                _ = &mut kill_rx => {
                    tracing::info!(%spawn_id, "killing process on request");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                }
            }
            triggers.lock().await.remove(&spawn_id);
            // The single exit event for this process, any way it died.
            let _ = exit_tx.send(spawn_id);
        });

        Ok(pid)
    }

    /// Force-terminates the process of `spawn_id` if it is still alive.
    /// Returns `false` (and does nothing) when there's no live handle —
    /// already exited, or never launched.
    pub async fn kill(&self, spawn_id: SpawnId) -> bool {
        match self.kill_triggers.lock().await.remove(&spawn_id) {
            Some(trigger) => trigger.send(()).is_ok(),
            None => false,
        }
    }

    /// Number of processes still being supervised.
    pub async fn running_count(&self) -> usize {
        self.kill_triggers.lock().await.len()
    }

    /// Kills everything still running. Used at agent shutdown so no
    /// orphaned room processes linger.
    pub async fn kill_all(&self) {
        let triggers: Vec<_> = {
            let mut map = self.kill_triggers.lock().await;
            map.drain().collect()
        };
        for (spawn_id, trigger) in triggers {
            tracing::info!(%spawn_id, "killing process at shutdown");
            let _ = trigger.send(());
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! These run real OS processes (`sleep`), so they live behind the
    //! same Tokio runtime the supervisor expects in production.

    use super::*;
    use std::time::Duration;

    fn sleep_spec(seconds: &str) -> LaunchSpec {
        LaunchSpec {
            executable: PathBuf::from("sleep"),
            args: vec![seconds.to_string()],
        }
    }

    #[tokio::test]
    async fn test_natural_exit_emits_one_event() {
        let (supervisor, mut exits) = ProcessSupervisor::new();
        supervisor
            .launch(SpawnId(1), sleep_spec("0"))
            .await
            .expect("sleep should launch");

        let exited = tokio::time::timeout(
            Duration::from_secs(5),
            exits.recv(),
        )
        .await
        .expect("exit event should arrive")
        .expect("channel open");
        assert_eq!(exited, SpawnId(1));
        assert_eq!(supervisor.running_count().await, 0);

        // No second event for the same process.
        let extra = tokio::time::timeout(
            Duration::from_millis(100),
            exits.recv(),
        )
        .await;
        assert!(extra.is_err(), "exactly one exit event per process");
    }

    #[tokio::test]
    async fn test_kill_terminates_and_emits_event() {
        let (supervisor, mut exits) = ProcessSupervisor::new();
        supervisor
            .launch(SpawnId(7), sleep_spec("30"))
            .await
            .expect("sleep should launch");
        assert_eq!(supervisor.running_count().await, 1);

        assert!(supervisor.kill(SpawnId(7)).await);

        let exited = tokio::time::timeout(
            Duration::from_secs(5),
            exits.recv(),
        )
        .await
        .expect("killed process must still produce its exit event")
        .expect("channel open");
        assert_eq!(exited, SpawnId(7));
        assert_eq!(supervisor.running_count().await, 0);
    }

    #[tokio::test]
    async fn test_kill_unknown_spawn_is_noop() {
        let (supervisor, _exits) = ProcessSupervisor::new();
        assert!(!supervisor.kill(SpawnId(99)).await);
    }

    #[tokio::test]
    async fn test_launch_failure_is_error_and_no_event() {
        let (supervisor, mut exits) = ProcessSupervisor::new();
        let result = supervisor
            .launch(
                SpawnId(1),
                LaunchSpec {
                    executable: PathBuf::from(
                        "/nonexistent/room-server-binary",
                    ),
                    args: vec![],
                },
            )
            .await;
        assert!(matches!(result, Err(AgentError::LaunchFailed(_))));

        let extra = tokio::time::timeout(
            Duration::from_millis(100),
            exits.recv(),
        )
        .await;
        assert!(extra.is_err(), "failed launch must not emit an exit");
    }

    #[tokio::test]
    async fn test_kill_all_sweeps_everything() {
        let (supervisor, mut exits) = ProcessSupervisor::new();
        supervisor
            .launch(SpawnId(1), sleep_spec("30"))
            .await
            .unwrap();
        supervisor
            .launch(SpawnId(2), sleep_spec("30"))
            .await
            .unwrap();

        supervisor.kill_all().await;

        let mut seen = Vec::new();
        for _ in 0..2 {
            let exited = tokio::time::timeout(
                Duration::from_secs(5),
                exits.recv(),
            )
            .await
            .expect("exit events after kill_all")
            .expect("channel open");
            seen.push(exited);
        }
        seen.sort_by_key(|id| id.0);
        assert_eq!(seen, vec![SpawnId(1), SpawnId(2)]);
    }
}
