//! The spawner registry: the fleet of spawn-capable agents and every
//! spawn task, live or finished.
//!
//! # Lock discipline
//!
//! The registry is plain single-writer state behind the master's mutex.
//! Anything that needs a network round trip — dispatching a spawn
//! command, killing a remote process, pushing a status update — is
//! returned to the caller as a *plan* ([`SpawnPlan`], [`KillPlan`],
//! [`StatusNotice`]) to be executed after the lock is dropped. The
//! registry itself never awaits.

use std::collections::{HashMap, HashSet};

use masterforge_peer::Peer;
use masterforge_protocol::{
    KillSpawn, PeerId, SpawnId, SpawnRequest, SpawnStatus, SpawnerId,
    SpawnerOptions,
};

use crate::{RegisteredSpawner, SpawnTask, SpawnerConfig, SpawnerError};

/// A status change to push to the task's requester.
pub struct StatusNotice {
    pub requester: Peer,
    pub spawn_id: SpawnId,
    pub status: SpawnStatus,
}

/// A spawn command ready to be sent to an agent.
pub struct SpawnPlan {
    pub agent: Peer,
    pub request: SpawnRequest,
    pub spawn_id: SpawnId,
}

/// A kill command ready to be sent to an agent.
pub struct KillPlan {
    pub agent: Peer,
    pub request: KillSpawn,
}

/// Tracks registered spawners and spawn tasks for one master instance.
pub struct SpawnerRegistry {
    spawners: HashMap<SpawnerId, RegisteredSpawner>,
    tasks: HashMap<SpawnId, SpawnTask>,
    /// Spawners owned by each agent peer, for the disconnect cascade.
    owned: HashMap<PeerId, HashSet<SpawnerId>>,
    /// The one client spawn request each peer may have in flight.
    active_requests: HashMap<PeerId, SpawnId>,
    next_spawner_id: u64,
    next_spawn_id: u64,
    config: SpawnerConfig,
}

impl SpawnerRegistry {
    pub fn new(config: SpawnerConfig) -> Self {
        Self {
            spawners: HashMap::new(),
            tasks: HashMap::new(),
            owned: HashMap::new(),
            active_requests: HashMap::new(),
            next_spawner_id: 1,
            next_spawn_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    // -- Spawner lifecycle ------------------------------------------------

    /// Registers a spawner for `owner` and returns it.
    pub fn register(
        &mut self,
        owner: Peer,
        options: SpawnerOptions,
    ) -> &RegisteredSpawner {
        let id = SpawnerId(self.next_spawner_id);
        self.next_spawner_id += 1;

        let owner_id = owner.id();
        self.owned.entry(owner_id).or_default().insert(id);

        tracing::info!(
            spawner_id = %id,
            owner = %owner_id,
            region = %options.region,
            max_processes = options.max_processes,
            "spawner registered"
        );
        self.spawners
            .entry(id)
            .or_insert(RegisteredSpawner::new(id, owner, options))
    }

    /// Removes a spawner, aborting its queued tasks and writing off its
    /// dispatched ones (their agent can no longer report anything).
    pub fn destroy(
        &mut self,
        spawner_id: SpawnerId,
    ) -> Option<Vec<StatusNotice>> {
        let mut spawner = self.spawners.remove(&spawner_id)?;

        let owner_id = spawner.owner().id();
        if let Some(owned) = self.owned.get_mut(&owner_id) {
            owned.remove(&spawner_id);
            if owned.is_empty() {
                self.owned.remove(&owner_id);
            }
        }

        let mut notices = Vec::new();

        // Queued tasks never reached the agent: abort them.
        for spawn_id in spawner.drain_queue() {
            if let Some(task) = self.tasks.get_mut(&spawn_id) {
                if let Ok(Some(status)) = task.abort() {
                    notices.extend(notice_for(task, status));
                }
            }
        }

        // Dispatched tasks will never get a ProcessKilled report from
        // this agent: write them off as killed now.
        for task in self
            .tasks
            .values_mut()
            .filter(|t| t.spawner_id() == spawner_id)
        {
            if task.counts_running() {
                task.clear_counts_running();
            }
            if let Some(status) = task.mark_killed() {
                notices.extend(notice_for(task, status));
            }
        }

        tracing::info!(
            spawner_id = %spawner_id,
            owner = %owner_id,
            total = self.spawners.len(),
            "spawner destroyed"
        );
        Some(notices)
    }

    /// Destroys every spawner the disconnected peer owned and forgets
    /// its active client request.
    pub fn on_peer_disconnected(
        &mut self,
        peer_id: PeerId,
    ) -> Vec<StatusNotice> {
        self.active_requests.remove(&peer_id);

        let Some(spawner_ids) = self.owned.remove(&peer_id) else {
            return Vec::new();
        };
        let mut notices = Vec::new();
        for id in spawner_ids {
            // destroy() re-consults the owned index; the entry is
            // already gone, which it tolerates.
            if let Some(batch) = self.destroy(id) {
                notices.extend(batch);
            }
        }
        notices
    }

    pub fn spawner(
        &self,
        spawner_id: SpawnerId,
    ) -> Result<&RegisteredSpawner, SpawnerError> {
        self.spawners
            .get(&spawner_id)
            .ok_or(SpawnerError::SpawnerNotFound(spawner_id))
    }

    pub fn spawner_count(&self) -> usize {
        self.spawners.len()
    }

    // -- Task creation ----------------------------------------------------

    /// Picks the least-busy spawner matching `region` and queues a task
    /// on it. Returns `None` when every candidate is saturated — "try
    /// again later", not an error.
    pub fn spawn(
        &mut self,
        options: HashMap<String, String>,
        region: &str,
        custom_args: &str,
    ) -> Option<SpawnId> {
        let mut candidates: Vec<&RegisteredSpawner> = self
            .spawners
            .values()
            .filter(|s| region.is_empty() || s.options().region == region)
            .collect();

        // Least busy first.
        candidates.sort_by(|a, b| b.free_slots().cmp(&a.free_slots()));
        let spawner_id = candidates
            .iter()
            .find(|s| s.can_spawn_another())?
            .id();

        let spawn_id = SpawnId(self.next_spawn_id);
        self.next_spawn_id += 1;

        let task = SpawnTask::new(
            spawn_id,
            spawner_id,
            options,
            custom_args.to_string(),
        );
        self.tasks.insert(spawn_id, task);
        self.spawners
            .get_mut(&spawner_id)
            .expect("candidate came from the map")
            .enqueue(spawn_id);

        tracing::info!(
            spawn_id = %spawn_id,
            spawner_id = %spawner_id,
            region = %region,
            "spawn task queued"
        );
        Some(spawn_id)
    }

    /// A client asks for a spawn: enforces the one-request-at-a-time
    /// rule, queues the task, and binds the client as requester.
    pub fn client_spawn(
        &mut self,
        peer: &Peer,
        options: HashMap<String, String>,
        region: &str,
        custom_args: &str,
    ) -> Result<SpawnId, SpawnerError> {
        if !self.config.enable_client_spawn_requests {
            return Err(SpawnerError::ClientSpawnDisabled);
        }

        if let Some(previous) = self.active_requests.get(&peer.id()) {
            if let Some(task) = self.tasks.get(previous) {
                if !task.status().is_done_starting() {
                    return Err(SpawnerError::AlreadyActiveRequest(
                        *previous,
                    ));
                }
            }
        }

        let spawn_id = self
            .spawn(options, region, custom_args)
            .ok_or(SpawnerError::NoCapacity)?;

        let task = self
            .tasks
            .get_mut(&spawn_id)
            .expect("just created this task");
        task.set_requester(peer.clone());
        self.active_requests.insert(peer.id(), spawn_id);
        Ok(spawn_id)
    }

    pub fn task(
        &self,
        spawn_id: SpawnId,
    ) -> Result<&SpawnTask, SpawnerError> {
        self.tasks
            .get(&spawn_id)
            .ok_or(SpawnerError::TaskNotFound(spawn_id))
    }

    fn task_mut(
        &mut self,
        spawn_id: SpawnId,
    ) -> Result<&mut SpawnTask, SpawnerError> {
        self.tasks
            .get_mut(&spawn_id)
            .ok_or(SpawnerError::TaskNotFound(spawn_id))
    }

    // -- Queue draining ---------------------------------------------------

    /// Dequeues every task that may start right now, re-validating each
    /// spawner's capacity at dispatch time (other tasks may have started
    /// since the task was enqueued).
    ///
    /// Returns the spawn commands to send and the status pushes to make,
    /// both executed by the caller without the registry lock.
    pub fn drain_queues(
        &mut self,
    ) -> (Vec<SpawnPlan>, Vec<StatusNotice>) {
        let mut plans = Vec::new();
        let mut notices = Vec::new();

        for spawner in self.spawners.values_mut() {
            while spawner.has_free_running_slot() {
                let Some(spawn_id) = spawner.dequeue() else {
                    break;
                };
                let Some(task) = self.tasks.get_mut(&spawn_id) else {
                    continue;
                };
                if task.status().is_terminal() {
                    // Aborted while it sat in the queue.
                    continue;
                }

                match task.mark_process_requested() {
                    Ok(status) => {
                        spawner.note_dispatched();
                        notices.extend(notice_for(task, status));
                        plans.push(SpawnPlan {
                            agent: spawner.owner().clone(),
                            request: SpawnRequest {
                                spawner_id: spawner.id(),
                                spawn_id,
                                unique_code: task
                                    .unique_code()
                                    .to_string(),
                                custom_args: task
                                    .custom_args()
                                    .to_string(),
                                properties: task.options().clone(),
                            },
                            spawn_id,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(
                            spawn_id = %spawn_id,
                            error = %e,
                            "queued task in unexpected state, dropping"
                        );
                    }
                }
            }
        }

        (plans, notices)
    }

    /// The spawn command for a dispatched task failed (send error, agent
    /// refused, or timed out): abort the task and free the slot.
    pub fn fail_dispatch(
        &mut self,
        spawn_id: SpawnId,
    ) -> Option<StatusNotice> {
        let task = self.tasks.get_mut(&spawn_id)?;
        if task.counts_running() {
            task.clear_counts_running();
            if let Some(spawner) =
                self.spawners.get_mut(&task.spawner_id())
            {
                spawner.note_process_gone();
            }
        }
        let task = self.tasks.get_mut(&spawn_id)?;
        let status = task.abort().ok().flatten()?;
        tracing::warn!(
            spawn_id = %spawn_id,
            "spawn dispatch failed, task aborted"
        );
        notice_for(task, status)
    }

    // -- Task transitions -------------------------------------------------

    /// Agent notification: the OS process for `spawn_id` is up. Late or
    /// duplicate reports are tolerated silently.
    pub fn on_process_started(
        &mut self,
        spawn_id: SpawnId,
    ) -> Option<StatusNotice> {
        let task = self.tasks.get_mut(&spawn_id)?;
        match task.mark_process_started() {
            Ok(status) => notice_for(task, status),
            Err(e) => {
                // The child may have registered first, or the task died
                // meanwhile; either way the report is stale.
                tracing::debug!(
                    spawn_id = %spawn_id,
                    error = %e,
                    "ignoring stale process-started report"
                );
                None
            }
        }
    }

    /// Agent notification: the OS process for `spawn_id` exited. Frees
    /// the agent's slot and, for a task that hadn't finished, marks it
    /// killed.
    pub fn on_process_killed(
        &mut self,
        spawn_id: SpawnId,
    ) -> Option<StatusNotice> {
        let spawner_id = {
            let task = self.tasks.get_mut(&spawn_id)?;
            if task.counts_running() {
                task.clear_counts_running();
                Some(task.spawner_id())
            } else {
                None
            }
        };
        if let Some(spawner_id) = spawner_id {
            if let Some(spawner) = self.spawners.get_mut(&spawner_id) {
                spawner.note_process_gone();
            }
        }

        let task = self.tasks.get_mut(&spawn_id)?;
        let status = task.mark_killed()?;
        notice_for(task, status)
    }

    /// A spawned process claims its task with the secret code. Returns
    /// the task's properties (the process needs them to configure
    /// itself) and the status push.
    pub fn register_process(
        &mut self,
        spawn_id: SpawnId,
        peer: &Peer,
        code: &str,
    ) -> Result<
        (HashMap<String, String>, Option<StatusNotice>),
        SpawnerError,
    > {
        let task = self.task_mut(spawn_id)?;
        let status = task.register_process(peer.clone(), code)?;
        let properties = task.options().clone();
        let notice = notice_for(task, status);
        Ok((properties, notice))
    }

    /// The spawned process reports completion with its payload.
    pub fn complete(
        &mut self,
        spawn_id: SpawnId,
        peer: &Peer,
        data: HashMap<String, String>,
    ) -> Result<Option<StatusNotice>, SpawnerError> {
        let task = self.task_mut(spawn_id)?;
        let status = task.finalize(peer, data)?;
        Ok(notice_for(task, status))
    }

    /// Aborts a task on behalf of `peer` (must be its requester).
    ///
    /// If a process may already exist for the task, the returned
    /// [`KillPlan`] tells the caller to ask the agent to kill it.
    pub fn abort(
        &mut self,
        spawn_id: SpawnId,
        peer: &Peer,
    ) -> Result<(Option<StatusNotice>, Option<KillPlan>), SpawnerError>
    {
        let task = self.task_mut(spawn_id)?;
        match task.requester() {
            Some(requester) if requester.same_peer(peer) => {}
            _ => return Err(SpawnerError::NotRequester(spawn_id)),
        }

        let before = task.status();
        let Some(status) = task.abort()? else {
            return Ok((None, None));
        };
        let notice = notice_for(task, status);
        let spawner_id = task.spawner_id();

        let kill = if before >= SpawnStatus::ProcessRequested {
            // A process may be alive out there; have the agent kill it.
            // The slot is freed when ProcessKilled comes back.
            self.spawners.get(&spawner_id).map(|spawner| KillPlan {
                agent: spawner.owner().clone(),
                request: KillSpawn {
                    spawner_id,
                    spawn_id,
                },
            })
        } else {
            // Still queued: just pull it out of the queue.
            if let Some(spawner) = self.spawners.get_mut(&spawner_id) {
                spawner.remove_queued(spawn_id);
            }
            None
        };

        Ok((notice, kill))
    }

    /// The finalization payload, for the task's original requester only.
    pub fn finalization_data(
        &self,
        spawn_id: SpawnId,
        peer: &Peer,
    ) -> Result<HashMap<String, String>, SpawnerError> {
        let task = self.task(spawn_id)?;
        task.finalization_data(peer).cloned()
    }
}

fn notice_for(
    task: &SpawnTask,
    status: SpawnStatus,
) -> Option<StatusNotice> {
    task.requester().map(|requester| StatusNotice {
        requester: requester.clone(),
        spawn_id: task.id(),
        status,
    })
}

// =========================================================================
// Tests
// =========================================================================
