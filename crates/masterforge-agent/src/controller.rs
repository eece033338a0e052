//! The spawner controller: turns spawn/kill requests from the master
//! into supervised OS processes.
//!
//! The command line handed to a child encodes everything it needs to
//! come up as a room and claim its spawn task: where the master is,
//! what address to advertise, which port is reserved for it, and the
//! task's secret code. Caller-supplied custom arguments are appended
//! LAST — a default set earlier in the line can always be overridden by
//! ordering, never the other way around.

use std::collections::HashMap;
use std::sync::Mutex;

use masterforge_peer::Peer;
use masterforge_protocol::{
    prop_keys, Codec, JsonCodec, KillSpawn, OpCode, ResponseStatus,
    SpawnId, SpawnRequest, SpawnerId,
};

use crate::{AgentConfig, LaunchSpec, PortPool, ProcessSupervisor};

/// Handles the master's spawn and kill commands for one registered
/// spawner.
pub struct SpawnerController {
    spawner_id: SpawnerId,
    config: AgentConfig,
    master: Peer,
    supervisor: ProcessSupervisor,
    ports: Mutex<PortPool>,
    /// Port reserved for each live spawn, released on exit.
    port_by_spawn: Mutex<HashMap<SpawnId, u16>>,
    codec: JsonCodec,
}

impl SpawnerController {
    pub fn new(
        spawner_id: SpawnerId,
        master: Peer,
        config: AgentConfig,
        supervisor: ProcessSupervisor,
    ) -> Self {
        let ports = PortPool::new(config.port_range.clone());
        Self {
            spawner_id,
            config,
            master,
            supervisor,
            ports: Mutex::new(ports),
            port_by_spawn: Mutex::new(HashMap::new()),
            codec: JsonCodec,
        }
    }

    pub fn spawner_id(&self) -> SpawnerId {
        self.spawner_id
    }

    /// Handles a spawn command. Returns the status and reason to send
    /// back to the master.
    ///
    /// On success the request is acknowledged right away and a separate
    /// `ProcessStarted` notification follows; on a launch failure the
    /// reserved port is returned and no notification is ever sent.
    pub async fn handle_spawn_request(
        &self,
        request: SpawnRequest,
    ) -> (ResponseStatus, String) {
        if request.spawner_id != self.spawner_id {
            return (
                ResponseStatus::NotHandled,
                format!("not spawner {}", request.spawner_id),
            );
        }

        let Some(port) = self.allocate_port() else {
            tracing::warn!(
                spawn_id = %request.spawn_id,
                "no free ports, refusing spawn"
            );
            return (
                ResponseStatus::Failed,
                "no free room ports on this agent".to_string(),
            );
        };

        let spec = LaunchSpec {
            executable: self.config.executable.clone(),
            args: self.compose_args(&request, port),
        };

        match self.supervisor.launch(request.spawn_id, spec).await {
            Ok(pid) => {
                self.port_by_spawn
                    .lock()
                    .expect("port map poisoned")
                    .insert(request.spawn_id, port);
                tracing::info!(
                    spawn_id = %request.spawn_id,
                    pid,
                    port,
                    "spawn handled"
                );
                self.notify_master(
                    OpCode::ProcessStarted,
                    request.spawn_id,
                );
                (ResponseStatus::Success, String::new())
            }
            Err(e) => {
                self.release_port(port);
                tracing::error!(
                    spawn_id = %request.spawn_id,
                    error = %e,
                    "failed to launch room process"
                );
                (ResponseStatus::Failed, e.to_string())
            }
        }
    }

    /// Handles a kill command. Killing a process that's already gone is
    /// fine — its exit path already did the cleanup.
    pub async fn handle_kill_request(
        &self,
        request: KillSpawn,
    ) -> (ResponseStatus, String) {
        if request.spawner_id != self.spawner_id {
            return (
                ResponseStatus::NotHandled,
                format!("not spawner {}", request.spawner_id),
            );
        }

        let killed = self.supervisor.kill(request.spawn_id).await;
        tracing::info!(
            spawn_id = %request.spawn_id,
            killed,
            "kill request handled"
        );
        (ResponseStatus::Success, String::new())
    }

    /// Runs when the supervisor reports a process gone (killed or
    /// natural exit): release its port, tell the master. Exactly one
    /// exit event arrives per process, so both happen exactly once.
    pub async fn on_process_exit(&self, spawn_id: SpawnId) {
        let port = self
            .port_by_spawn
            .lock()
            .expect("port map poisoned")
            .remove(&spawn_id);
        if let Some(port) = port {
            self.release_port(port);
        }
        self.notify_master(OpCode::ProcessKilled, spawn_id);
    }

    /// Kills everything and releases all ports. Agent shutdown path.
    pub async fn shutdown(&self) {
        self.supervisor.kill_all().await;
    }

    fn allocate_port(&self) -> Option<u16> {
        self.ports.lock().expect("port pool poisoned").allocate()
    }

    fn release_port(&self, port: u16) {
        self.ports.lock().expect("port pool poisoned").release(port);
    }

    fn notify_master(&self, op: OpCode, spawn_id: SpawnId) {
        let body = match self.codec.encode(&spawn_id) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode spawn id");
                return;
            }
        };
        if let Err(e) = self.master.notify(op, body) {
            // Master gone; the reconnect/teardown path deals with it.
            tracing::debug!(error = %e, "could not notify master");
        }
    }

    /// Composes the child's argument list. Framework arguments first,
    /// caller custom arguments last.
    fn compose_args(
        &self,
        request: &SpawnRequest,
        port: u16,
    ) -> Vec<String> {
        let mut args = vec![
            "--master-addr".to_string(),
            self.config.master_addr.clone(),
            "--machine-ip".to_string(),
            self.config.machine_ip.clone(),
            "--room-port".to_string(),
            port.to_string(),
        ];

        if let Some(scene) =
            request.properties.get(prop_keys::SCENE_NAME)
        {
            args.push("--scene".to_string());
            args.push(scene.clone());
        }

        if self.config.headless {
            args.push("--headless".to_string());
        }

        args.push("--spawn-id".to_string());
        args.push(request.spawn_id.0.to_string());
        args.push("--spawn-code".to_string());
        args.push(request.unique_code.clone());

        args.extend(
            request
                .custom_args
                .split_whitespace()
                .map(str::to_string),
        );

        args
    }
}

// =========================================================================
// Tests
// =========================================================================
