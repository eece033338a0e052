//! The spawner agent: connects to a master, registers as a spawner, and
//! services spawn/kill commands until the master goes away.

use masterforge_peer::{attach, IncomingMessage, Peer, PeerConfig};
use masterforge_protocol::{
    Codec, JsonCodec, KillSpawn, OpCode, PeerId, ResponseStatus,
    SpawnId, SpawnRequest, SpawnerId,
};
use tokio::sync::mpsc;

use crate::{AgentConfig, AgentError, ProcessSupervisor, SpawnerController};

/// A connected, registered spawner agent.
///
/// ```rust,no_run
/// # use masterforge_agent::{AgentConfig, SpawnerAgent};
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let agent = SpawnerAgent::connect(AgentConfig {
///     master_addr: "127.0.0.1:5000".into(),
///     executable: "./room-server".into(),
///     ..AgentConfig::default()
/// })
/// .await?;
/// agent.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct SpawnerAgent {
    controller: SpawnerController,
    master: Peer,
    inbound: mpsc::UnboundedReceiver<IncomingMessage>,
    exits: mpsc::UnboundedReceiver<SpawnId>,
    codec: JsonCodec,
}

impl SpawnerAgent {
    /// Connects to the master and registers this agent as a spawner.
    ///
    /// # Errors
    /// - transport errors while connecting
    /// - [`AgentError::RegistrationRefused`] if the master says no
    ///   (insufficient permission level, usually)
    pub async fn connect(
        config: AgentConfig,
    ) -> Result<Self, AgentError> {
        let conn =
            masterforge_transport::connect(&config.master_addr).await?;
        // The id is cosmetic on the client side; the master tracks its
        // own ids for us.
        let (master, inbound) =
            attach(conn, PeerId(0), PeerConfig::default(), JsonCodec);

        let codec = JsonCodec;
        let body = codec.encode(&config.spawner_options())?;
        let response =
            master.request(OpCode::RegisterSpawner, body).await;
        if !response.status.is_success() {
            return Err(AgentError::RegistrationRefused(
                response.reason(),
            ));
        }
        let spawner_id: SpawnerId = codec.decode(&response.body)?;
        tracing::info!(
            %spawner_id,
            master = %config.master_addr,
            region = %config.region,
            "spawner registered with master"
        );

        let (supervisor, exits) = ProcessSupervisor::new();
        let controller = SpawnerController::new(
            spawner_id,
            master.clone(),
            config,
            supervisor,
        );

        Ok(Self {
            controller,
            master,
            inbound,
            exits,
            codec,
        })
    }

    pub fn spawner_id(&self) -> SpawnerId {
        self.controller.spawner_id()
    }

    /// Services master commands and process exits until the master
    /// connection ends. Kills every supervised process on the way out.
    pub async fn run(mut self) -> Result<(), AgentError> {
        loop {
            tokio::select! {
                msg = self.inbound.recv() => {
                    match msg {
                        Some(msg) => self.dispatch(msg).await,
                        None => {
                            tracing::warn!("lost master connection");
                            break;
                        }
                    }
                }
                Some(spawn_id) = self.exits.recv() => {
                    self.controller.on_process_exit(spawn_id).await;
                }
            }
        }

        self.controller.shutdown().await;
        self.master.disconnect();
        Ok(())
    }

    /// Routes one master command. Decode failures and unknown ops get
    /// an error response instead of killing the loop.
    async fn dispatch(&self, msg: IncomingMessage) {
        let (status, reason) = match OpCode::from_u16(msg.op) {
            Some(OpCode::SpawnProcessRequest) => {
                match self.codec.decode::<SpawnRequest>(&msg.body) {
                    Ok(request) => {
                        self.controller
                            .handle_spawn_request(request)
                            .await
                    }
                    Err(e) => (ResponseStatus::Error, e.to_string()),
                }
            }
            Some(OpCode::KillProcessRequest) => {
                match self.codec.decode::<KillSpawn>(&msg.body) {
                    Ok(request) => {
                        self.controller
                            .handle_kill_request(request)
                            .await
                    }
                    Err(e) => (ResponseStatus::Error, e.to_string()),
                }
            }
            _ => (
                ResponseStatus::NotHandled,
                "agent does not handle this operation".to_string(),
            ),
        };

        if let Err(e) = msg.respond_with_reason(status, &reason) {
            tracing::debug!(error = %e, "could not respond to master");
        }
    }
}
