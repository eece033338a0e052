//! `MasterServer` builder and accept loop.
//!
//! Ties the layers together: transport → peer pump → dispatch →
//! registries, plus the per-instance maintenance task.

use std::sync::Arc;

use masterforge_peer::{attach, PeerConfig};
use masterforge_protocol::JsonCodec;
use masterforge_rooms::RoomsConfig;
use masterforge_spawner::SpawnerConfig;
use masterforge_transport::{
    ServerWsConnection, Transport, WebSocketTransport,
};

use crate::handlers;
use crate::maintenance::spawn_maintenance;
use crate::{MasterConfig, MasterContext, MasterforgeError};

/// Builder for configuring and starting a master server.
///
/// # Example
///
/// ```rust,no_run
/// # use masterforge::MasterServerBuilder;
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let server = MasterServerBuilder::new()
///     .bind("0.0.0.0:5000")
///     .build()
///     .await?;
/// server.run().await?;
/// # Ok(())
/// # }
/// ```
pub struct MasterServerBuilder {
    bind_addr: String,
    config: MasterConfig,
}

impl MasterServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            config: MasterConfig::new(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room subsystem configuration.
    pub fn rooms_config(mut self, config: RoomsConfig) -> Self {
        self.config.rooms = config;
        self
    }

    /// Sets the spawner subsystem configuration.
    pub fn spawners_config(mut self, config: SpawnerConfig) -> Self {
        self.config.spawners = config;
        self
    }

    /// Sets the per-peer configuration (timeouts, sweep cadence).
    pub fn peer_config(mut self, config: PeerConfig) -> Self {
        self.config.peer = config;
        self
    }

    /// Binds the transport and builds the server.
    ///
    /// Uses `JsonCodec` over WebSocket — the default stack.
    pub async fn build(self) -> Result<MasterServer, MasterforgeError> {
        let transport =
            WebSocketTransport::bind(&self.bind_addr).await?;
        let context = Arc::new(MasterContext::new(self.config));
        Ok(MasterServer { transport, context })
    }
}

impl Default for MasterServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running master server.
pub struct MasterServer {
    transport: WebSocketTransport,
    context: Arc<MasterContext>,
}

impl MasterServer {
    /// Creates a new builder.
    pub fn builder() -> MasterServerBuilder {
        MasterServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// This instance's shared state. Exposed for embedding scenarios
    /// (server-side matchmakers calling `spawn` directly, tests).
    pub fn context(&self) -> &Arc<MasterContext> {
        &self.context
    }

    /// Runs the accept loop. Each connection gets its own task; the
    /// maintenance sweeps run alongside for the life of the server.
    pub async fn run(mut self) -> Result<(), MasterforgeError> {
        tracing::info!("master server running");
        let _maintenance = spawn_maintenance(Arc::clone(&self.context));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(handle_connection(context, conn));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Services one peer from attach to disconnect cascade.
async fn handle_connection(
    ctx: Arc<MasterContext>,
    conn: ServerWsConnection,
) {
    let peer_id = ctx.peers.lock().await.next_peer_id();
    let (peer, mut inbound) =
        attach(conn, peer_id, ctx.config.peer.clone(), JsonCodec);
    ctx.peers.lock().await.insert(peer.clone());
    tracing::info!(%peer_id, "peer connected");

    while let Some(msg) = inbound.recv().await {
        handlers::dispatch(&ctx, msg).await;
    }

    // The stream ended: the socket closed (the pump already failed this
    // peer's pending acks with NotConnected). Cascade-destroy whatever
    // the peer owned, registry by registry, synchronously.
    tracing::info!(%peer_id, "peer disconnected, cascading");
    ctx.peers.lock().await.remove(peer_id);

    let destroyed_rooms =
        ctx.rooms.lock().await.on_peer_disconnected(peer_id);
    if !destroyed_rooms.is_empty() {
        tracing::info!(
            %peer_id,
            rooms = destroyed_rooms.len(),
            "destroyed rooms of disconnected peer"
        );
    }

    let notices =
        ctx.spawners.lock().await.on_peer_disconnected(peer_id);
    for notice in &notices {
        handlers::push_status(notice);
    }

    peer.disconnect();
}
