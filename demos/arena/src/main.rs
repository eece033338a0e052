//! End-to-end demo: master + spawner agent + client in one process.
//!
//! The binary plays two roles. Run with no arguments it starts a master
//! and an agent, then acts as a client: requests a spawn, watches the
//! task climb through its statuses, and finally asks for access to the
//! room that came up. The agent's "room executable" is this same binary
//! — the spawned child detects the `--spawn-code` argument, registers
//! as a spawned process AND as a room, approves the access check, and
//! idles until the master goes away.
//!
//! ```text
//! $ cargo run -p arena
//! ```

use std::collections::HashMap;
use std::time::Duration;

use masterforge::prelude::*;
use masterforge_agent::{AgentConfig, SpawnerAgent};
use masterforge_peer::{attach, IncomingMessage, Peer};
use masterforge_protocol::{
    prop_keys, ClientSpawnRequest, RegisterSpawnedProcess,
    RoomAccessCheck, RoomAccessPacket, RoomAccessRequest,
    SpawnFinalization, SpawnStatusUpdate,
};
use masterforge_rooms::generate_access_token;
use tokio::sync::mpsc;

const CODEC: JsonCodec = JsonCodec;

#[tokio::main]
async fn main() {
    masterforge::init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if arg_value(&args, "--spawn-code").is_some() {
        room_process_main(&args).await;
    } else {
        orchestrate().await;
    }
}

/// Pulls the value following a flag out of an argument list.
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

// ---------------------------------------------------------------------------
// Master + agent + client
// ---------------------------------------------------------------------------

async fn orchestrate() {
    // 1. Master on a random loopback port.
    let server = MasterServerBuilder::new()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("master should bind");
    let master_addr = server
        .local_addr()
        .expect("local addr")
        .to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    tracing::info!(%master_addr, "master is up");

    // 2. Agent whose room executable is this very binary.
    let agent = SpawnerAgent::connect(AgentConfig {
        master_addr: master_addr.clone(),
        executable: std::env::current_exe().expect("own path"),
        max_processes: 2,
        ..AgentConfig::default()
    })
    .await
    .expect("agent should register");
    tracing::info!(spawner_id = %agent.spawner_id(), "agent is up");
    tokio::spawn(async move {
        let _ = agent.run().await;
    });

    // 3. Client: request a spawn and follow it to the finish line.
    let conn = masterforge_transport::connect(&master_addr)
        .await
        .expect("client connect");
    let (client, mut inbound) =
        attach(conn, PeerId(0), PeerConfig::default(), JsonCodec);

    let mut options = HashMap::new();
    options.insert(prop_keys::ROOM_NAME.to_string(), "arena".into());
    options.insert(prop_keys::SCENE_NAME.to_string(), "arena".into());
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            CODEC
                .encode(&ClientSpawnRequest {
                    options,
                    region: String::new(),
                    custom_args: String::new(),
                })
                .expect("encode"),
        )
        .await;
    assert!(
        response.status.is_success(),
        "spawn request refused: {}",
        response.reason()
    );
    let spawn_id: SpawnId =
        CODEC.decode(&response.body).expect("spawn id");
    tracing::info!(%spawn_id, "spawn requested");

    // 4. Watch status pushes until the task finalizes.
    loop {
        let msg = tokio::time::timeout(
            Duration::from_secs(30),
            inbound.recv(),
        )
        .await
        .expect("status updates should keep coming")
        .expect("master connection open");
        if OpCode::from_u16(msg.op) != Some(OpCode::SpawnStatusUpdate) {
            continue;
        }
        let update: SpawnStatusUpdate =
            CODEC.decode(&msg.body).expect("decode update");
        tracing::info!(status = %update.status, "spawn status");
        match update.status {
            SpawnStatus::Finalized => break,
            SpawnStatus::Aborted | SpawnStatus::Killed => {
                tracing::error!("spawn died early");
                std::process::exit(1);
            }
            _ => {}
        }
    }

    // 5. The finalization payload names the room the child registered.
    let response = client
        .request(
            OpCode::GetSpawnFinalizationData,
            CODEC.encode(&spawn_id).expect("encode"),
        )
        .await;
    assert!(response.status.is_success());
    let data: HashMap<String, String> =
        CODEC.decode(&response.body).expect("finalization");
    let room_id = RoomId(
        data.get("roomId")
            .expect("child reports its room id")
            .parse()
            .expect("numeric room id"),
    );
    tracing::info!(%room_id, "room is registered");

    // 6. Ask for access the way a game client would.
    let response = client
        .request(
            OpCode::GetRoomAccess,
            CODEC
                .encode(&RoomAccessRequest {
                    room_id,
                    password: String::new(),
                    properties: HashMap::new(),
                })
                .expect("encode"),
        )
        .await;
    assert!(
        response.status.is_success(),
        "access refused: {}",
        response.reason()
    );
    let access: RoomAccessPacket =
        CODEC.decode(&response.body).expect("access packet");
    tracing::info!(
        address = format!("{}:{}", access.room_ip, access.room_port),
        token = %access.token,
        "access granted; a game client would connect with this token"
    );

    std::process::exit(0);
}

// ---------------------------------------------------------------------------
// The spawned room process
// ---------------------------------------------------------------------------

/// What the child does with the arguments the agent composed for it.
async fn room_process_main(args: &[String]) {
    let master_addr =
        arg_value(args, "--master-addr").expect("--master-addr");
    let machine_ip =
        arg_value(args, "--machine-ip").expect("--machine-ip");
    let room_port: u16 = arg_value(args, "--room-port")
        .expect("--room-port")
        .parse()
        .expect("numeric port");
    let spawn_id = SpawnId(
        arg_value(args, "--spawn-id")
            .expect("--spawn-id")
            .parse()
            .expect("numeric spawn id"),
    );
    let spawn_code =
        arg_value(args, "--spawn-code").expect("--spawn-code");
    let scene =
        arg_value(args, "--scene").unwrap_or_else(|| "default".into());

    let conn = masterforge_transport::connect(&master_addr)
        .await
        .expect("room connect");
    let (master, inbound) =
        attach(conn, PeerId(0), PeerConfig::default(), JsonCodec);

    // Claim the spawn task; the response carries our configuration.
    let response = master
        .request(
            OpCode::RegisterSpawnedProcess,
            CODEC
                .encode(&RegisterSpawnedProcess {
                    spawn_id,
                    unique_code: spawn_code,
                })
                .expect("encode"),
        )
        .await;
    assert!(
        response.status.is_success(),
        "task claim refused: {}",
        response.reason()
    );
    let properties: HashMap<String, String> =
        CODEC.decode(&response.body).expect("task properties");
    let room_name = properties
        .get(prop_keys::ROOM_NAME)
        .cloned()
        .unwrap_or_else(|| "Unnamed".into());

    // Register as a room.
    let response = master
        .request(
            OpCode::RegisterRoom,
            CODEC
                .encode(&RoomOptions {
                    name: room_name,
                    room_ip: machine_ip.clone(),
                    room_port,
                    max_connections: 16,
                    ..RoomOptions::default()
                })
                .expect("encode"),
        )
        .await;
    assert!(response.status.is_success());
    let room_id: RoomId =
        CODEC.decode(&response.body).expect("room id");
    tracing::info!(%room_id, %scene, "room registered with master");

    // Report completion; the requester learns our room id.
    let mut data = HashMap::new();
    data.insert("roomId".to_string(), room_id.0.to_string());
    let response = master
        .request(
            OpCode::CompleteSpawnProcess,
            CODEC
                .encode(&SpawnFinalization { spawn_id, data })
                .expect("encode"),
        )
        .await;
    assert!(response.status.is_success());

    // Serve access checks until the master goes away.
    serve_room(master, inbound, room_id, machine_ip, room_port).await;
}

/// Approves every access check and validates nothing (the demo has no
/// real game socket for players to arrive on).
async fn serve_room(
    master: Peer,
    mut inbound: mpsc::UnboundedReceiver<IncomingMessage>,
    room_id: RoomId,
    room_ip: String,
    room_port: u16,
) {
    while let Some(msg) = inbound.recv().await {
        if OpCode::from_u16(msg.op)
            != Some(OpCode::ProvideRoomAccessCheck)
        {
            continue;
        }
        let check: RoomAccessCheck =
            CODEC.decode(&msg.body).expect("decode check");
        tracing::info!(
            peer_id = %check.peer_id,
            "approving access request"
        );
        let access = RoomAccessPacket {
            room_ip: room_ip.clone(),
            room_port,
            token: generate_access_token(),
            room_id,
            scene_name: "arena".to_string(),
            properties: HashMap::new(),
        };
        let _ = msg.respond(
            ResponseStatus::Success,
            CODEC.encode(&access).expect("encode access"),
        );
    }
    drop(master);
    tracing::info!("master gone, room process exiting");
}
