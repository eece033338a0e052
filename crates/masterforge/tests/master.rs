//! Integration tests for the master server: real sockets, real peers,
//! the full room-access handshake and spawn-task lifecycle.

use std::collections::HashMap;
use std::time::Duration;

use masterforge::prelude::*;
use masterforge_peer::{attach, IncomingMessage, Response};
use masterforge_protocol::{
    prop_keys, ClientSpawnRequest, GameInfo, KillSpawn, PlayerLeft,
    RegisterSpawnedProcess, RoomAccessCheck, RoomAccessPacket,
    RoomAccessRequest, RoomAccessValidate, SpawnFinalization,
    SpawnRequest, SpawnStatusUpdate, UsernameAndPeerId,
};
use masterforge_rooms::generate_access_token;
use tokio::sync::mpsc;

const CODEC: JsonCodec = JsonCodec;

// =========================================================================
// Harness
// =========================================================================

/// One connected test participant (client, room process, or agent).
struct TestPeer {
    peer: Peer,
    inbound: mpsc::UnboundedReceiver<IncomingMessage>,
}

impl TestPeer {
    async fn connect(addr: &str) -> Self {
        let conn = masterforge_transport::connect(addr)
            .await
            .expect("should connect");
        let (peer, inbound) = attach(
            conn,
            PeerId(0),
            PeerConfig {
                sweep_interval: Duration::from_millis(50),
                ..PeerConfig::default()
            },
            JsonCodec,
        );
        Self { peer, inbound }
    }

    async fn request<T: serde::Serialize>(
        &self,
        op: OpCode,
        body: &T,
    ) -> Response {
        let body = CODEC.encode(body).expect("encode");
        self.peer.request(op, body).await
    }

    /// Waits for the next inbound message, skipping nothing.
    async fn next_message(&mut self) -> IncomingMessage {
        tokio::time::timeout(
            Duration::from_secs(5),
            self.inbound.recv(),
        )
        .await
        .expect("inbound message should arrive")
        .expect("stream open")
    }

    /// Waits for the next spawn-status push and returns it.
    async fn next_status_push(&mut self) -> SpawnStatusUpdate {
        loop {
            let msg = self.next_message().await;
            if OpCode::from_u16(msg.op)
                == Some(OpCode::SpawnStatusUpdate)
            {
                return CODEC.decode(&msg.body).expect("decode push");
            }
        }
    }
}

/// Starts a master on a random port and returns its address.
async fn start_master() -> String {
    start_master_with(MasterServerBuilder::new()).await
}

async fn start_master_with(builder: MasterServerBuilder) -> String {
    let server = builder
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("master should build");
    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// Registers a room owned by `owner` and returns its id.
async fn register_room(owner: &TestPeer, options: RoomOptions) -> RoomId {
    let response = owner.request(OpCode::RegisterRoom, &options).await;
    assert_eq!(response.status, ResponseStatus::Success);
    CODEC.decode(&response.body).expect("room id")
}

/// Runs a default access provider on the room owner's inbound stream:
/// approves every check, minting a fresh token each time.
fn serve_access_provider(
    mut inbound: mpsc::UnboundedReceiver<IncomingMessage>,
    room_ip: &str,
    room_port: u16,
) -> tokio::task::JoinHandle<()> {
    let room_ip = room_ip.to_string();
    tokio::spawn(async move {
        while let Some(msg) = inbound.recv().await {
            if OpCode::from_u16(msg.op)
                != Some(OpCode::ProvideRoomAccessCheck)
            {
                continue;
            }
            let check: RoomAccessCheck =
                CODEC.decode(&msg.body).expect("decode check");
            let access = RoomAccessPacket {
                room_ip: room_ip.clone(),
                room_port,
                token: generate_access_token(),
                room_id: check.room_id,
                scene_name: "arena".to_string(),
                properties: HashMap::new(),
            };
            msg.respond(
                ResponseStatus::Success,
                CODEC.encode(&access).expect("encode access"),
            )
            .expect("respond");
        }
    })
}

/// A fake spawner agent: accepts spawn commands, reports processes
/// started, forwards the spawn codes it sees, and acknowledges kills.
fn serve_agent(
    mut inbound: mpsc::UnboundedReceiver<IncomingMessage>,
) -> (
    mpsc::UnboundedReceiver<SpawnRequest>,
    mpsc::UnboundedReceiver<KillSpawn>,
    tokio::task::JoinHandle<()>,
) {
    let (spawn_tx, spawn_rx) = mpsc::unbounded_channel();
    let (kill_tx, kill_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        while let Some(msg) = inbound.recv().await {
            match OpCode::from_u16(msg.op) {
                Some(OpCode::SpawnProcessRequest) => {
                    let request: SpawnRequest =
                        CODEC.decode(&msg.body).expect("decode spawn");
                    msg.respond(ResponseStatus::Success, Vec::new())
                        .expect("ack spawn");
                    msg.peer()
                        .notify(
                            OpCode::ProcessStarted,
                            CODEC
                                .encode(&request.spawn_id)
                                .expect("encode"),
                        )
                        .expect("notify started");
                    let _ = spawn_tx.send(request);
                }
                Some(OpCode::KillProcessRequest) => {
                    let request: KillSpawn =
                        CODEC.decode(&msg.body).expect("decode kill");
                    msg.respond(ResponseStatus::Success, Vec::new())
                        .expect("ack kill");
                    msg.peer()
                        .notify(
                            OpCode::ProcessKilled,
                            CODEC
                                .encode(&request.spawn_id)
                                .expect("encode"),
                        )
                        .expect("notify killed");
                    let _ = kill_tx.send(request);
                }
                _ => {}
            }
        }
    });
    (spawn_rx, kill_rx, handle)
}

fn room_options(max_connections: u32) -> RoomOptions {
    RoomOptions {
        name: "arena".to_string(),
        room_ip: "10.0.0.5".to_string(),
        room_port: 7777,
        max_connections,
        ..RoomOptions::default()
    }
}

// =========================================================================
// Room access
// =========================================================================

#[tokio::test]
async fn test_room_access_full_handshake() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    let room_id = register_room(&owner, room_options(0)).await;
    let _provider =
        serve_access_provider(owner.inbound, "10.0.0.5", 7777);

    // Player asks for access; the provider approves.
    let player = TestPeer::connect(&addr).await;
    let response = player
        .request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id,
                password: String::new(),
                properties: HashMap::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let access: RoomAccessPacket =
        CODEC.decode(&response.body).expect("access packet");
    assert_eq!(access.room_id, room_id);
    assert_eq!(access.room_ip, "10.0.0.5");
    assert!(!access.token.is_empty());

    // The room validates the token with the master (once).
    let response = owner
        .peer
        .request(
            OpCode::ValidateRoomAccess,
            CODEC
                .encode(&RoomAccessValidate {
                    room_id,
                    token: access.token.clone(),
                })
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let who: UsernameAndPeerId =
        CODEC.decode(&response.body).expect("identity");
    assert!(who.peer_id.0 > 0);

    // Second validation of the same token must fail: single use.
    let response = owner
        .peer
        .request(
            OpCode::ValidateRoomAccess,
            CODEC
                .encode(&RoomAccessValidate {
                    room_id,
                    token: access.token.clone(),
                })
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);

    // The room reports the player gone; the slot frees.
    let response = owner
        .peer
        .request(
            OpCode::PlayerLeftRoom,
            CODEC
                .encode(&PlayerLeft {
                    room_id,
                    peer_id: who.peer_id,
                })
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
}

#[tokio::test]
async fn test_room_capacity_one_slot() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    let room_id = register_room(&owner, room_options(1)).await;
    let _provider =
        serve_access_provider(owner.inbound, "10.0.0.5", 7777);

    let player_a = TestPeer::connect(&addr).await;
    let player_b = TestPeer::connect(&addr).await;

    let request = RoomAccessRequest {
        room_id,
        password: String::new(),
        properties: HashMap::new(),
    };

    // A takes the only slot (as an unconfirmed access).
    let response =
        player_a.request(OpCode::GetRoomAccess, &request).await;
    assert_eq!(response.status, ResponseStatus::Success);
    let access_a: RoomAccessPacket =
        CODEC.decode(&response.body).unwrap();

    // B is refused while A's access is unclaimed.
    let response =
        player_b.request(OpCode::GetRoomAccess, &request).await;
    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(response.reason().contains("full"));

    // A claims the slot for real.
    let response = owner
        .peer
        .request(
            OpCode::ValidateRoomAccess,
            CODEC
                .encode(&RoomAccessValidate {
                    room_id,
                    token: access_a.token,
                })
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);

    // B is still refused: the slot is now an active access.
    let response =
        player_b.request(OpCode::GetRoomAccess, &request).await;
    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(response.reason().contains("full"));
}

#[tokio::test]
async fn test_access_retry_returns_same_token() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    let room_id = register_room(&owner, room_options(0)).await;
    let _provider =
        serve_access_provider(owner.inbound, "10.0.0.5", 7777);

    let player = TestPeer::connect(&addr).await;
    let request = RoomAccessRequest {
        room_id,
        password: String::new(),
        properties: HashMap::new(),
    };

    let first = player.request(OpCode::GetRoomAccess, &request).await;
    assert_eq!(first.status, ResponseStatus::Success);
    let first: RoomAccessPacket = CODEC.decode(&first.body).unwrap();

    let second = player.request(OpCode::GetRoomAccess, &request).await;
    assert_eq!(second.status, ResponseStatus::Success);
    let second: RoomAccessPacket = CODEC.decode(&second.body).unwrap();

    assert_eq!(
        first.token, second.token,
        "an unclaimed access is handed back, not re-minted"
    );
}

#[tokio::test]
async fn test_access_denied_paths() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    let locked = register_room(
        &owner,
        RoomOptions {
            password: "hunter2".to_string(),
            ..room_options(0)
        },
    )
    .await;
    let sealed = register_room(
        &owner,
        RoomOptions {
            allow_direct_access: false,
            ..room_options(0)
        },
    )
    .await;

    let player = TestPeer::connect(&addr).await;

    // Wrong password.
    let response = player
        .request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id: locked,
                password: "wrong".to_string(),
                properties: HashMap::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);

    // Direct access disabled.
    let response = player
        .request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id: sealed,
                password: String::new(),
                properties: HashMap::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);

    // Unknown room.
    let response = player
        .request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id: RoomId(999),
                password: String::new(),
                properties: HashMap::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Failed);
}

#[tokio::test]
async fn test_access_provider_timeout() {
    // The owner never answers access checks; the client gets a Timeout
    // after the (shortened) check deadline instead of hanging.
    let addr = start_master_with(
        MasterServerBuilder::new()
            .rooms_config(RoomsConfig {
                access_check_timeout: Duration::from_millis(200),
                ..RoomsConfig::default()
            })
            .peer_config(PeerConfig {
                sweep_interval: Duration::from_millis(50),
                ..PeerConfig::default()
            }),
    )
    .await;

    let mut owner = TestPeer::connect(&addr).await;
    let room_id = register_room(&owner, room_options(0)).await;
    // Swallow the check without answering.
    tokio::spawn(async move {
        while owner.inbound.recv().await.is_some() {}
    });

    let player = TestPeer::connect(&addr).await;
    let response = tokio::time::timeout(
        Duration::from_secs(5),
        player.request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id,
                password: String::new(),
                properties: HashMap::new(),
            },
        ),
    )
    .await
    .expect("must not hang");
    assert_eq!(response.status, ResponseStatus::Timeout);

    // The pending slot was released: a retry reaches the provider
    // again (and times out again, rather than "already requested").
    let response = player
        .request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id,
                password: String::new(),
                properties: HashMap::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Timeout);
}

#[tokio::test]
async fn test_room_mutations_require_owner() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    let room_id = register_room(&owner, room_options(0)).await;

    let stranger = TestPeer::connect(&addr).await;

    let response =
        stranger.request(OpCode::DestroyRoom, &room_id).await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);

    let response = stranger
        .request(
            OpCode::ValidateRoomAccess,
            &RoomAccessValidate {
                room_id,
                token: "whatever".to_string(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);

    // The rightful owner can destroy.
    let response = owner.request(OpCode::DestroyRoom, &room_id).await;
    assert_eq!(response.status, ResponseStatus::Success);
}

#[tokio::test]
async fn test_owner_disconnect_destroys_all_its_rooms() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    let a = register_room(&owner, room_options(0)).await;
    let b = register_room(&owner, room_options(0)).await;
    assert_ne!(a, b);

    let observer = TestPeer::connect(&addr).await;
    let response = observer.request(OpCode::ListGames, &()).await;
    let games: Vec<GameInfo> = CODEC.decode(&response.body).unwrap();
    assert_eq!(games.len(), 2);

    // The owner goes away; both rooms must vanish from the index.
    owner.peer.disconnect();
    drop(owner);

    let mut remaining = usize::MAX;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let response = observer.request(OpCode::ListGames, &()).await;
        let games: Vec<GameInfo> =
            CODEC.decode(&response.body).unwrap();
        remaining = games.len();
        if remaining == 0 {
            break;
        }
    }
    assert_eq!(remaining, 0, "cascade must leave no dangling rooms");

    // And access requests against them now fail NotFound-style.
    let response = observer
        .request(
            OpCode::GetRoomAccess,
            &RoomAccessRequest {
                room_id: a,
                password: String::new(),
                properties: HashMap::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Failed);
}

#[tokio::test]
async fn test_list_games_hides_private_rooms() {
    let addr = start_master().await;

    let owner = TestPeer::connect(&addr).await;
    register_room(&owner, room_options(4)).await;
    register_room(
        &owner,
        RoomOptions {
            is_public: false,
            ..room_options(0)
        },
    )
    .await;

    let observer = TestPeer::connect(&addr).await;
    let response = observer.request(OpCode::ListGames, &()).await;
    assert_eq!(response.status, ResponseStatus::Success);
    let games: Vec<GameInfo> = CODEC.decode(&response.body).unwrap();
    assert_eq!(games.len(), 1);
    assert_eq!(games[0].name, "arena");
    assert_eq!(games[0].address, "10.0.0.5:7777");
    assert_eq!(games[0].max_players, 4);
}

// =========================================================================
// Spawn lifecycle
// =========================================================================

#[tokio::test]
async fn test_spawn_lifecycle_end_to_end() {
    let addr = start_master().await;

    // A spawner agent registers.
    let agent = TestPeer::connect(&addr).await;
    let response = agent
        .request(
            OpCode::RegisterSpawner,
            &SpawnerOptions {
                max_processes: 1,
                ..SpawnerOptions::default()
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let _spawner_id: SpawnerId =
        CODEC.decode(&response.body).unwrap();
    let (mut spawn_rx, _kill_rx, _agent_task) =
        serve_agent(agent.inbound);

    // A client requests a spawn.
    let mut client = TestPeer::connect(&addr).await;
    let mut options = HashMap::new();
    options.insert(
        prop_keys::ROOM_NAME.to_string(),
        "arena".to_string(),
    );
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest {
                options,
                region: String::new(),
                custom_args: String::new(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let spawn_id: SpawnId = CODEC.decode(&response.body).unwrap();

    // The queue drains to the agent; the client sees the status climb.
    let push = client.next_status_push().await;
    assert_eq!(push.spawn_id, spawn_id);
    assert_eq!(push.status, SpawnStatus::ProcessRequested);

    let push = client.next_status_push().await;
    assert_eq!(push.status, SpawnStatus::ProcessStarted);

    // The agent actually saw the command, with the secret inside.
    let spawn_request = tokio::time::timeout(
        Duration::from_secs(5),
        spawn_rx.recv(),
    )
    .await
    .expect("agent should receive the spawn command")
    .expect("channel open");
    assert_eq!(spawn_request.spawn_id, spawn_id);
    assert!(!spawn_request.unique_code.is_empty());
    assert_eq!(
        spawn_request
            .properties
            .get(prop_keys::ROOM_NAME)
            .map(String::as_str),
        Some("arena")
    );

    // The spawned process claims the task...
    let process = TestPeer::connect(&addr).await;
    let response = process
        .request(
            OpCode::RegisterSpawnedProcess,
            &RegisterSpawnedProcess {
                spawn_id,
                unique_code: spawn_request.unique_code.clone(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let properties: HashMap<String, String> =
        CODEC.decode(&response.body).unwrap();
    assert_eq!(
        properties.get(prop_keys::ROOM_NAME).map(String::as_str),
        Some("arena")
    );
    let push = client.next_status_push().await;
    assert_eq!(push.status, SpawnStatus::ProcessRegistered);

    // ...and completes it.
    let mut data = HashMap::new();
    data.insert("result".to_string(), "ok".to_string());
    let response = process
        .request(
            OpCode::CompleteSpawnProcess,
            &SpawnFinalization { spawn_id, data },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let push = client.next_status_push().await;
    assert_eq!(push.status, SpawnStatus::Finalized);

    // Only the original requester can read the finalization payload.
    let stranger = TestPeer::connect(&addr).await;
    let response = stranger
        .request(OpCode::GetSpawnFinalizationData, &spawn_id)
        .await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);

    let response = client
        .request(OpCode::GetSpawnFinalizationData, &spawn_id)
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let data: HashMap<String, String> =
        CODEC.decode(&response.body).unwrap();
    assert_eq!(data.get("result").map(String::as_str), Some("ok"));
}

#[tokio::test]
async fn test_spawn_wrong_code_is_rejected() {
    let addr = start_master().await;

    let agent = TestPeer::connect(&addr).await;
    let response = agent
        .request(OpCode::RegisterSpawner, &SpawnerOptions::default())
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let (mut spawn_rx, _kill_rx, _agent_task) =
        serve_agent(agent.inbound);

    let client = TestPeer::connect(&addr).await;
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest::default(),
        )
        .await;
    let spawn_id: SpawnId = CODEC.decode(&response.body).unwrap();

    let _ = tokio::time::timeout(
        Duration::from_secs(5),
        spawn_rx.recv(),
    )
    .await
    .expect("dispatch");

    // A rogue process guessing the task id but not the secret.
    let rogue = TestPeer::connect(&addr).await;
    let response = rogue
        .request(
            OpCode::RegisterSpawnedProcess,
            &RegisterSpawnedProcess {
                spawn_id,
                unique_code: "guessed".to_string(),
            },
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Unauthorized);
}

#[tokio::test]
async fn test_spawn_with_no_spawners_fails_retryably() {
    let addr = start_master().await;

    let client = TestPeer::connect(&addr).await;
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest::default(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(response.reason().contains("busy"));
}

#[tokio::test]
async fn test_abort_spawn_sends_kill_to_agent() {
    let addr = start_master().await;

    let agent = TestPeer::connect(&addr).await;
    let response = agent
        .request(OpCode::RegisterSpawner, &SpawnerOptions::default())
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let (mut spawn_rx, mut kill_rx, _agent_task) =
        serve_agent(agent.inbound);

    let mut client = TestPeer::connect(&addr).await;
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest::default(),
        )
        .await;
    let spawn_id: SpawnId = CODEC.decode(&response.body).unwrap();

    // Wait until the task has been dispatched to the agent.
    let _ = tokio::time::timeout(
        Duration::from_secs(5),
        spawn_rx.recv(),
    )
    .await
    .expect("dispatch");

    let response =
        client.request(OpCode::AbortSpawnRequest, &spawn_id).await;
    assert_eq!(response.status, ResponseStatus::Success);

    // The agent is told to kill the (possibly live) process.
    let kill = tokio::time::timeout(
        Duration::from_secs(5),
        kill_rx.recv(),
    )
    .await
    .expect("kill command should reach the agent")
    .expect("channel open");
    assert_eq!(kill.spawn_id, spawn_id);

    // The requester saw the Aborted push somewhere in the stream.
    let mut saw_aborted = false;
    for _ in 0..4 {
        let push = client.next_status_push().await;
        if push.status == SpawnStatus::Aborted {
            saw_aborted = true;
            break;
        }
    }
    assert!(saw_aborted, "requester must learn about the abort");
}

#[tokio::test]
async fn test_second_spawn_request_while_starting_is_refused() {
    let addr = start_master().await;

    let agent = TestPeer::connect(&addr).await;
    let response = agent
        .request(OpCode::RegisterSpawner, &SpawnerOptions::default())
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let (_spawn_rx, _kill_rx, _agent_task) = serve_agent(agent.inbound);

    let client = TestPeer::connect(&addr).await;
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest::default(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);

    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest::default(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Failed);
    assert!(response.reason().contains("active spawn request"));
}

// =========================================================================
// Real agent
// =========================================================================

#[tokio::test]
async fn test_real_agent_spawns_and_reports_exit() {
    // A real SpawnerAgent launching a real (instantly dying) process:
    // `env` rejects the composed arguments and exits, so the task walks
    // ProcessRequested → ProcessStarted → Killed without any faking.
    let addr = start_master().await;

    let agent = masterforge_agent::SpawnerAgent::connect(
        masterforge_agent::AgentConfig {
            master_addr: addr.clone(),
            executable: "env".into(),
            ..masterforge_agent::AgentConfig::default()
        },
    )
    .await
    .expect("agent should register");
    assert!(agent.spawner_id().0 > 0);
    tokio::spawn(async move {
        let _ = agent.run().await;
    });

    let mut client = TestPeer::connect(&addr).await;
    let response = client
        .request(
            OpCode::ClientSpawnRequest,
            &ClientSpawnRequest::default(),
        )
        .await;
    assert_eq!(response.status, ResponseStatus::Success);
    let spawn_id: SpawnId = CODEC.decode(&response.body).unwrap();

    let push = client.next_status_push().await;
    assert_eq!(push.spawn_id, spawn_id);
    assert_eq!(push.status, SpawnStatus::ProcessRequested);

    let push = client.next_status_push().await;
    assert_eq!(push.status, SpawnStatus::ProcessStarted);

    // The process dies on its own; the agent's ProcessKilled lands as
    // the Killed terminal.
    let push = client.next_status_push().await;
    assert_eq!(push.status, SpawnStatus::Killed);
}

// =========================================================================
// Dispatch boundary
// =========================================================================

#[tokio::test]
async fn test_malformed_payload_gets_error_not_disconnect() {
    let addr = start_master().await;
    let client = TestPeer::connect(&addr).await;

    // RegisterRoom with a payload that isn't RoomOptions.
    let response = client
        .peer
        .request(OpCode::RegisterRoom, b"garbage".to_vec())
        .await;
    assert_eq!(response.status, ResponseStatus::Error);

    // The connection survived; a well-formed request still works.
    let response = client.request(OpCode::ListGames, &()).await;
    assert_eq!(response.status, ResponseStatus::Success);
}

#[tokio::test]
async fn test_unhandled_op_gets_not_handled() {
    let addr = start_master().await;
    let client = TestPeer::connect(&addr).await;

    // SpawnProcessRequest is a master→agent op; the master itself
    // doesn't handle it.
    let response = client
        .peer
        .request(OpCode::SpawnProcessRequest, Vec::new())
        .await;
    assert_eq!(response.status, ResponseStatus::NotHandled);
}
