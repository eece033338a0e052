//! Request/response packet bodies.
//!
//! Packets are plain serde structs encoded with the session's [`Codec`]
//! and carried as the `body` of a [`Frame`]. Field sets mirror what the
//! master and its collaborators actually need — nothing speculative.
//!
//! [`Codec`]: crate::Codec
//! [`Frame`]: crate::Frame

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{PeerId, RoomId, SpawnId, SpawnerId};

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

/// Options a room process sends when registering with the master.
///
/// Replaced wholesale by `SaveRoomOptions`; the master never edits
/// individual fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomOptions {
    /// Display name of the room.
    pub name: String,
    /// Address players should connect to directly.
    pub room_ip: String,
    pub room_port: u16,
    /// Whether the room appears in public listings.
    pub is_public: bool,
    /// Player limit. 0 = unlimited.
    pub max_connections: u32,
    /// Room password. Empty = none.
    pub password: String,
    /// Seconds an unclaimed access token stays valid. Keep it long enough
    /// for a client to load the gameplay scene and connect.
    pub access_timeout_secs: u64,
    /// If false, clients can't request access directly; tokens must come
    /// through some other flow (matchmaking, invites).
    pub allow_direct_access: bool,
    /// Free-form properties, advertised with public listings.
    pub properties: HashMap<String, String>,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            name: "Unnamed".to_string(),
            room_ip: String::new(),
            room_port: 0,
            is_public: true,
            max_connections: 0,
            password: String::new(),
            access_timeout_secs: 10,
            allow_direct_access: true,
            properties: HashMap::new(),
        }
    }
}

/// The credential a client presents to a room when connecting directly.
///
/// Minted by the room's access provider, relayed by the master, and
/// consumed exactly once by `ValidateRoomAccess`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAccessPacket {
    pub room_ip: String,
    pub room_port: u16,
    /// The single-use token itself.
    pub token: String,
    pub room_id: RoomId,
    /// Scene/map the client should load before connecting.
    pub scene_name: String,
    pub properties: HashMap<String, String>,
}

impl fmt::Display for RoomAccessPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[access {} {}:{} token {}]",
            self.room_id, self.room_ip, self.room_port, self.token
        )
    }
}

/// Client → master: request access to a room.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomAccessRequest {
    pub room_id: RoomId,
    pub password: String,
    pub properties: HashMap<String, String>,
}

/// Master → room owner: should this peer be let in?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAccessCheck {
    pub peer_id: PeerId,
    pub room_id: RoomId,
    pub username: Option<String>,
    /// Extra properties the requester attached (team preference, party
    /// id, ...); the access provider may use them when deciding.
    pub properties: HashMap<String, String>,
}

/// Room → master: consume an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomAccessValidate {
    pub room_id: RoomId,
    pub token: String,
}

/// Master → room: who the validated token belonged to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsernameAndPeerId {
    pub peer_id: PeerId,
    pub username: Option<String>,
}

/// Room owner → master: replace a room's options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRoomOptions {
    pub room_id: RoomId,
    pub options: RoomOptions,
}

/// Room → master: a player left the room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub room_id: RoomId,
    pub peer_id: PeerId,
}

/// One public room in a `ListGames` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameInfo {
    pub room_id: RoomId,
    pub name: String,
    /// "ip:port" the room advertises.
    pub address: String,
    pub online_players: u32,
    pub max_players: u32,
    pub password_protected: bool,
    pub properties: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Spawners
// ---------------------------------------------------------------------------

/// Options a spawner agent sends when registering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnerOptions {
    /// Region tag used to filter spawn requests. Empty = any.
    pub region: String,
    /// Max concurrent processes this agent will run. 0 = unlimited.
    pub max_processes: u32,
    /// Publicly visible IP of the agent's machine, advertised to rooms
    /// it spawns.
    pub machine_ip: String,
}

impl Default for SpawnerOptions {
    fn default() -> Self {
        Self {
            region: String::new(),
            max_processes: 5,
            machine_ip: "127.0.0.1".to_string(),
        }
    }
}

/// Client → master: spawn a room somewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientSpawnRequest {
    /// Free-form options for the spawned process (room name, scene, ...).
    pub options: HashMap<String, String>,
    /// Preferred region. Empty = any.
    pub region: String,
    /// Extra command-line arguments, appended after all framework args.
    pub custom_args: String,
}

/// Master → spawner agent: launch a process for this task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    pub spawner_id: SpawnerId,
    pub spawn_id: SpawnId,
    /// The task's secret. The spawned process must present it when it
    /// registers back, proving it is the legitimate child of this task.
    pub unique_code: String,
    pub custom_args: String,
    pub properties: HashMap<String, String>,
}

/// Master → spawner agent: kill the process of a spawn task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KillSpawn {
    pub spawner_id: SpawnerId,
    pub spawn_id: SpawnId,
}

/// Spawned process → master: claim a spawn task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterSpawnedProcess {
    pub spawn_id: SpawnId,
    pub unique_code: String,
}

/// Spawned process → master: the task finished setting up; here's what
/// the original requester needs to know (connection details, etc).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnFinalization {
    pub spawn_id: SpawnId,
    pub data: HashMap<String, String>,
}

/// Master → requesting client push: a spawn task changed status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnStatusUpdate {
    pub spawn_id: SpawnId,
    pub status: SpawnStatus,
}

/// Well-known keys used in free-form property maps.
pub mod prop_keys {
    /// Display name the spawned room should register under.
    pub const ROOM_NAME: &str = "roomName";
    /// Scene/map the spawned process should load.
    pub const SCENE_NAME: &str = "sceneName";
}

// ---------------------------------------------------------------------------
// Spawn status
// ---------------------------------------------------------------------------

/// Lifecycle status of a spawn task.
///
/// The declaration order IS the wire ordering (derived `Ord`):
///
/// ```text
/// Killed < Aborted < None < Queued < ProcessRequested
///        < ProcessStarted < ProcessRegistered < Finalized
/// ```
///
/// A task only ever moves to a strictly greater status, except that
/// `Aborted`/`Killed` are reachable from any non-terminal status. Nothing
/// follows a terminal status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "PascalCase")]
pub enum SpawnStatus {
    /// The OS process died (or was killed) before finalizing. Terminal.
    Killed,
    /// The requester (or a cascade) gave up on the task. Terminal.
    Aborted,
    /// Created but not yet queued. Transient.
    None,
    /// Waiting in a spawner's queue.
    Queued,
    /// The spawn command was sent to the agent.
    ProcessRequested,
    /// The agent reported the OS process is up.
    ProcessStarted,
    /// The spawned process called back with the matching unique code.
    ProcessRegistered,
    /// The spawned process delivered its finalization payload. Terminal.
    Finalized,
}

impl SpawnStatus {
    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Killed | Self::Aborted | Self::Finalized)
    }

    /// `true` once the task can no longer be considered "starting up" —
    /// used to decide whether a peer may file a new spawn request.
    pub fn is_done_starting(&self) -> bool {
        self.is_terminal() || *self >= Self::ProcessRegistered
    }
}

impl fmt::Display for SpawnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
