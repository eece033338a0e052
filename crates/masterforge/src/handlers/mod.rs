//! Protocol dispatch: wire operations → registry calls.
//!
//! Every inbound request crosses one boundary here: the handler either
//! responds with Success itself, or returns a [`HandlerError`] that the
//! dispatcher turns into a failure response with a human-readable
//! reason. A malformed or unexpected request can never take the
//! connection loop down with it.

mod rooms;
mod spawners;

use std::sync::Arc;

use masterforge_peer::IncomingMessage;
use masterforge_protocol::{
    Codec, JsonCodec, OpCode, ProtocolError, ResponseStatus,
    SpawnStatusUpdate,
};
use masterforge_rooms::RoomError;
use masterforge_spawner::{SpawnerError, StatusNotice};

use crate::MasterContext;

/// A handler outcome the dispatcher reports to the requesting peer.
pub(crate) struct HandlerError {
    pub status: ResponseStatus,
    pub reason: String,
}

impl HandlerError {
    fn new(status: ResponseStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    pub(crate) fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Unauthorized, reason)
    }

    fn not_handled() -> Self {
        Self::new(
            ResponseStatus::NotHandled,
            "no handler for this operation",
        )
    }
}

impl From<RoomError> for HandlerError {
    fn from(e: RoomError) -> Self {
        let status = match &e {
            RoomError::NotOwner(_)
            | RoomError::WrongPassword
            | RoomError::DirectAccessDisabled(_)
            | RoomError::UnknownToken
            | RoomError::TokenHolderGone => ResponseStatus::Unauthorized,
            RoomError::NotFound(_)
            | RoomError::AlreadyRequested(_)
            | RoomError::AlreadyInRoom(_)
            | RoomError::RoomFull(_) => ResponseStatus::Failed,
        };
        Self::new(status, e.to_string())
    }
}

impl From<SpawnerError> for HandlerError {
    fn from(e: SpawnerError) -> Self {
        let status = match &e {
            SpawnerError::ClientSpawnDisabled
            | SpawnerError::CodeMismatch(_)
            | SpawnerError::NotRequester(_)
            | SpawnerError::NotRegisteredPeer(_) => {
                ResponseStatus::Unauthorized
            }
            SpawnerError::SpawnerNotFound(_)
            | SpawnerError::TaskNotFound(_)
            | SpawnerError::NoCapacity
            | SpawnerError::AlreadyActiveRequest(_)
            | SpawnerError::CannotAbortFinalized(_)
            | SpawnerError::NoFinalizationData(_)
            | SpawnerError::InvalidTransition { .. } => {
                ResponseStatus::Failed
            }
        };
        Self::new(status, e.to_string())
    }
}

impl From<ProtocolError> for HandlerError {
    fn from(e: ProtocolError) -> Self {
        // A payload the master can't decode is the caller's bug, but
        // it's surfaced as an Error response rather than a dropped
        // connection.
        Self::new(ResponseStatus::Error, e.to_string())
    }
}

impl From<masterforge_peer::PeerError> for HandlerError {
    fn from(e: masterforge_peer::PeerError) -> Self {
        // Failing to answer a peer that's already gone isn't reported
        // anywhere useful, but the mapping keeps `?` uniform.
        Self::new(ResponseStatus::NotConnected, e.to_string())
    }
}

/// Routes one inbound message to its handler and reports failures back
/// to the sender.
pub(crate) async fn dispatch(
    ctx: &Arc<MasterContext>,
    msg: IncomingMessage,
) {
    let op = OpCode::from_u16(msg.op);
    let result = match op {
        Some(OpCode::RegisterRoom) => {
            rooms::register_room(ctx, &msg).await
        }
        Some(OpCode::DestroyRoom) => rooms::destroy_room(ctx, &msg).await,
        Some(OpCode::SaveRoomOptions) => {
            rooms::save_room_options(ctx, &msg).await
        }
        Some(OpCode::GetRoomAccess) => {
            rooms::get_room_access(ctx, &msg).await
        }
        Some(OpCode::ValidateRoomAccess) => {
            rooms::validate_room_access(ctx, &msg).await
        }
        Some(OpCode::PlayerLeftRoom) => {
            rooms::player_left_room(ctx, &msg).await
        }
        Some(OpCode::ListGames) => rooms::list_games(ctx, &msg).await,
        Some(OpCode::RegisterSpawner) => {
            spawners::register_spawner(ctx, &msg).await
        }
        Some(OpCode::ClientSpawnRequest) => {
            spawners::client_spawn_request(ctx, &msg).await
        }
        Some(OpCode::AbortSpawnRequest) => {
            spawners::abort_spawn_request(ctx, &msg).await
        }
        Some(OpCode::RegisterSpawnedProcess) => {
            spawners::register_spawned_process(ctx, &msg).await
        }
        Some(OpCode::CompleteSpawnProcess) => {
            spawners::complete_spawn_process(ctx, &msg).await
        }
        Some(OpCode::ProcessStarted) => {
            spawners::process_started(ctx, &msg).await
        }
        Some(OpCode::ProcessKilled) => {
            spawners::process_killed(ctx, &msg).await
        }
        Some(OpCode::GetSpawnFinalizationData) => {
            spawners::get_spawn_finalization_data(ctx, &msg).await
        }
        // Master→peer operations arriving inbound, or ops from a newer
        // protocol revision.
        _ => Err(HandlerError::not_handled()),
    };

    if let Err(e) = result {
        tracing::debug!(
            peer_id = %msg.peer().id(),
            op = msg.op,
            status = %e.status,
            reason = %e.reason,
            "request refused"
        );
        if let Err(send_err) =
            msg.respond_with_reason(e.status, &e.reason)
        {
            tracing::debug!(
                peer_id = %msg.peer().id(),
                error = %send_err,
                "could not deliver failure response"
            );
        }
    }
}

/// Pushes a spawn-status change to the task's requester. Best-effort:
/// a requester that went away just misses the update.
pub(crate) fn push_status(notice: &StatusNotice) {
    let codec = JsonCodec;
    let update = SpawnStatusUpdate {
        spawn_id: notice.spawn_id,
        status: notice.status,
    };
    let body = match codec.encode(&update) {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode status update");
            return;
        }
    };
    if notice
        .requester
        .notify(OpCode::SpawnStatusUpdate, body)
        .is_err()
    {
        tracing::debug!(
            spawn_id = %notice.spawn_id,
            "requester gone, status update dropped"
        );
    }
}
