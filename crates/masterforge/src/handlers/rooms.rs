//! Handlers for room operations.
//!
//! Authorization rule for every room-mutating request: the sender must
//! be the room's owner peer. Clients only ever touch `GetRoomAccess`
//! and `ListGames`.

use std::sync::Arc;

use masterforge_peer::{IncomingMessage, Peer};
use masterforge_protocol::{
    Codec, JsonCodec, OpCode, ResponseStatus, RoomAccessPacket,
    RoomAccessRequest, RoomAccessValidate, RoomId, RoomOptions,
    PlayerLeft, SaveRoomOptions, UsernameAndPeerId,
};
use masterforge_rooms::{AccessReply, RoomError};

use crate::handlers::HandlerError;
use crate::MasterContext;

const CODEC: JsonCodec = JsonCodec;

/// Guard shared by the owner-only operations.
fn ensure_owner(
    owner: &Peer,
    sender: &Peer,
    room_id: RoomId,
) -> Result<(), HandlerError> {
    if owner.same_peer(sender) {
        Ok(())
    } else {
        Err(RoomError::NotOwner(room_id).into())
    }
}

pub(crate) async fn register_room(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let required = ctx.config.rooms.register_permission_level;
    if msg.peer().permission_level() < required {
        return Err(HandlerError::unauthorized(
            "insufficient permissions to register a room",
        ));
    }

    let options: RoomOptions = CODEC.decode(&msg.body)?;
    let room_id = {
        let mut rooms = ctx.rooms.lock().await;
        rooms.register(msg.peer().clone(), options).id()
    };

    msg.respond(ResponseStatus::Success, CODEC.encode(&room_id)?)?;
    Ok(())
}

pub(crate) async fn destroy_room(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let room_id: RoomId = CODEC.decode(&msg.body)?;

    {
        let mut rooms = ctx.rooms.lock().await;
        let room = rooms.get(room_id)?;
        ensure_owner(room.owner(), msg.peer(), room_id)?;
        rooms.destroy(room_id);
    }

    msg.respond(ResponseStatus::Success, Vec::new())?;
    Ok(())
}

pub(crate) async fn save_room_options(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: SaveRoomOptions = CODEC.decode(&msg.body)?;

    {
        let mut rooms = ctx.rooms.lock().await;
        let room = rooms.get_mut(request.room_id)?;
        ensure_owner(room.owner(), msg.peer(), request.room_id)?;
        room.change_options(request.options);
    }

    msg.respond(ResponseStatus::Success, Vec::new())?;
    Ok(())
}

/// The client → master → room-owner → master → client access handshake.
///
/// The registry lock is held for the admission checks, dropped for the
/// owner round trip, and re-taken to store (or abandon) the outcome —
/// the pending slot reserved by `begin_access` is the only thing that
/// survives in between, and it is always released on failure.
pub(crate) async fn get_room_access(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: RoomAccessRequest = CODEC.decode(&msg.body)?;
    let peer = msg.peer().clone();

    let (check, owner, timeout) = {
        let mut rooms = ctx.rooms.lock().await;
        let timeout = rooms.config().access_check_timeout;
        let room = rooms.get_mut(request.room_id)?;

        let options = room.options();
        if !options.password.is_empty()
            && options.password != request.password
        {
            return Err(RoomError::WrongPassword.into());
        }
        if !options.allow_direct_access {
            return Err(
                RoomError::DirectAccessDisabled(request.room_id).into()
            );
        }

        match room.begin_access(&peer, request.properties)? {
            AccessReply::Existing(access) => {
                // Unclaimed retry: same token again, expiry refreshed.
                msg.respond(
                    ResponseStatus::Success,
                    CODEC.encode(&access)?,
                )?;
                return Ok(());
            }
            AccessReply::CheckRequired(check) => {
                (check, room.owner().clone(), timeout)
            }
        }
    };

    // Round trip to the room's access provider, lock released.
    let response = owner
        .request_with_timeout(
            OpCode::ProvideRoomAccessCheck,
            CODEC.encode(&check)?,
            timeout,
        )
        .await;

    let outcome: Result<RoomAccessPacket, HandlerError> =
        if response.status.is_success() {
            CODEC
                .decode(&response.body)
                .map_err(HandlerError::from)
        } else {
            // Surface the provider's own reason; keep the synthetic
            // statuses (Timeout, NotConnected) recognizable.
            let status = match response.status {
                ResponseStatus::Timeout => ResponseStatus::Timeout,
                ResponseStatus::NotConnected => {
                    ResponseStatus::NotConnected
                }
                _ => ResponseStatus::Unauthorized,
            };
            Err(HandlerError {
                status,
                reason: response.reason(),
            })
        };

    let mut rooms = ctx.rooms.lock().await;
    match outcome {
        Ok(access) => {
            let Ok(room) = rooms.get_mut(request.room_id) else {
                // Room died during the round trip; the token is useless.
                return Err(RoomError::NotFound(request.room_id).into());
            };
            room.grant_access(peer, access.clone());
            drop(rooms);
            msg.respond(
                ResponseStatus::Success,
                CODEC.encode(&access)?,
            )?;
            Ok(())
        }
        Err(e) => {
            if let Ok(room) = rooms.get_mut(request.room_id) {
                room.abort_access(peer.id());
            }
            Err(e)
        }
    }
}

pub(crate) async fn validate_room_access(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: RoomAccessValidate = CODEC.decode(&msg.body)?;

    let player = {
        let mut rooms = ctx.rooms.lock().await;
        let room = rooms.get_mut(request.room_id)?;
        ensure_owner(room.owner(), msg.peer(), request.room_id)?;
        room.validate_access(&request.token)?
    };

    let reply = UsernameAndPeerId {
        peer_id: player.id(),
        username: player.username(),
    };
    msg.respond(ResponseStatus::Success, CODEC.encode(&reply)?)?;
    Ok(())
}

pub(crate) async fn player_left_room(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: PlayerLeft = CODEC.decode(&msg.body)?;

    {
        let mut rooms = ctx.rooms.lock().await;
        let room = rooms.get_mut(request.room_id)?;
        ensure_owner(room.owner(), msg.peer(), request.room_id)?;
        room.player_left(request.peer_id);
    }

    msg.respond(ResponseStatus::Success, Vec::new())?;
    Ok(())
}

pub(crate) async fn list_games(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let games = ctx.rooms.lock().await.public_games();
    msg.respond(ResponseStatus::Success, CODEC.encode(&games)?)?;
    Ok(())
}
