//! Handlers for spawner operations.
//!
//! Three distinct parties talk to these: clients (spawn request, abort,
//! finalization fetch), spawner agents (registration, process started /
//! killed notifications), and freshly spawned room processes (claiming
//! and completing their task). Authorization is per party: the task's
//! requester, the task's registered process, or the spawner's owner.

use std::sync::Arc;

use masterforge_peer::IncomingMessage;
use masterforge_protocol::{
    ClientSpawnRequest, Codec, JsonCodec, OpCode,
    RegisterSpawnedProcess, ResponseStatus, SpawnFinalization, SpawnId,
    SpawnerOptions,
};
use masterforge_spawner::KillPlan;

use crate::handlers::{push_status, HandlerError};
use crate::MasterContext;

const CODEC: JsonCodec = JsonCodec;

pub(crate) async fn register_spawner(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let required = ctx.config.spawners.create_permission_level;
    if msg.peer().permission_level() < required {
        return Err(HandlerError::unauthorized(
            "insufficient permissions to register a spawner",
        ));
    }

    let options: SpawnerOptions = CODEC.decode(&msg.body)?;
    let spawner_id = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.register(msg.peer().clone(), options).id()
    };

    msg.respond(ResponseStatus::Success, CODEC.encode(&spawner_id)?)?;
    Ok(())
}

pub(crate) async fn client_spawn_request(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: ClientSpawnRequest = CODEC.decode(&msg.body)?;
    tracing::info!(
        peer_id = %msg.peer().id(),
        region = %request.region,
        "client requested a spawn"
    );

    let spawn_id = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.client_spawn(
            msg.peer(),
            request.options,
            &request.region,
            &request.custom_args,
        )?
    };

    msg.respond(ResponseStatus::Success, CODEC.encode(&spawn_id)?)?;
    Ok(())
}

pub(crate) async fn abort_spawn_request(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let spawn_id: SpawnId = CODEC.decode(&msg.body)?;

    let (notice, kill) = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.abort(spawn_id, msg.peer())?
    };

    if let Some(notice) = notice {
        push_status(&notice);
    }
    if let Some(kill) = kill {
        dispatch_kill(kill);
    }

    msg.respond(ResponseStatus::Success, Vec::new())?;
    Ok(())
}

/// Sends a kill command to the agent in the background; the abort
/// response doesn't wait for the process to actually die.
pub(crate) fn dispatch_kill(kill: KillPlan) {
    tokio::spawn(async move {
        let body = match CODEC.encode(&kill.request) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode kill");
                return;
            }
        };
        let response = kill
            .agent
            .request(OpCode::KillProcessRequest, body)
            .await;
        if !response.status.is_success() {
            tracing::warn!(
                spawn_id = %kill.request.spawn_id,
                status = %response.status,
                "kill request refused by agent"
            );
        }
    });
}

pub(crate) async fn register_spawned_process(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: RegisterSpawnedProcess = CODEC.decode(&msg.body)?;

    let (properties, notice) = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.register_process(
            request.spawn_id,
            msg.peer(),
            &request.unique_code,
        )?
    };

    if let Some(notice) = notice {
        push_status(&notice);
    }

    // The task's properties are the process's configuration payload.
    msg.respond(ResponseStatus::Success, CODEC.encode(&properties)?)?;
    Ok(())
}

pub(crate) async fn complete_spawn_process(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let request: SpawnFinalization = CODEC.decode(&msg.body)?;

    let notice = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.complete(request.spawn_id, msg.peer(), request.data)?
    };

    if let Some(notice) = notice {
        push_status(&notice);
    }

    msg.respond(ResponseStatus::Success, Vec::new())?;
    Ok(())
}

/// Fire-and-forget from the agent; no response either way.
pub(crate) async fn process_started(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let spawn_id: SpawnId = CODEC.decode(&msg.body)?;
    let notice = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.on_process_started(spawn_id)
    };
    if let Some(notice) = notice {
        push_status(&notice);
    }
    Ok(())
}

/// Fire-and-forget from the agent; no response either way.
pub(crate) async fn process_killed(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let spawn_id: SpawnId = CODEC.decode(&msg.body)?;
    let notice = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.on_process_killed(spawn_id)
    };
    if let Some(notice) = notice {
        push_status(&notice);
    }
    Ok(())
}

pub(crate) async fn get_spawn_finalization_data(
    ctx: &Arc<MasterContext>,
    msg: &IncomingMessage,
) -> Result<(), HandlerError> {
    let spawn_id: SpawnId = CODEC.decode(&msg.body)?;

    let data = {
        let spawners = ctx.spawners.lock().await;
        spawners.finalization_data(spawn_id, msg.peer())?
    };

    msg.respond(ResponseStatus::Success, CODEC.encode(&data)?)?;
    Ok(())
}
