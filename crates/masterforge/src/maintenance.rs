//! The master's periodic work: expiry sweeps and queue draining.
//!
//! One task per master instance runs two interleaved cadences:
//!
//! - every `expiry_sweep_interval` (1 s default): clear unclaimed room
//!   accesses whose deadline passed
//! - every `queue_update_interval` (100 ms default): drain spawner
//!   queues, dispatching each due task's spawn command to its agent
//!
//! Each spawn command runs in its own task so a slow agent can't stall
//! the other dispatches or the next drain tick. A dispatch that fails —
//! refused, timed out, agent gone — aborts its spawn task and frees the
//! capacity slot it held.

use std::sync::Arc;

use masterforge_protocol::{Codec, JsonCodec, OpCode};
use masterforge_spawner::SpawnPlan;
use tokio::time::MissedTickBehavior;

use crate::handlers::push_status;
use crate::MasterContext;

pub(crate) fn spawn_maintenance(
    ctx: Arc<MasterContext>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut expiry =
            tokio::time::interval(ctx.config.expiry_sweep_interval);
        expiry.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut drain = tokio::time::interval(
            ctx.config.spawners.queue_update_interval,
        );
        drain.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = expiry.tick() => {
                    let expired =
                        ctx.rooms.lock().await.clear_expired();
                    if expired > 0 {
                        tracing::debug!(
                            expired,
                            "swept expired room accesses"
                        );
                    }
                }
                _ = drain.tick() => {
                    let (plans, notices) = {
                        let mut spawners = ctx.spawners.lock().await;
                        spawners.drain_queues()
                    };
                    for notice in &notices {
                        push_status(notice);
                    }
                    for plan in plans {
                        tokio::spawn(dispatch_spawn(
                            Arc::clone(&ctx),
                            plan,
                        ));
                    }
                }
            }
        }
    })
}

/// Sends one spawn command to its agent and compensates on failure.
async fn dispatch_spawn(ctx: Arc<MasterContext>, plan: SpawnPlan) {
    let codec = JsonCodec;
    let spawn_id = plan.spawn_id;

    let failure_reason = match codec.encode(&plan.request) {
        Ok(body) => {
            let response = plan
                .agent
                .request(OpCode::SpawnProcessRequest, body)
                .await;
            if response.status.is_success() {
                tracing::debug!(
                    %spawn_id,
                    "agent accepted spawn command"
                );
                return;
            }
            format!("{}: {}", response.status, response.reason())
        }
        Err(e) => e.to_string(),
    };

    tracing::warn!(
        %spawn_id,
        reason = %failure_reason,
        "spawn dispatch failed, aborting task"
    );
    let notice = {
        let mut spawners = ctx.spawners.lock().await;
        spawners.fail_dispatch(spawn_id)
    };
    if let Some(notice) = notice {
        push_status(&notice);
    }
}
