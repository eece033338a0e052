//! The peer I/O pump: turns a raw [`Connection`] into a [`Peer`] handle
//! plus a stream of inbound requests.
//!
//! [`attach`] spawns two tasks:
//!
//! - **writer** — drains the peer's outbound frame channel, encodes, and
//!   sends.
//! - **reader** — decodes inbound frames; responses are routed straight
//!   into the peer's ack registry, everything else is surfaced as an
//!   [`IncomingMessage`]. The reader also drives the registry's timeout
//!   sweep on a fixed interval, so a peer that goes quiet still times
//!   its requests out.
//!
//! When the socket closes (either direction), the reader marks the peer
//! disconnected — failing all pending requests with `NotConnected` — and
//! drops the inbound sender, which ends the consumer's loop and lets it
//! run its disconnect cascade.

use std::sync::Arc;

use masterforge_protocol::{AckId, Codec, Frame, PeerId, ResponseStatus};
use masterforge_transport::Connection;
use tokio::sync::mpsc;

use crate::{Peer, PeerConfig, PeerError, Response};

/// One inbound request or notification from a peer.
pub struct IncomingMessage {
    peer: Peer,
    /// Raw operation code (may be unknown to this build).
    pub op: u16,
    ack: Option<AckId>,
    /// Encoded packet body.
    pub body: Vec<u8>,
}

impl IncomingMessage {
    /// The peer this message came from.
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// `true` if the sender is waiting for a response.
    pub fn expects_response(&self) -> bool {
        self.ack.is_some()
    }

    /// Answers this message. A no-op for notifications.
    pub fn respond(
        &self,
        status: ResponseStatus,
        body: Vec<u8>,
    ) -> Result<(), PeerError> {
        match self.ack {
            Some(ack) => self.peer.respond(self.op, ack, status, body),
            None => Ok(()),
        }
    }

    /// Answers with a bare status and a human-readable reason string.
    pub fn respond_with_reason(
        &self,
        status: ResponseStatus,
        reason: &str,
    ) -> Result<(), PeerError> {
        self.respond(status, reason.as_bytes().to_vec())
    }
}

/// Attaches a peer to a connection, returning the handle and the inbound
/// request stream. `id` comes from the session store's counter.
pub fn attach<C, K>(
    conn: C,
    id: PeerId,
    config: PeerConfig,
    codec: K,
) -> (Peer, mpsc::UnboundedReceiver<IncomingMessage>)
where
    C: Connection,
    K: Codec,
{
    let conn = Arc::new(conn);
    let codec = Arc::new(codec);
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Frame>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<IncomingMessage>();

    let peer = Peer::new(id, out_tx, config.clone());

    tokio::spawn(write_loop(
        Arc::clone(&conn),
        Arc::clone(&codec),
        id,
        out_rx,
    ));
    tokio::spawn(read_loop(conn, codec, peer.clone(), config, in_tx));

    (peer, in_rx)
}

async fn write_loop<C: Connection, K: Codec>(
    conn: Arc<C>,
    codec: Arc<K>,
    id: PeerId,
    mut out_rx: mpsc::UnboundedReceiver<Frame>,
) {
    while let Some(frame) = out_rx.recv().await {
        let bytes = match codec.encode(&frame) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(
                    peer_id = %id, error = %e,
                    "failed to encode outgoing frame"
                );
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(
                peer_id = %id, error = %e,
                "send failed, stopping writer"
            );
            break;
        }
    }
    let _ = conn.close().await;
}

async fn read_loop<C: Connection, K: Codec>(
    conn: Arc<C>,
    codec: Arc<K>,
    peer: Peer,
    config: PeerConfig,
    in_tx: mpsc::UnboundedSender<IncomingMessage>,
) {
    let mut sweep = tokio::time::interval(config.sweep_interval);
    sweep.set_missed_tick_behavior(
        tokio::time::MissedTickBehavior::Skip,
    );
    let mut shutdown = peer.shutdown_signal();

    loop {
        // disconnect() may have raced ahead of the select registration.
        if *shutdown.borrow_and_update() {
            tracing::debug!(
                peer_id = %peer.id(),
                "session torn down locally"
            );
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => {
                continue; // top of loop re-checks the flag
            }
            _ = sweep.tick() => {
                let expired = peer.acks().sweep();
                if expired > 0 {
                    tracing::debug!(
                        peer_id = %peer.id(), expired,
                        "requests timed out"
                    );
                }
            }
            received = conn.recv() => {
                match received {
                    Ok(Some(data)) => {
                        if !route_frame(&*codec, &peer, &in_tx, &data) {
                            break;
                        }
                    }
                    Ok(None) => {
                        tracing::debug!(
                            peer_id = %peer.id(),
                            "connection closed"
                        );
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(
                            peer_id = %peer.id(), error = %e,
                            "connection error"
                        );
                        break;
                    }
                }
            }
        }
    }

    let _ = conn.close().await;
    peer.mark_disconnected();
    // in_tx drops here; the consumer sees the stream end and cascades.
}

/// Routes one decoded frame. Returns `false` when the consumer is gone.
fn route_frame<K: Codec>(
    codec: &K,
    peer: &Peer,
    in_tx: &mpsc::UnboundedSender<IncomingMessage>,
    data: &[u8],
) -> bool {
    let frame: Frame = match codec.decode(data) {
        Ok(frame) => frame,
        Err(e) => {
            // One bad frame doesn't kill the session.
            tracing::debug!(
                peer_id = %peer.id(), error = %e,
                "dropping undecodable frame"
            );
            return true;
        }
    };

    if let Some(ack) = frame.ack_response {
        let status =
            frame.status.unwrap_or(ResponseStatus::Error);
        let resolved = peer.acks().resolve(
            ack,
            Response {
                status,
                body: frame.body,
            },
        );
        if !resolved {
            // Late response after a timeout sweep — already answered.
            tracing::debug!(
                peer_id = %peer.id(), %ack,
                "response for unknown ack, dropping"
            );
        }
        return true;
    }

    in_tx
        .send(IncomingMessage {
            peer: peer.clone(),
            op: frame.op,
            ack: frame.ack_request,
            body: frame.body,
        })
        .is_ok()
}
