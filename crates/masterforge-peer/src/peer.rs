//! The `Peer` handle: one connected session, seen from the master's (or
//! an agent's) side.
//!
//! A `Peer` is cheap to clone — registries, handlers, and pending round
//! trips all hold copies of the same `Arc`'d inner state. The handle
//! outlives the socket: after a disconnect it answers
//! `NotConnected` instead of sending.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use masterforge_protocol::{
    AckId, Frame, OpCode, PeerId, ResponseStatus,
};
use tokio::sync::{mpsc, watch};

use crate::{AckTimeoutRegistry, PeerConfig, PeerError, Response, SessionData};

struct PeerInner {
    id: PeerId,
    outbound: mpsc::UnboundedSender<Frame>,
    acks: AckTimeoutRegistry,
    session: Mutex<SessionData>,
    connected: AtomicBool,
    shutdown: watch::Sender<bool>,
    config: PeerConfig,
}

/// A handle to one connected peer.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

impl Peer {
    /// Creates a peer over an already-established outbound frame channel.
    ///
    /// [`attach`](crate::attach) is the normal way to get a `Peer`; this
    /// constructor exists for custom pumps and for tests that want a
    /// peer without a socket behind it.
    pub fn new(
        id: PeerId,
        outbound: mpsc::UnboundedSender<Frame>,
        config: PeerConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(PeerInner {
                id,
                outbound,
                acks: AckTimeoutRegistry::new(),
                session: Mutex::new(SessionData::default()),
                connected: AtomicBool::new(true),
                shutdown,
                config,
            }),
        }
    }

    pub fn id(&self) -> PeerId {
        self.inner.id
    }

    /// `true` until the underlying connection closes.
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// `true` if both handles point at the same session.
    pub fn same_peer(&self, other: &Peer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // -- Messaging --------------------------------------------------------

    /// Sends a fire-and-forget notification.
    pub fn notify(
        &self,
        op: OpCode,
        body: Vec<u8>,
    ) -> Result<(), PeerError> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected(self.id()));
        }
        self.inner
            .outbound
            .send(Frame::notification(op, body))
            .map_err(|_| PeerError::NotConnected(self.id()))
    }

    /// Sends a request and waits for its response, with the peer's
    /// default timeout.
    ///
    /// Never errors: timeouts and dead connections come back as
    /// responses with the matching synthetic status, so call sites
    /// handle every outcome through one status check.
    pub async fn request(&self, op: OpCode, body: Vec<u8>) -> Response {
        self.request_with_timeout(
            op,
            body,
            self.inner.config.default_request_timeout,
        )
        .await
    }

    /// Sends a request with an explicit timeout.
    pub async fn request_with_timeout(
        &self,
        op: OpCode,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Response {
        if !self.is_connected() {
            return Response::synthetic(ResponseStatus::NotConnected);
        }

        let (ack, rx) = self.inner.acks.register(timeout);
        if self
            .inner
            .outbound
            .send(Frame::request(op, ack, body))
            .is_err()
        {
            // Writer is gone; resolve our own entry so nothing leaks.
            self.inner
                .acks
                .resolve(ack, Response::synthetic(ResponseStatus::NotConnected));
        }

        // The sender is held by the registry; it fires exactly once, via
        // resolve, sweep, or fail_all. A closed channel can only mean
        // the registry entry was dropped with the peer.
        rx.await
            .unwrap_or_else(|_| {
                Response::synthetic(ResponseStatus::NotConnected)
            })
    }

    /// Sends a response frame answering the request that carried `ack`.
    pub fn respond(
        &self,
        op: u16,
        ack: AckId,
        status: ResponseStatus,
        body: Vec<u8>,
    ) -> Result<(), PeerError> {
        if !self.is_connected() {
            return Err(PeerError::NotConnected(self.id()));
        }
        self.inner
            .outbound
            .send(Frame::response(op, ack, status, body))
            .map_err(|_| PeerError::NotConnected(self.id()))
    }

    // -- Session data -----------------------------------------------------

    pub fn username(&self) -> Option<String> {
        self.session().username.clone()
    }

    pub fn set_username(&self, username: impl Into<String>) {
        self.session().username = Some(username.into());
    }

    pub fn permission_level(&self) -> i32 {
        self.session().permission_level
    }

    pub fn set_permission_level(&self, level: i32) {
        self.session().permission_level = level;
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.session().properties.get(key).cloned()
    }

    pub fn set_property(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.session().properties.insert(key.into(), value.into());
    }

    fn session(&self) -> std::sync::MutexGuard<'_, SessionData> {
        self.inner.session.lock().expect("session lock poisoned")
    }

    // -- Lifecycle --------------------------------------------------------

    /// Number of requests this peer is still waiting on.
    pub fn pending_requests(&self) -> usize {
        self.inner.acks.pending()
    }

    pub(crate) fn acks(&self) -> &AckTimeoutRegistry {
        &self.inner.acks
    }

    /// Actively tears the session down: fails pending requests and tells
    /// the pump to close the socket. Idempotent; safe from any task.
    pub fn disconnect(&self) {
        self.mark_disconnected();
        let _ = self.inner.shutdown.send(true);
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Marks the peer disconnected and fails every pending request with
    /// `NotConnected`. Called by the pump when the socket closes;
    /// idempotent.
    pub(crate) fn mark_disconnected(&self) {
        if self
            .inner
            .connected
            .swap(false, Ordering::AcqRel)
        {
            let failed =
                self.inner.acks.fail_all(ResponseStatus::NotConnected);
            if failed > 0 {
                tracing::debug!(
                    peer_id = %self.id(),
                    failed,
                    "failed pending requests on disconnect"
                );
            }
        }
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.inner.id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_peer() -> (Peer, mpsc::UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Peer::new(PeerId(1), tx, PeerConfig::default()), rx)
    }

    #[test]
    fn test_notify_sends_notification_frame() {
        let (peer, mut rx) = test_peer();
        peer.notify(OpCode::ProcessStarted, b"x".to_vec())
            .expect("should send");
        let frame = rx.try_recv().expect("frame queued");
        assert_eq!(frame.op, u16::from(OpCode::ProcessStarted));
        assert!(!frame.expects_response());
    }

    #[tokio::test]
    async fn test_request_resolves_when_response_arrives() {
        let (peer, mut rx) = test_peer();

        let requester = {
            let peer = peer.clone();
            tokio::spawn(async move {
                peer.request(OpCode::RegisterRoom, vec![]).await
            })
        };

        // Pull the outgoing frame and answer it through the registry,
        // the way the pump does when the response frame comes back.
        let frame = loop {
            if let Ok(f) = rx.try_recv() {
                break f;
            }
            tokio::task::yield_now().await;
        };
        let ack = frame.ack_request.expect("request carries ack id");
        peer.acks().resolve(
            ack,
            Response {
                status: ResponseStatus::Success,
                body: b"7".to_vec(),
            },
        );

        let response = requester.await.expect("task");
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.body, b"7");
    }

    #[tokio::test]
    async fn test_request_on_disconnected_peer_is_not_connected() {
        let (peer, _rx) = test_peer();
        peer.mark_disconnected();

        let response = peer.request(OpCode::RegisterRoom, vec![]).await;
        assert_eq!(response.status, ResponseStatus::NotConnected);
        assert!(peer
            .notify(OpCode::ProcessStarted, vec![])
            .is_err());
    }

    #[tokio::test]
    async fn test_mark_disconnected_fails_pending_requests() {
        let (peer, _rx) = test_peer();

        let requester = {
            let peer = peer.clone();
            tokio::spawn(async move {
                peer.request(OpCode::GetRoomAccess, vec![]).await
            })
        };
        // Let the request register before disconnecting.
        while peer.pending_requests() == 0 {
            tokio::task::yield_now().await;
        }

        peer.mark_disconnected();
        let response = requester.await.expect("task");
        assert_eq!(response.status, ResponseStatus::NotConnected);
        assert_eq!(peer.pending_requests(), 0);
    }

    #[test]
    fn test_session_accessors() {
        let (peer, _rx) = test_peer();
        assert!(peer.username().is_none());
        assert_eq!(peer.permission_level(), 0);

        peer.set_username("ada");
        peer.set_permission_level(10);
        peer.set_property("client", "1.4.0");

        assert_eq!(peer.username().as_deref(), Some("ada"));
        assert_eq!(peer.permission_level(), 10);
        assert_eq!(peer.property("client").as_deref(), Some("1.4.0"));
        assert!(peer.property("missing").is_none());
    }

    #[test]
    fn test_same_peer_compares_identity_not_id() {
        let (a, _rx_a) = test_peer();
        let (b, _rx_b) = test_peer();
        let a2 = a.clone();
        assert!(a.same_peer(&a2));
        assert!(!a.same_peer(&b), "distinct sessions with equal ids differ");
    }
}
