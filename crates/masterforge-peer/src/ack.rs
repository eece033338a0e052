//! The ack/timeout registry: correlates outgoing requests with the
//! futures waiting on their responses.
//!
//! Every reliable request gets an entry here before it leaves the
//! socket. The entry is resolved exactly once, by whichever happens
//! first:
//!
//! - the matching response arrives ([`AckTimeoutRegistry::resolve`]),
//! - the periodic sweep finds its deadline elapsed
//!   ([`AckTimeoutRegistry::sweep`] → synthetic [`ResponseStatus::Timeout`]),
//! - the peer disconnects ([`AckTimeoutRegistry::fail_all`] → synthetic
//!   [`ResponseStatus::NotConnected`]).
//!
//! # Concurrency note
//!
//! Resolution, sweeping, and registration race freely: the reader task
//! resolves, the sweeper ticks, and any handler may register. A single
//! `std::sync::Mutex` over the pending map serializes them. Nothing
//! awaits while holding it, and the entry is removed from the map before
//! its waiter is woken, so an id can never fire twice.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use masterforge_protocol::{AckId, ResponseStatus};
use tokio::sync::oneshot;

/// What a pending request eventually resolves to: a status plus the
/// response body (possibly a human-readable reason on failures).
#[derive(Debug)]
pub struct Response {
    pub status: ResponseStatus,
    pub body: Vec<u8>,
}

impl Response {
    /// The body as a lossy UTF-8 string, with a fallback for empty
    /// bodies. Failure responses carry their reason this way.
    pub fn reason(&self) -> String {
        if self.body.is_empty() {
            format!("{}", self.status)
        } else {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    pub(crate) fn timeout() -> Self {
        Self {
            status: ResponseStatus::Timeout,
            body: b"request timed out".to_vec(),
        }
    }

    pub(crate) fn synthetic(status: ResponseStatus) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

struct PendingAck {
    deadline: Instant,
    reply: oneshot::Sender<Response>,
}

struct Inner {
    next_id: u64,
    pending: HashMap<AckId, PendingAck>,
}

/// Correlates outgoing requests to pending response futures, with
/// deadline-based expiry. One registry per peer connection.
pub struct AckTimeoutRegistry {
    inner: Mutex<Inner>,
}

impl AckTimeoutRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                pending: HashMap::new(),
            }),
        }
    }

    /// Allocates a fresh ack id and a receiver that resolves exactly
    /// once. Ids increase monotonically and are never reused while live.
    pub fn register(
        &self,
        timeout: Duration,
    ) -> (AckId, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let mut inner = self.inner.lock().expect("ack registry poisoned");
        let id = AckId(inner.next_id);
        inner.next_id += 1;
        inner.pending.insert(
            id,
            PendingAck {
                deadline: Instant::now() + timeout,
                reply: tx,
            },
        );
        (id, rx)
    }

    /// Completes the pending entry for `id` with `response`.
    ///
    /// Returns `false` if the id is unknown — already resolved, swept,
    /// or never registered. A late response after a timeout lands here
    /// and is dropped.
    pub fn resolve(&self, id: AckId, response: Response) -> bool {
        let entry = {
            let mut inner =
                self.inner.lock().expect("ack registry poisoned");
            inner.pending.remove(&id)
        };
        match entry {
            Some(ack) => {
                // The receiver may have been dropped (caller gave up);
                // that's fine, the entry is gone either way.
                let _ = ack.reply.send(response);
                true
            }
            None => false,
        }
    }

    /// Expires every entry whose deadline has passed, resolving it with
    /// a synthetic Timeout. Returns how many were expired.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<PendingAck> = {
            let mut inner =
                self.inner.lock().expect("ack registry poisoned");
            let ids: Vec<AckId> = inner
                .pending
                .iter()
                .filter(|(_, ack)| ack.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            ids.iter()
                .filter_map(|id| inner.pending.remove(id))
                .collect()
        };
        let count = expired.len();
        for ack in expired {
            let _ = ack.reply.send(Response::timeout());
        }
        count
    }

    /// Resolves every pending entry with a synthetic `status`.
    ///
    /// Called by the disconnect path with
    /// [`ResponseStatus::NotConnected`] so callers waiting on a dead
    /// peer fail immediately instead of riding out their timeouts.
    pub fn fail_all(&self, status: ResponseStatus) -> usize {
        let drained: Vec<PendingAck> = {
            let mut inner =
                self.inner.lock().expect("ack registry poisoned");
            inner.pending.drain().map(|(_, ack)| ack).collect()
        };
        let count = drained.len();
        for ack in drained {
            let _ = ack.reply.send(Response::synthetic(status));
        }
        count
    }

    /// Number of requests still awaiting a response.
    pub fn pending(&self) -> usize {
        self.inner.lock().expect("ack registry poisoned").pending.len()
    }
}

impl Default for AckTimeoutRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =========================================================================
// Tests
// =========================================================================
