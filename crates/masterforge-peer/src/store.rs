//! The peer session store: every peer currently attached to a server.
//!
//! # Concurrency note
//!
//! Like the registries above it, the store is a plain `HashMap` owned by
//! one server instance and accessed behind a higher-level mutex. Peer
//! ids come from the store's own counter, so two servers in the same
//! process number their peers independently.

use std::collections::HashMap;

use masterforge_protocol::PeerId;

use crate::Peer;

/// Tracks attached peers and allocates their ids.
pub struct PeerSessionStore {
    peers: HashMap<PeerId, Peer>,
    next_id: u64,
}

impl PeerSessionStore {
    pub fn new() -> Self {
        Self {
            peers: HashMap::new(),
            next_id: 1,
        }
    }

    /// Allocates the id for a peer about to be attached. Monotonic,
    /// never reused within this store.
    pub fn next_peer_id(&mut self) -> PeerId {
        let id = PeerId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Adds an attached peer. Replacing an id is a bug upstream, so it
    /// is logged loudly but tolerated.
    pub fn insert(&mut self, peer: Peer) {
        let id = peer.id();
        if self.peers.insert(id, peer).is_some() {
            tracing::warn!(peer_id = %id, "replaced existing peer entry");
        }
        tracing::debug!(peer_id = %id, total = self.peers.len(), "peer attached");
    }

    pub fn get(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    /// Removes a peer on disconnect; the caller runs the cascade with
    /// the returned handle.
    pub fn remove(&mut self, id: PeerId) -> Option<Peer> {
        let peer = self.peers.remove(&id);
        if peer.is_some() {
            tracing::debug!(
                peer_id = %id,
                total = self.peers.len(),
                "peer detached"
            );
        }
        peer
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PeerConfig;
    use masterforge_protocol::Frame;
    use tokio::sync::mpsc;

    fn peer_with_id(id: PeerId) -> Peer {
        let (tx, _rx) = mpsc::unbounded_channel::<Frame>();
        // _rx dropped: these peers never send in store tests.
        Peer::new(id, tx, PeerConfig::default())
    }

    #[test]
    fn test_next_peer_id_is_monotonic() {
        let mut store = PeerSessionStore::new();
        let a = store.next_peer_id();
        let b = store.next_peer_id();
        assert!(b.0 > a.0);
    }

    #[test]
    fn test_insert_get_remove_roundtrip() {
        let mut store = PeerSessionStore::new();
        let id = store.next_peer_id();
        store.insert(peer_with_id(id));

        assert_eq!(store.len(), 1);
        assert!(store.get(id).is_some());

        let removed = store.remove(id).expect("should remove");
        assert_eq!(removed.id(), id);
        assert!(store.is_empty());
        assert!(store.get(id).is_none());
    }

    #[test]
    fn test_remove_unknown_returns_none() {
        let mut store = PeerSessionStore::new();
        assert!(store.remove(PeerId(99)).is_none());
    }

    #[test]
    fn test_two_stores_number_independently() {
        let mut a = PeerSessionStore::new();
        let mut b = PeerSessionStore::new();
        assert_eq!(a.next_peer_id(), b.next_peer_id());
    }
}
