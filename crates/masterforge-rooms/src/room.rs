//! A single registered room: access brokering and player tracking.
//!
//! The master never talks to game traffic — a room here is bookkeeping:
//! who owns it, its advertised options, and three small collections that
//! together enforce the room's player limit:
//!
//! ```text
//! pending      — access checks in flight to the room owner
//! unconfirmed  — granted tokens nobody has claimed yet
//! active       — validated (claimed) accesses; THE membership list
//! ```
//!
//! A peer moves `pending → unconfirmed → active`, or falls out on the
//! way (denied, timed out, expired). Capacity counts all three, so a
//! full room can't be oversubscribed by a burst of simultaneous
//! requests.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use masterforge_peer::Peer;
use masterforge_protocol::{
    PeerId, RoomAccessCheck, RoomAccessPacket, RoomId, RoomOptions,
};

use crate::RoomError;

/// A granted access nobody has claimed yet.
struct UnconfirmedAccess {
    access: RoomAccessPacket,
    peer: Peer,
    expires_at: Instant,
}

/// What `begin_access` decided.
pub enum AccessReply {
    /// The peer already holds an unclaimed access; hand it back again
    /// (its expiry has been refreshed).
    Existing(RoomAccessPacket),
    /// All checks passed; ask the room owner to confirm this peer.
    /// The pending slot is reserved until `grant_access`/`abort_access`.
    CheckRequired(RoomAccessCheck),
}

/// One room registered with the master.
pub struct RegisteredRoom {
    id: RoomId,
    owner: Peer,
    options: RoomOptions,
    unconfirmed: HashMap<String, UnconfirmedAccess>,
    active: HashMap<PeerId, RoomAccessPacket>,
    pending: HashSet<PeerId>,
}

impl RegisteredRoom {
    pub(crate) fn new(id: RoomId, owner: Peer, options: RoomOptions) -> Self {
        Self {
            id,
            owner,
            options,
            unconfirmed: HashMap::new(),
            active: HashMap::new(),
            pending: HashSet::new(),
        }
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// The peer (room process) that registered this room. Only it may
    /// mutate the room.
    pub fn owner(&self) -> &Peer {
        &self.owner
    }

    pub fn options(&self) -> &RoomOptions {
        &self.options
    }

    /// Replaces the options wholesale.
    pub fn change_options(&mut self, options: RoomOptions) {
        tracing::debug!(room_id = %self.id, "room options replaced");
        self.options = options;
    }

    /// Number of players with a validated access.
    pub fn online_count(&self) -> usize {
        self.active.len()
    }

    fn access_timeout(&self) -> Duration {
        Duration::from_secs(self.options.access_timeout_secs)
    }

    /// Runs the admission checks for `peer` and reserves its slot.
    ///
    /// # Errors
    /// - [`RoomError::AlreadyRequested`] — a check for this peer is
    ///   already in flight
    /// - [`RoomError::AlreadyInRoom`] — the peer holds an active access
    /// - [`RoomError::RoomFull`] — `pending + unconfirmed + active`
    ///   would exceed `max_connections` (skipped when 0)
    pub fn begin_access(
        &mut self,
        peer: &Peer,
        properties: HashMap<String, String>,
    ) -> Result<AccessReply, RoomError> {
        let peer_id = peer.id();

        if self.pending.contains(&peer_id) {
            return Err(RoomError::AlreadyRequested(self.id));
        }

        if self.active.contains_key(&peer_id) {
            return Err(RoomError::AlreadyInRoom(self.id));
        }

        // An unclaimed access is handed back as-is with a fresh expiry:
        // a client retrying before it managed to connect gets the same
        // token, not a second slot.
        let timeout = self.access_timeout();
        if let Some(existing) = self
            .unconfirmed
            .values_mut()
            .find(|u| u.peer.id() == peer_id)
        {
            existing.expires_at = Instant::now() + timeout;
            return Ok(AccessReply::Existing(existing.access.clone()));
        }

        if self.options.max_connections != 0 {
            let slots_taken = self.pending.len()
                + self.unconfirmed.len()
                + self.active.len();
            if slots_taken >= self.options.max_connections as usize {
                return Err(RoomError::RoomFull(self.id));
            }
        }

        self.pending.insert(peer_id);

        Ok(AccessReply::CheckRequired(RoomAccessCheck {
            peer_id,
            room_id: self.id,
            username: peer.username(),
            properties,
        }))
    }

    /// Stores an access the room owner approved, releasing the pending
    /// slot. The access is keyed by its token and expires if unclaimed.
    pub fn grant_access(&mut self, peer: Peer, access: RoomAccessPacket) {
        self.pending.remove(&peer.id());
        let expires_at = Instant::now() + self.access_timeout();
        tracing::debug!(
            room_id = %self.id,
            peer_id = %peer.id(),
            token = %access.token,
            "access granted"
        );
        self.unconfirmed.insert(
            access.token.clone(),
            UnconfirmedAccess {
                access,
                peer,
                expires_at,
            },
        );
    }

    /// Releases a pending slot whose check was denied, timed out, or
    /// otherwise went nowhere.
    pub fn abort_access(&mut self, peer_id: PeerId) {
        self.pending.remove(&peer_id);
    }

    /// Consumes an access token. Single use: the token is removed before
    /// anything else is checked, so it can never validate twice even if
    /// the rest of validation fails.
    ///
    /// # Errors
    /// - [`RoomError::UnknownToken`] — never granted, already used, or
    ///   expired
    /// - [`RoomError::TokenHolderGone`] — the peer the token was bound
    ///   to disconnected before claiming it
    pub fn validate_access(
        &mut self,
        token: &str,
    ) -> Result<Peer, RoomError> {
        let data = self
            .unconfirmed
            .remove(token)
            .ok_or(RoomError::UnknownToken)?;

        if !data.peer.is_connected() {
            return Err(RoomError::TokenHolderGone);
        }

        self.active.insert(data.peer.id(), data.access);
        tracing::info!(
            room_id = %self.id,
            peer_id = %data.peer.id(),
            online = self.active.len(),
            "player joined"
        );
        Ok(data.peer)
    }

    /// Removes every unclaimed access whose expiry has passed. Active
    /// accesses are never touched by this path.
    pub fn clear_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.unconfirmed.len();
        self.unconfirmed.retain(|token, u| {
            let keep = u.expires_at > now;
            if !keep {
                tracing::debug!(
                    room_id = %self.id,
                    token = %token,
                    "unclaimed access expired"
                );
            }
            keep
        });
        before - self.unconfirmed.len()
    }

    /// The room reported a player gone. Returns `true` if the peer was
    /// actually tracked as active.
    pub fn player_left(&mut self, peer_id: PeerId) -> bool {
        let was_active = self.active.remove(&peer_id).is_some();
        if was_active {
            tracing::info!(
                room_id = %self.id,
                peer_id = %peer_id,
                online = self.active.len(),
                "player left"
            );
        }
        was_active
    }

    /// Drops every tracked access and request. Called on destruction so
    /// a removed room doesn't pin peer handles alive.
    pub(crate) fn clear(&mut self) {
        self.unconfirmed.clear();
        self.active.clear();
        self.pending.clear();
    }
}

// =========================================================================
// Tests
// =========================================================================
