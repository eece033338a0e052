//! The room registry: every room registered with one master instance.
//!
//! Rooms are indexed twice — globally by room id, and per owner peer so
//! a disconnect can destroy everything that peer registered in one
//! synchronous pass, with no per-room event subscriptions to leak.
//!
//! # Concurrency note
//!
//! Plain `HashMap`s, not concurrent ones: the registry is owned by the
//! master's context and accessed behind a single mutex at that level.
//! Nothing here awaits; round trips to room owners happen between a
//! `begin_access` and a `grant_access`/`abort_access`, with the lock
//! released in between.

use std::collections::{HashMap, HashSet};

use masterforge_peer::Peer;
use masterforge_protocol::{GameInfo, PeerId, RoomId, RoomOptions};

use crate::{RegisteredRoom, RoomError, RoomsConfig};

/// Tracks registered rooms for one master instance.
pub struct RoomRegistry {
    rooms: HashMap<RoomId, RegisteredRoom>,
    /// Rooms owned by each peer, for the disconnect cascade.
    owned: HashMap<PeerId, HashSet<RoomId>>,
    next_room_id: u64,
    config: RoomsConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomsConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            owned: HashMap::new(),
            next_room_id: 1,
            config,
        }
    }

    pub fn config(&self) -> &RoomsConfig {
        &self.config
    }

    /// Registers a room for `owner` and returns it.
    ///
    /// Permission gating happens in the handler layer; by the time a
    /// request reaches the registry it is authorized.
    pub fn register(
        &mut self,
        owner: Peer,
        options: RoomOptions,
    ) -> &RegisteredRoom {
        let id = RoomId(self.next_room_id);
        self.next_room_id += 1;

        let owner_id = owner.id();
        self.owned.entry(owner_id).or_default().insert(id);

        let room = RegisteredRoom::new(id, owner, options);
        tracing::info!(
            room_id = %id,
            owner = %owner_id,
            total = self.rooms.len() + 1,
            "room registered"
        );
        self.rooms.entry(id).or_insert(room)
    }

    /// Removes a room from both indexes. Safe to call for an id that is
    /// already gone.
    pub fn destroy(&mut self, room_id: RoomId) -> Option<RegisteredRoom> {
        let mut room = self.rooms.remove(&room_id)?;

        let owner_id = room.owner().id();
        if let Some(owned) = self.owned.get_mut(&owner_id) {
            owned.remove(&room_id);
            if owned.is_empty() {
                self.owned.remove(&owner_id);
            }
        }

        room.clear();
        tracing::info!(
            room_id = %room_id,
            owner = %owner_id,
            total = self.rooms.len(),
            "room destroyed"
        );
        Some(room)
    }

    /// Destroys every room the disconnected peer owned. Returns them so
    /// the caller can notify whoever cares.
    pub fn on_peer_disconnected(
        &mut self,
        peer_id: PeerId,
    ) -> Vec<RegisteredRoom> {
        let Some(room_ids) = self.owned.remove(&peer_id) else {
            return Vec::new();
        };
        room_ids
            .into_iter()
            .filter_map(|id| self.destroy(id))
            .collect()
    }

    pub fn get(&self, room_id: RoomId) -> Result<&RegisteredRoom, RoomError> {
        self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))
    }

    pub fn get_mut(
        &mut self,
        room_id: RoomId,
    ) -> Result<&mut RegisteredRoom, RoomError> {
        self.rooms
            .get_mut(&room_id)
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Sweeps every room's unclaimed accesses. Returns how many expired.
    pub fn clear_expired(&mut self) -> usize {
        self.rooms
            .values_mut()
            .map(RegisteredRoom::clear_expired)
            .sum()
    }

    /// Public rooms, shaped for a game listing.
    pub fn public_games(&self) -> Vec<GameInfo> {
        self.rooms
            .values()
            .filter(|room| room.options().is_public)
            .map(|room| {
                let opts = room.options();
                GameInfo {
                    room_id: room.id(),
                    name: opts.name.clone(),
                    address: format!("{}:{}", opts.room_ip, opts.room_port),
                    online_players: room.online_count() as u32,
                    max_players: opts.max_connections,
                    password_protected: !opts.password.is_empty(),
                    properties: opts.properties.clone(),
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
