//! Room directory: the grouping of players onto live map instances.
//!
//! The directory owns the canonical player handles and the id → instance
//! room table. Each call is atomic per entry. Joining a room re-homes the
//! player's canonical handle (the stored record is swapped for a fresh one
//! carrying the same state), so any reference taken before the join is
//! stale and must be re-fetched through [`RoomDirectory::get_user`].

use crate::error::WorldError;
use crate::instance::MapInstance;
use crate::player::{Player, SharedPlayer};
use atlas_event_system::{MapId, PlayerId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Central directory of connected players and live rooms.
///
/// Uses `DashMap` for lock-free concurrent access; instance membership lives
/// on the instance itself so it stays reachable only through the room entry.
pub struct RoomDirectory {
    rooms: DashMap<MapId, Arc<MapInstance>>,
    users: DashMap<PlayerId, SharedPlayer>,
}

impl std::fmt::Debug for RoomDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomDirectory")
            .field("rooms", &self.rooms.len())
            .field("users", &self.users.len())
            .finish()
    }
}

impl RoomDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            users: DashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Registers a player and returns its canonical handle.
    pub fn connect(&self, player: Player) -> SharedPlayer {
        let id = player.id;
        let handle: SharedPlayer = Arc::new(RwLock::new(player));
        self.users.insert(id, handle.clone());
        info!("Player {} connected", id);
        handle
    }

    /// Removes a player from the directory, returning the final handle.
    pub fn disconnect(&self, player_id: PlayerId) -> Option<SharedPlayer> {
        let removed = self.users.remove(&player_id).map(|(_, v)| v);
        if removed.is_some() {
            info!("Player {} disconnected", player_id);
        }
        removed
    }

    /// Fetches the canonical handle for a player.
    pub fn get_user(&self, player_id: PlayerId) -> Option<SharedPlayer> {
        self.users.get(&player_id).map(|e| e.value().clone())
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Registers a live instance under its map id.
    ///
    /// First registration wins; a concurrent duplicate registration yields
    /// the already-registered instance so every caller converges on one.
    pub fn add_room(&self, id: MapId, instance: Arc<MapInstance>) -> Arc<MapInstance> {
        use dashmap::mapref::entry::Entry;
        match self.rooms.entry(id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                info!("Room '{}' opened", entry.key());
                entry.insert(instance).clone()
            }
        }
    }

    /// Looks up the live instance for a map id.
    pub fn room(&self, id: &MapId) -> Option<Arc<MapInstance>> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    /// Drops a room entry. Part of explicit eviction.
    pub fn remove_room(&self, id: &MapId) -> Option<Arc<MapInstance>> {
        let removed = self.rooms.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            info!("Room '{}' closed", id);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    /// Adds a player to a room's membership and re-homes their canonical
    /// handle.
    ///
    /// After this returns, handles fetched before the join are stale;
    /// callers that keep dispatching against the player must re-fetch via
    /// [`RoomDirectory::get_user`].
    pub async fn join_room(&self, id: &MapId, player_id: PlayerId) -> Result<(), WorldError> {
        let room = self
            .room(id)
            .ok_or_else(|| WorldError::RoomNotFound(id.clone()))?;
        room.join(player_id).await;

        if let Some(handle) = self.get_user(player_id) {
            let rehomed = handle.read().await.clone();
            self.users
                .insert(player_id, Arc::new(RwLock::new(rehomed)));
        }
        Ok(())
    }

    /// Removes a player from a room's membership. A missing room or a
    /// non-member player is a no-op.
    pub async fn leave_room(&self, id: &MapId, player_id: PlayerId) -> bool {
        match self.room(id) {
            Some(room) => room.leave(player_id).await,
            None => false,
        }
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
