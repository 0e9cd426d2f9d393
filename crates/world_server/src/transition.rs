//! The player transition protocol.
//!
//! [`MapService::change_map`] drives a player's move from one map to
//! another: field reset, leaving the previous room with its hooks, resolving
//! the destination instance, defaulting player geometry, snapshot delivery,
//! membership join, the enter hooks on the refreshed player handle,
//! positioning, and scenario event instantiation, strictly in that order.
//!
//! `MapNotFound` is the one expected failure and short-circuits before any
//! membership or hook side effect; the initial field reset has already
//! happened by then. A failing hook is not recovered here: it surfaces to
//! the caller with the earlier steps' mutations intact.

use crate::error::WorldError;
use crate::instance::{EventMode, MapInstance};
use crate::player::SceneKind;
use crate::registry::InstanceRegistry;
use crate::rooms::RoomDirectory;
use atlas_event_system::{
    current_timestamp, HookBus, MapId, PlayerChangedMapEvent, PlayerId, Position, WorldHook,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Tunables of the transition protocol.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Name of the spawn marker used when no explicit position is given.
    pub start_marker: String,
    /// Whether a previous map emptied by a transition is evicted.
    pub evict_empty_instances: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            start_marker: "start".to_string(),
            evict_empty_instances: false,
        }
    }
}

/// Orchestrates player transitions between maps.
pub struct MapService {
    registry: Arc<InstanceRegistry>,
    rooms: Arc<RoomDirectory>,
    hooks: Arc<HookBus>,
    config: WorldConfig,
}

impl std::fmt::Debug for MapService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapService")
            .field("config", &self.config)
            .finish()
    }
}

impl MapService {
    /// Creates a service with the default configuration.
    pub fn new(
        registry: Arc<InstanceRegistry>,
        rooms: Arc<RoomDirectory>,
        hooks: Arc<HookBus>,
    ) -> Self {
        Self::with_config(registry, rooms, hooks, WorldConfig::default())
    }

    /// Creates a service with explicit configuration.
    pub fn with_config(
        registry: Arc<InstanceRegistry>,
        rooms: Arc<RoomDirectory>,
        hooks: Arc<HookBus>,
        config: WorldConfig,
    ) -> Self {
        Self {
            registry,
            rooms,
            hooks,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    pub fn rooms(&self) -> &Arc<RoomDirectory> {
        &self.rooms
    }

    /// Moves a player to the given map.
    ///
    /// # Arguments
    ///
    /// * `target` - Destination map id
    /// * `player_id` - The player to move
    /// * `positions` - Explicit spawn position; defaults to the destination's
    ///   start marker, then the map origin
    ///
    /// # Returns
    ///
    /// The destination instance on success. [`WorldError::MapNotFound`] if
    /// the destination id has no registered map; the transition aborts with
    /// the player's map/prev_map/event fields already reset but membership
    /// and hooks untouched. Any hook error propagates as-is.
    pub async fn change_map(
        &self,
        target: &MapId,
        player_id: PlayerId,
        positions: Option<Position>,
    ) -> Result<Arc<MapInstance>, WorldError> {
        let player = self
            .rooms
            .get_user(player_id)
            .ok_or(WorldError::PlayerNotFound(player_id))?;

        // 1. Field reset: record the previous map, point the player at the
        // destination, drop the old transition context's events.
        let prev_map = {
            let mut p = player.write().await;
            let prev = p.map.take();
            p.prev_map = prev.clone();
            p.map = Some(target.clone());
            p.events.clear();
            prev
        };

        // The one expected failure: an unknown destination aborts before any
        // membership or hook side effect.
        if !self.registry.contains(target) {
            warn!("Map '{}' does not exist, aborting transition", target);
            return Err(WorldError::MapNotFound(target.clone()));
        }

        // 2. Leave the previous room, then its hooks, in order.
        if let Some(prev) = &prev_map {
            self.rooms.leave_room(prev, player_id).await;
            if let Some(old) = self.rooms.room(prev) {
                old.on_leave(&player).await?;
                old.on_leave_map().await?;
            }
        }

        // 3. Resolve the destination instance (single-flight per id).
        let instance = self.registry.resolve(target).await?;

        // 4. Default player geometry from the destination's tile dimensions,
        // only for fields not already set.
        // 5. Deliver the snapshot to the player's scene loader.
        {
            let mut p = player.write().await;
            let (tw, th) = (instance.tile_width(), instance.tile_height());
            if p.height.is_none() {
                p.height = Some(th);
            }
            if p.width.is_none() {
                p.width = Some(tw);
            }
            if p.hitbox.h.is_none() {
                p.hitbox.h = Some(th);
            }
            if p.hitbox.w.is_none() {
                p.hitbox.w = Some(tw);
            }
            p.load_scene(SceneKind::Map, instance.snapshot());
        }

        // 6. Join the destination room; this re-homes the canonical handle.
        self.rooms.join_room(target, player_id).await?;

        // 7. Every dispatch from here on uses the refreshed handle.
        let player = self
            .rooms
            .get_user(player_id)
            .ok_or(WorldError::PlayerNotFound(player_id))?;

        // 8. Destination hooks, in order.
        instance.on_enter(&player, prev_map.as_ref()).await?;
        instance.on_join_map().await?;

        // 9. Position at the explicit coordinates, else the start marker.
        let spawn = positions
            .or_else(|| instance.template().marker(&self.config.start_marker))
            .unwrap_or_default();
        player.write().await.teleport(spawn);

        // 10. Scenario events: instantiate, assign, then init in order.
        let events = instance.create_events(EventMode::Scenario);
        player.write().await.events = events.clone();
        for event in &events {
            event.init(&player).await?;
        }

        if self.config.evict_empty_instances {
            if let Some(prev) = &prev_map {
                if let Err(e) = self.registry.evict(prev).await {
                    // Someone re-entered between our leave and now.
                    tracing::debug!("Skipping eviction of '{}': {}", prev, e);
                }
            }
        }

        info!(
            "Player {} moved {} -> '{}'",
            player_id,
            prev_map
                .as_ref()
                .map(|m| format!("'{m}'"))
                .unwrap_or_else(|| "nowhere".to_string()),
            target
        );

        if let Err(e) = self
            .hooks
            .emit(
                WorldHook::PlayerChangedMap,
                &PlayerChangedMapEvent {
                    player_id,
                    previous_map: prev_map,
                    map_id: target.clone(),
                    timestamp: current_timestamp(),
                },
            )
            .await
        {
            warn!("Failed to publish transition notification: {}", e);
        }

        Ok(instance)
    }
}
