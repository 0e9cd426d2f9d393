//! Map templates and the process-wide template store.
//!
//! A [`MapTemplate`] is the immutable, shared definition of a map: geometry,
//! tileset references, shape and scripted-event definitions, ambient sounds,
//! and named markers. Templates are published to the [`TemplateStore`] once
//! per id on first reference and are read-only afterwards; mutating a
//! published template is a programming error, not a runtime-checked
//! condition.
//!
//! The store also carries live [`MapInstance`]s that were pre-instantiated
//! outside the registry (for example by a scenario bootstrapper), so lazy
//! resolution can adopt them instead of constructing a duplicate.

use crate::instance::MapInstance;
use atlas_event_system::{LayerKind, LayerSnapshot, MapId, Position, ShapeDef, TilesetRef};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Raw definition of a scripted event, as carried by a map template.
///
/// Behavior is attached separately: the map descriptor maps event names to
/// script implementations when events are instantiated for a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl EventDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: None,
            properties: serde_json::Map::new(),
        }
    }
}

/// A tile layer as the server holds it.
///
/// The collision index is runtime-only state derived at template build time;
/// it never crosses the wire (see [`TileLayer::to_snapshot`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub name: String,
    pub kind: LayerKind,
    /// Tile indices, row-major, `width * height` entries.
    pub tiles: Vec<u32>,
    /// Cell indices that block movement. Server-internal back-reference.
    #[serde(skip)]
    pub collision: Vec<u32>,
}

impl TileLayer {
    pub fn new(name: impl Into<String>, kind: LayerKind, tiles: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            kind,
            tiles,
            collision: Vec::new(),
        }
    }

    /// Projects this layer to its wire form, dropping the collision index.
    pub fn to_snapshot(&self) -> LayerSnapshot {
        LayerSnapshot {
            name: self.name.clone(),
            kind: self.kind,
            tiles: self.tiles.clone(),
        }
    }
}

/// Immutable per-id map definition, shared by every instance of that id.
#[derive(Debug, Clone)]
pub struct MapTemplate {
    pub id: MapId,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    pub tilesets: Vec<TilesetRef>,
    pub layers: Vec<TileLayer>,
    pub shapes: Vec<ShapeDef>,
    pub events: Vec<EventDef>,
    pub sounds: Vec<String>,
    /// Named spawn markers; transitions use the configured start marker.
    pub markers: HashMap<String, Position>,
}

impl MapTemplate {
    /// Creates an empty template with the given id and tile geometry.
    pub fn new(
        id: impl Into<MapId>,
        tile_width: u32,
        tile_height: u32,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            tile_width,
            tile_height,
            width,
            height,
            tilesets: Vec::new(),
            layers: Vec::new(),
            shapes: Vec::new(),
            events: Vec::new(),
            sounds: Vec::new(),
            markers: HashMap::new(),
        }
    }

    /// Looks up a named marker.
    pub fn marker(&self, name: &str) -> Option<Position> {
        self.markers.get(name).copied()
    }

    /// World width in pixels.
    pub fn world_width(&self) -> f64 {
        (self.width * self.tile_width) as f64
    }

    /// World height in pixels.
    pub fn world_height(&self) -> f64 {
        (self.height * self.tile_height) as f64
    }
}

/// Process-wide cache of published templates and pre-instantiated instances.
///
/// Constructed once at bootstrap and injected into every component that
/// needs it, never reached through ambient global state.
pub struct TemplateStore {
    templates: DashMap<MapId, Arc<MapTemplate>>,
    instances: DashMap<MapId, Arc<MapInstance>>,
}

impl std::fmt::Debug for TemplateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateStore")
            .field("templates", &self.templates.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl TemplateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
            instances: DashMap::new(),
        }
    }

    /// Publishes a template under its id.
    ///
    /// Exactly-once with idempotent repeats: the first publication wins and
    /// later calls for the same id return the already-published `Arc`
    /// untouched.
    pub fn publish(&self, template: MapTemplate) -> Arc<MapTemplate> {
        use dashmap::mapref::entry::Entry;
        match self.templates.entry(template.id.clone()) {
            Entry::Occupied(entry) => {
                debug!("Template '{}' already published, keeping first", entry.key());
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(Arc::new(template)).clone(),
        }
    }

    /// Retrieves a published template.
    pub fn get(&self, id: &MapId) -> Option<Arc<MapTemplate>> {
        self.templates.get(id).map(|e| e.value().clone())
    }

    /// Publishes a live instance for adoption by lazy resolution.
    ///
    /// First publication wins, like [`TemplateStore::publish`].
    pub fn publish_instance(&self, instance: Arc<MapInstance>) -> Arc<MapInstance> {
        use dashmap::mapref::entry::Entry;
        match self.instances.entry(instance.id().clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(instance).clone(),
        }
    }

    /// Retrieves a pre-instantiated instance, if one was published.
    pub fn instance(&self, id: &MapId) -> Option<Arc<MapInstance>> {
        self.instances.get(id).map(|e| e.value().clone())
    }

    /// Drops the instance entry for an id. Part of explicit eviction.
    pub fn remove_instance(&self, id: &MapId) -> Option<Arc<MapInstance>> {
        self.instances.remove(id).map(|(_, v)| v)
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_is_idempotent_first_wins() {
        let store = TemplateStore::new();

        let mut first = MapTemplate::new("town", 32, 32, 10, 10);
        first.sounds.push("town-theme".to_string());
        let published = store.publish(first);

        // A later publication for the same id must not replace the original.
        let second = MapTemplate::new("town", 16, 16, 99, 99);
        let repeat = store.publish(second);

        assert!(Arc::ptr_eq(&published, &repeat));
        assert_eq!(repeat.tile_width, 32);
        assert_eq!(repeat.sounds, vec!["town-theme".to_string()]);
    }

    #[test]
    fn marker_lookup() {
        let mut template = MapTemplate::new("cave", 32, 32, 10, 10);
        template
            .markers
            .insert("start".to_string(), Position::new(48.0, 64.0));

        assert_eq!(template.marker("start"), Some(Position::new(48.0, 64.0)));
        assert_eq!(template.marker("exit"), None);
    }

    #[test]
    fn layer_snapshot_drops_collision_index() {
        let mut layer = TileLayer::new("ground", LayerKind::Tile, vec![1, 2, 3, 4]);
        layer.collision = vec![2];

        let snapshot = layer.to_snapshot();
        assert_eq!(snapshot.tiles, vec![1, 2, 3, 4]);

        let json = serde_json::to_value(&snapshot).expect("serializable");
        assert!(json.get("collision").is_none());
    }
}
