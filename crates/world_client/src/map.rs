//! Client-held map state.
//!
//! [`GameMap`] is the local, mutable copy of a map built from the server's
//! snapshot. The shape set starts from whatever the first diff delivers and
//! is reconciled incrementally afterwards; geometry and layers never change
//! after load.

use atlas_event_system::{LayerSnapshot, MapId, MapSnapshot, Shape, TilesetRef};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Local, mutable copy of the map a scene is displaying.
#[derive(Debug, Clone)]
pub struct GameMap {
    pub id: MapId,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    pub tilesets: Vec<TilesetRef>,
    pub layers: Vec<LayerSnapshot>,
    shapes: HashMap<String, Shape>,
}

impl GameMap {
    /// Builds the local copy from a transition snapshot.
    pub fn from_snapshot(snapshot: &MapSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            tile_width: snapshot.tile_width,
            tile_height: snapshot.tile_height,
            width: snapshot.width,
            height: snapshot.height,
            tilesets: snapshot.tilesets.clone(),
            layers: snapshot.layers.clone(),
            shapes: HashMap::new(),
        }
    }

    /// World width in pixels.
    pub fn world_width(&self) -> f64 {
        (self.width * self.tile_width) as f64
    }

    /// World height in pixels.
    pub fn world_height(&self) -> f64 {
        (self.height * self.tile_height) as f64
    }

    /// All shapes currently known to this map.
    pub fn get_shapes(&self) -> &HashMap<String, Shape> {
        &self.shapes
    }

    /// Looks up a shape by name.
    pub fn shape(&self, name: &str) -> Option<&Shape> {
        self.shapes.get(name)
    }

    /// Mutable access to a shape by name.
    pub fn shape_mut(&mut self, name: &str) -> Option<&mut Shape> {
        self.shapes.get_mut(name)
    }

    /// Inserts a shape under its name.
    pub fn create_shape(&mut self, shape: Shape) {
        self.shapes.insert(shape.name.clone(), shape);
    }

    /// Removes a shape by name; an absent name is a no-op.
    pub fn remove_shape(&mut self, name: &str) -> Option<Shape> {
        self.shapes.remove(name)
    }
}

/// Shared cache of loaded map definitions.
///
/// A scene publishes its snapshot here (unless running standalone) so other
/// client subsystems can consult map geometry without holding the scene.
pub struct MapCache {
    snapshots: DashMap<MapId, Arc<MapSnapshot>>,
}

impl std::fmt::Debug for MapCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapCache")
            .field("maps", &self.snapshots.len())
            .finish()
    }
}

impl MapCache {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
        }
    }

    pub fn insert(&self, snapshot: MapSnapshot) {
        self.snapshots
            .insert(snapshot.id.clone(), Arc::new(snapshot));
    }

    pub fn get(&self, id: &MapId) -> Option<Arc<MapSnapshot>> {
        self.snapshots.get(id).map(|e| e.value().clone())
    }

    pub fn contains(&self, id: &MapId) -> bool {
        self.snapshots.contains_key(id)
    }
}

impl Default for MapCache {
    fn default() -> Self {
        Self::new()
    }
}
