//! # Core Type Definitions
//!
//! This module contains the fundamental types shared between the server and
//! client halves of the Atlas synchronization core.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Unique identifier for players in the world
//! - [`MapId`] - Identifier for a map definition and its live instances
//! - [`Position`] - 2D world-space position
//! - [`Shape`] - A named rectangular region with free-form metadata
//! - [`MapSnapshot`] - The client-facing projection of a map sent at transition time
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent ID confusion (PlayerId vs MapId)
//! - **Explicit Optionality**: Optional fields are `Option`, never presence-checked bags
//! - **Serialization**: Wire types support JSON serialization for network transmission

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a player in the world.
///
/// This is a wrapper around UUID that provides type safety and ensures
/// player IDs cannot be confused with other kinds of IDs in the system.
///
/// # Examples
///
/// ```rust
/// use atlas_event_system::PlayerId;
///
/// let player_id = PlayerId::new();
/// println!("Player ID: {}", player_id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Creates a new random player ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a player ID from a string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - A string slice containing a valid UUID
    ///
    /// # Returns
    ///
    /// Returns `Ok(PlayerId)` if the string is a valid UUID, otherwise
    /// `Err(uuid::Error)` with details about the parsing failure.
    pub fn from_str(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::str::FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s)
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a map definition.
///
/// Map ids are human-readable keys (`"town"`, `"cave"`) chosen by world
/// content. One id names both the immutable template and any live instance
/// deployed from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MapId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MapId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// A 2D position in world coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculates the Euclidean distance to another position.
    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A rectangular hit region: top-left corner plus extent.
///
/// This is the fully-typed form of the wire `hitbox` object carried by
/// shape payloads (`{ pos: { x, y }, w, h }`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitboxRegion {
    pub pos: Position,
    pub w: f64,
    pub h: f64,
}

impl HitboxRegion {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            pos: Position::new(x, y),
            w,
            h,
        }
    }
}

// ============================================================================
// Shapes
// ============================================================================

/// A named rectangular region of a map with free-form metadata.
///
/// Shapes are unique by name within a map instance. They are created at
/// instance load time from template definitions, or on the client when a
/// diff first mentions an unseen name. Updates mutate the existing entry in
/// place; the shape's identity (and any locally accumulated `properties`)
/// survives the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Extended metadata attached after creation. Never replaced by diffs.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Shape {
    /// Builds a shape from a template-side definition.
    pub fn from_def(def: &ShapeDef) -> Self {
        Self {
            name: def.name.clone(),
            x: def.hitbox.pos.x,
            y: def.hitbox.pos.y,
            width: def.hitbox.w,
            height: def.hitbox.h,
            properties: def.properties.clone(),
        }
    }

    /// Builds a fresh shape from an incremental payload, deriving top-level
    /// position and size from the payload's hitbox region. Extended metadata
    /// starts empty.
    pub fn from_payload(name: impl Into<String>, payload: &ShapePayload) -> Self {
        Self {
            name: name.into(),
            x: payload.hitbox.pos.x,
            y: payload.hitbox.pos.y,
            width: payload.hitbox.w,
            height: payload.hitbox.h,
            properties: serde_json::Map::new(),
        }
    }

    /// Applies an incremental payload to this shape in place, preserving its
    /// identity and extended metadata.
    pub fn apply_payload(&mut self, payload: &ShapePayload) {
        self.x = payload.hitbox.pos.x;
        self.y = payload.hitbox.pos.y;
        self.width = payload.hitbox.w;
        self.height = payload.hitbox.h;
    }
}

/// Template-side shape definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeDef {
    pub name: String,
    pub hitbox: HitboxRegion,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl ShapeDef {
    pub fn new(name: impl Into<String>, hitbox: HitboxRegion) -> Self {
        Self {
            name: name.into(),
            hitbox,
            properties: serde_json::Map::new(),
        }
    }
}

/// Incremental shape payload as carried by a scene diff.
///
/// Anything beyond the hitbox is preserved verbatim in `extra` so unknown
/// producer fields survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePayload {
    pub hitbox: HitboxRegion,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ShapePayload {
    pub fn new(hitbox: HitboxRegion) -> Self {
        Self {
            hitbox,
            extra: serde_json::Map::new(),
        }
    }
}

/// Wire mapping from shape name to either a payload or an explicit removal
/// marker (`null` on the wire, `None` here).
pub type ShapeDiff = HashMap<String, Option<ShapePayload>>;

/// Partial scene update delivered after the initial snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenePartial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shapes: Option<ShapeDiff>,
}

// ============================================================================
// Snapshot wire types
// ============================================================================

/// Reference to a tileset image resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilesetRef {
    /// Cache key for the tileset, unique within a world.
    pub name: String,
    /// Image resource locator handed to the asset fetcher.
    pub image: String,
}

impl TilesetRef {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

/// Rendering role of a map layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    /// Drawn beneath moving objects.
    Tile,
    /// Drawn above moving objects (roofs, tree tops).
    Overhead,
}

/// A map layer as it crosses the wire: name, role, and tile indices.
///
/// The server-side layer additionally carries a collision index; that
/// back-reference never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSnapshot {
    pub name: String,
    pub kind: LayerKind,
    pub tiles: Vec<u32>,
}

/// The client-facing projection of a map template, sent once per transition.
///
/// Shape and scripted-event definitions are stripped; the instance's ambient
/// sound list and the map id are attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSnapshot {
    pub id: MapId,
    pub sounds: Vec<String>,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    pub tilesets: Vec<TilesetRef>,
    pub layers: Vec<LayerSnapshot>,
}

impl MapSnapshot {
    /// World width in pixels.
    pub fn world_width(&self) -> f64 {
        (self.width * self.tile_width) as f64
    }

    /// World height in pixels.
    pub fn world_height(&self) -> f64 {
        (self.height * self.tile_height) as f64
    }
}
