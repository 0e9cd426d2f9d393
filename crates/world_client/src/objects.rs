//! Render objects tracked by a scene.

use crate::overlay::OverlayState;
use atlas_event_system::Position;

/// A scene-tracked render object: one sprite-backed entity with a position,
/// a bounding box, and its overlay tile set.
#[derive(Debug, Clone)]
pub struct RenderObject {
    pub id: String,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    /// Whether this object represents the locally controlled player.
    pub current_player: bool,
    pub overlay: OverlayState,
}

impl RenderObject {
    pub fn new(id: impl Into<String>, current_player: bool) -> Self {
        Self {
            id: id.into(),
            position: Position::default(),
            width: 0.0,
            height: 0.0,
            current_player,
            overlay: OverlayState::default(),
        }
    }

    /// Axis-aligned bounding box as (x, y, width, height).
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (self.position.x, self.position.y, self.width, self.height)
    }
}
