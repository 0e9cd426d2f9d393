//! Screen-sized camera clamped to the map's world bounds.

use atlas_event_system::Position;

/// The scene's camera: a screen-sized window into world space, clamped so
/// it never shows past the map edge, optionally following one object.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub screen_width: u32,
    pub screen_height: u32,
    pub world_width: f64,
    pub world_height: f64,
    /// Top-left corner in world coordinates.
    x: f64,
    y: f64,
    follow: Option<String>,
}

impl Viewport {
    /// Creates a viewport at the world origin.
    pub fn new(screen_width: u32, screen_height: u32, world_width: f64, world_height: f64) -> Self {
        Self {
            screen_width,
            screen_height,
            world_width,
            world_height,
            x: 0.0,
            y: 0.0,
            follow: None,
        }
    }

    /// Attaches the camera to an object id; [`Viewport::center_on`] keeps it
    /// in view as the object moves.
    pub fn follow(&mut self, object_id: impl Into<String>) {
        self.follow = Some(object_id.into());
    }

    /// Detaches the camera from its follow target.
    pub fn unfollow(&mut self) {
        self.follow = None;
    }

    /// The object id the camera is following, if any.
    pub fn follow_target(&self) -> Option<&str> {
        self.follow.as_deref()
    }

    /// Centers the view on a world position, clamped to world bounds.
    pub fn center_on(&mut self, position: Position) {
        let half_w = self.screen_width as f64 / 2.0;
        let half_h = self.screen_height as f64 / 2.0;
        self.x = clamp_axis(position.x - half_w, self.world_width, self.screen_width as f64);
        self.y = clamp_axis(position.y - half_h, self.world_height, self.screen_height as f64);
    }

    /// Top-left corner of the view in world coordinates.
    pub fn origin(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

fn clamp_axis(value: f64, world: f64, screen: f64) -> f64 {
    let max = (world - screen).max(0.0);
    value.clamp(0.0, max)
}
