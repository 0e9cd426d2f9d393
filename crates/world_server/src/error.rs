//! Error types for the world server core.
//!
//! This module defines the failure modes of map resolution, the transition
//! protocol, and instance lifecycle management.

use atlas_event_system::{MapId, PlayerId};

/// Enumeration of possible world server errors.
///
/// `MapNotFound` is the one expected, non-fatal failure of a transition;
/// everything else indicates a misused API or a failing script.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The destination map id has no registered descriptor
    #[error("map '{0}' is not registered")]
    MapNotFound(MapId),

    /// The player id is not known to the room directory
    #[error("player {0} is not connected")]
    PlayerNotFound(PlayerId),

    /// A room was addressed that has no live instance
    #[error("map '{0}' has no live instance")]
    RoomNotFound(MapId),

    /// Eviction was refused because players are still resident
    #[error("map '{0}' still has {1} resident players")]
    InstanceBusy(MapId, usize),

    /// A lifecycle script hook failed; surfaces uncaught to the caller
    #[error("script hook '{hook}' failed: {message}")]
    Script {
        hook: &'static str,
        message: String,
    },

    /// An instance failed its internal load
    #[error("map '{id}' failed to load: {message}")]
    Load { id: MapId, message: String },
}

impl WorldError {
    /// Convenience constructor for script hook failures.
    pub fn script(hook: &'static str, message: impl Into<String>) -> Self {
        Self::Script {
            hook,
            message: message.into(),
        }
    }
}
