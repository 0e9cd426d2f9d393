//! Server-side player record.
//!
//! The core mutates a small set of player fields during a transition: the
//! current and previous map ids, the event list, and the size/hitbox fields
//! that default from the destination map's tile dimensions. Everything else
//! about a player belongs to game logic outside this crate.

use crate::instance::ScriptedEvent;
use atlas_event_system::{MapId, MapSnapshot, PlayerId, Position};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::trace;

/// Kind tag for scenes delivered to a client. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneKind {
    Map,
}

/// Message pushed into a player's scene outbox.
///
/// The outbox stands in for the external messaging layer: a transport drains
/// the receiver and forwards payloads to the actual client connection.
#[derive(Debug, Clone)]
pub enum SceneMessage {
    LoadScene {
        kind: SceneKind,
        snapshot: MapSnapshot,
    },
}

/// Player hitbox dimensions with explicit optionality.
///
/// `None` means "not yet set"; the transition protocol fills unset fields
/// from the destination map's tile dimensions and never overwrites a set one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Hitbox {
    pub w: Option<u32>,
    pub h: Option<u32>,
}

/// The server's record of a connected player.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Map the player currently occupies.
    pub map: Option<MapId>,
    /// Map the player occupied before the last transition.
    pub prev_map: Option<MapId>,
    pub position: Position,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub hitbox: Hitbox,
    /// Scripted events owned by the current transition context. Cleared at
    /// the start of every transition.
    pub events: Vec<ScriptedEvent>,
    outbox: Option<mpsc::UnboundedSender<SceneMessage>>,
}

/// Shared handle to a player record.
///
/// The room directory owns the canonical handle; joining a room re-homes it,
/// so references taken before a join go stale and must be re-fetched.
pub type SharedPlayer = Arc<RwLock<Player>>;

impl Player {
    /// Creates a fresh player with no map, no size, and no outbox.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(),
            name: name.into(),
            map: None,
            prev_map: None,
            position: Position::default(),
            width: None,
            height: None,
            hitbox: Hitbox::default(),
            events: Vec::new(),
            outbox: None,
        }
    }

    /// Attaches a scene outbox and returns the receiving half.
    ///
    /// The transport layer holds the receiver; the transition protocol pushes
    /// one `LoadScene` message per successful transition.
    pub fn attach_outbox(&mut self) -> mpsc::UnboundedReceiver<SceneMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbox = Some(tx);
        rx
    }

    /// Delivers a scene to the player's client.
    ///
    /// Fire-and-forget: a missing or closed outbox drops the message, which
    /// is the disconnected-client case.
    pub fn load_scene(&self, kind: SceneKind, snapshot: MapSnapshot) {
        match &self.outbox {
            Some(tx) => {
                if tx.send(SceneMessage::LoadScene { kind, snapshot }).is_err() {
                    trace!("Scene outbox for player {} is closed", self.id);
                }
            }
            None => trace!("Player {} has no scene outbox attached", self.id),
        }
    }

    /// Moves the player to a world position.
    pub fn teleport(&mut self, position: Position) {
        self.position = position;
    }
}
