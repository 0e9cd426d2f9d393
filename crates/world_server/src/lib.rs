//! # World Server - Map Synchronization Core
//!
//! The authoritative server half of the Atlas synchronization core. This
//! crate decides which map a player occupies, how map state is instantiated
//! and shared, and what the client is told about it.
//!
//! ## Architecture Overview
//!
//! * **Template Store** - process-wide, read-only cache of parsed map
//!   definitions, published once per id and injected everywhere it is needed
//! * **Instance Registry** - lazy construction of live map instances with a
//!   per-id single-flight guard: concurrent first access converges on one
//!   instance, never two
//! * **Room Directory** - the grouping of players onto live instances, with
//!   canonical player handles that are re-homed on room join
//! * **Transition Protocol** - the ordered ten-step `change_map` sequence
//!   driving hooks, snapshot delivery, membership, and positioning
//!
//! ## Concurrency Model
//!
//! Everything runs on the cooperative tokio scheduler. Map resolution, hook
//! dispatch, and directory operations are asynchronous, but instance
//! construction for a given id happens at most once in flight; instance
//! state has a single logical writer once the instance is registered.
//!
//! ## Error Handling
//!
//! [`WorldError::MapNotFound`] is the one expected, non-fatal transition
//! failure. Hook errors are never caught by the protocol; they surface to
//! the caller with earlier steps' mutations intact, which is a documented
//! partial-failure state.

pub use error::WorldError;
pub use instance::{
    EventMode, EventScript, MapDescriptor, MapInstance, MapScript, NoopScript, ScriptedEvent,
};
pub use player::{Hitbox, Player, SceneKind, SceneMessage, SharedPlayer};
pub use registry::InstanceRegistry;
pub use rooms::RoomDirectory;
pub use template::{EventDef, MapTemplate, TemplateStore, TileLayer};
pub use transition::{MapService, WorldConfig};

pub mod error;
pub mod instance;
pub mod player;
pub mod registry;
pub mod rooms;
pub mod template;
pub mod transition;

mod tests;
