//! # Atlas Event System
//!
//! Shared foundation of the Atlas synchronization core: the identifier and
//! wire types exchanged between the server and client halves, and the typed
//! hook bus through which the core notifies outside observers.
//!
//! ## Components
//!
//! * **Types** - [`PlayerId`], [`MapId`], geometry, shapes, and the
//!   [`MapSnapshot`]/[`ShapeDiff`] wire shapes
//! * **Events** - the [`Event`] trait with JSON serialization, handler
//!   abstractions, and one payload struct per hook
//! * **Hook Bus** - [`HookBus`], keyed by the closed [`WorldHook`] enum
//!
//! ## Design Principles
//!
//! Hook names are a closed set of enum variants with one payload type each;
//! there is no ad hoc string-keyed emission. Bus dispatch is notification
//! semantics: a failing handler is logged, never propagated. Operations
//! whose hook failures must abort (map lifecycle scripts) are trait calls in
//! `world_server`, not bus traffic.

pub mod events;
pub mod system;
pub mod types;
pub mod utils;

pub use events::{
    Event, EventError, EventHandler, PlayerChangedMapEvent, SceneLoadingEvent, SpriteAddedEvent,
    SpriteRemovedEvent, TypedEventHandler,
};
pub use system::{HookBus, HookBusStats, WorldHook};
pub use types::{
    HitboxRegion, LayerKind, LayerSnapshot, MapId, MapSnapshot, PlayerId, Position, ScenePartial,
    Shape, ShapeDef, ShapeDiff, ShapePayload, TilesetRef,
};
pub use utils::current_timestamp;
