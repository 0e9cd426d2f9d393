//! # World Client - Scene Loading and Reconciliation
//!
//! The consuming half of the Atlas synchronization core. This crate turns a
//! transition snapshot into a ready render surface and keeps the local map
//! state converged with the server through incremental updates.
//!
//! ## Architecture Overview
//!
//! * **Scene Loader** - consumes a snapshot, batch-fetches missing tileset
//!   resources through the shared [`ResourceCache`], and publishes a ready
//!   [`Viewport`]; the zero-asset path finishes without awaiting anything
//! * **Shape Reconciler** - applies per-name add/update/remove diffs to the
//!   local [`GameMap`], idempotently
//! * **Overlay Recompute** - clear-and-rebuild overlay tile coverage of a
//!   moving object's bounding box
//! * **Render Objects** - id → object bookkeeping with camera follow and
//!   typed add/remove hook notifications
//!
//! ## Concurrency Model
//!
//! Single-threaded cooperative: the frame loop drives [`MapScene::draw`]
//! once per frame and skips all work until the loader has resolved. Asset
//! fetch is the only suspending operation; dropping an in-flight load
//! publishes nothing.

pub use assets::{AssetError, AssetFetcher, ResourceCache, TilesetResource};
pub use map::{GameMap, MapCache};
pub use objects::RenderObject;
pub use overlay::{OverlayState, OverlayTile};
pub use reconcile::apply_shape_diff;
pub use scene::{MapScene, SceneError, SceneOptions};
pub use sound::{NullSoundPlayer, SoundPlayer};
pub use viewport::Viewport;

pub mod assets;
pub mod map;
pub mod objects;
pub mod overlay;
pub mod reconcile;
pub mod scene;
pub mod sound;
pub mod viewport;
