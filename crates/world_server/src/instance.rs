//! Live map instances and their lifecycle scripts.
//!
//! A [`MapInstance`] is one active deployment of a map template: the shape
//! set instantiated at load time (independently mutable afterwards), the
//! resident player membership, and the script implementing the map's
//! lifecycle hooks. Instances are created lazily by the registry and are
//! reachable only through the room directory entry once registered: no
//! component holds a second independent mutable reference, so the state
//! behind the locks has a single logical writer.
//!
//! Lifecycle hooks are named trait methods forming a closed set. A hook
//! failure is not recovered here; it surfaces to whoever drove the
//! operation.

use crate::error::WorldError;
use crate::player::SharedPlayer;
use crate::template::{EventDef, MapTemplate};
use async_trait::async_trait;
use atlas_event_system::{MapId, MapSnapshot, PlayerId, Shape, ShapeDef};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// How a scripted event was instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventMode {
    /// Instantiated for one player's transition context.
    Scenario,
    /// Instantiated once for the whole instance.
    Shared,
}

/// Lifecycle hooks of a map. All default to no-ops.
///
/// `on_leave`/`on_leave_map` fire on the instance being left, in that order;
/// `on_enter`/`on_join_map` fire on the destination, in that order, after
/// the player joined its room. Errors abort the running transition.
#[async_trait]
pub trait MapScript: Send + Sync {
    /// Called once when the instance finishes its internal load.
    async fn on_load(&self, _map: &MapInstance) -> Result<(), WorldError> {
        Ok(())
    }

    async fn on_enter(
        &self,
        _map: &MapInstance,
        _player: &SharedPlayer,
        _prev: Option<&MapId>,
    ) -> Result<(), WorldError> {
        Ok(())
    }

    async fn on_join_map(&self, _map: &MapInstance) -> Result<(), WorldError> {
        Ok(())
    }

    async fn on_leave(&self, _map: &MapInstance, _player: &SharedPlayer) -> Result<(), WorldError> {
        Ok(())
    }

    async fn on_leave_map(&self, _map: &MapInstance) -> Result<(), WorldError> {
        Ok(())
    }
}

/// Behavior of a scripted event. Defaults to a no-op.
#[async_trait]
pub trait EventScript: Send + Sync {
    /// Called once per instantiation, right after the event was assigned to
    /// a player's event list.
    async fn on_init(&self, _player: &SharedPlayer) -> Result<(), WorldError> {
        Ok(())
    }
}

/// Script with no behavior; the default for maps and events without one.
pub struct NoopScript;

#[async_trait]
impl MapScript for NoopScript {}

#[async_trait]
impl EventScript for NoopScript {}

/// A runtime-instantiated event, derived fresh from the template's raw
/// definitions each time a player enters the map.
#[derive(Clone)]
pub struct ScriptedEvent {
    pub name: String,
    pub mode: EventMode,
    script: Arc<dyn EventScript>,
}

impl std::fmt::Debug for ScriptedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedEvent")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .finish()
    }
}

impl ScriptedEvent {
    /// Dispatches the event's `on_init` hook.
    pub async fn init(&self, player: &SharedPlayer) -> Result<(), WorldError> {
        self.script.on_init(player).await
    }
}

/// Everything needed to deploy instances of one map id: the template plus
/// the scripts attached to the map and its events.
#[derive(Clone)]
pub struct MapDescriptor {
    pub template: MapTemplate,
    script: Arc<dyn MapScript>,
    event_scripts: HashMap<String, Arc<dyn EventScript>>,
}

impl std::fmt::Debug for MapDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapDescriptor")
            .field("id", &self.template.id)
            .field("event_scripts", &self.event_scripts.len())
            .finish()
    }
}

impl MapDescriptor {
    /// Wraps a template with no-op scripts.
    pub fn new(template: MapTemplate) -> Self {
        Self {
            template,
            script: Arc::new(NoopScript),
            event_scripts: HashMap::new(),
        }
    }

    /// Attaches the map's lifecycle script.
    pub fn with_script(mut self, script: Arc<dyn MapScript>) -> Self {
        self.script = script;
        self
    }

    /// Attaches a script for one named event definition.
    pub fn with_event_script(
        mut self,
        name: impl Into<String>,
        script: Arc<dyn EventScript>,
    ) -> Self {
        self.event_scripts.insert(name.into(), script);
        self
    }

    pub fn id(&self) -> &MapId {
        &self.template.id
    }

    pub(crate) fn script(&self) -> Arc<dyn MapScript> {
        self.script.clone()
    }

    pub(crate) fn event_scripts(&self) -> HashMap<String, Arc<dyn EventScript>> {
        self.event_scripts.clone()
    }
}

/// Mutable live state for one active deployment of a map id.
pub struct MapInstance {
    template: Arc<MapTemplate>,
    script: Arc<dyn MapScript>,
    event_scripts: HashMap<String, Arc<dyn EventScript>>,
    shapes: RwLock<HashMap<String, Shape>>,
    members: RwLock<HashSet<PlayerId>>,
    loaded: AtomicBool,
}

impl std::fmt::Debug for MapInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapInstance")
            .field("id", &self.template.id)
            .field("loaded", &self.loaded.load(Ordering::SeqCst))
            .finish()
    }
}

impl MapInstance {
    /// Creates an unloaded instance over a published template.
    pub fn new(
        template: Arc<MapTemplate>,
        script: Arc<dyn MapScript>,
        event_scripts: HashMap<String, Arc<dyn EventScript>>,
    ) -> Self {
        Self {
            template,
            script,
            event_scripts,
            shapes: RwLock::new(HashMap::new()),
            members: RwLock::new(HashSet::new()),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &MapId {
        &self.template.id
    }

    pub fn template(&self) -> &Arc<MapTemplate> {
        &self.template
    }

    pub fn tile_width(&self) -> u32 {
        self.template.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.template.tile_height
    }

    /// Ambient sound ids active on this instance.
    pub fn sounds(&self) -> &[String] {
        &self.template.sounds
    }

    /// Performs the instance's internal asynchronous load: instantiates the
    /// shape set from the template definitions and notifies the script.
    /// Idempotent; repeat calls return immediately.
    pub async fn load(&self) -> Result<(), WorldError> {
        if self.loaded.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        {
            let mut shapes = self.shapes.write().await;
            for def in &self.template.shapes {
                shapes.insert(def.name.clone(), Shape::from_def(def));
            }
        }

        self.script.on_load(self).await?;
        info!(
            "Map instance '{}' loaded ({} shapes, {} event defs)",
            self.template.id,
            self.template.shapes.len(),
            self.template.events.len()
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Shapes
    // ------------------------------------------------------------------

    /// Returns a snapshot copy of the instance's shape set.
    pub async fn get_shapes(&self) -> HashMap<String, Shape> {
        self.shapes.read().await.clone()
    }

    /// Creates (or replaces) a shape from a definition.
    pub async fn create_shape(&self, def: &ShapeDef) -> Shape {
        let shape = Shape::from_def(def);
        self.shapes
            .write()
            .await
            .insert(shape.name.clone(), shape.clone());
        shape
    }

    /// Removes a shape by name. Returns whether it existed.
    pub async fn remove_shape(&self, name: &str) -> bool {
        self.shapes.write().await.remove(name).is_some()
    }

    // ------------------------------------------------------------------
    // Membership
    // ------------------------------------------------------------------

    pub(crate) async fn join(&self, player_id: PlayerId) {
        self.members.write().await.insert(player_id);
    }

    pub(crate) async fn leave(&self, player_id: PlayerId) -> bool {
        self.members.write().await.remove(&player_id)
    }

    /// Whether the player is currently resident on this instance.
    pub async fn has_member(&self, player_id: PlayerId) -> bool {
        self.members.read().await.contains(&player_id)
    }

    /// Number of resident players.
    pub async fn member_count(&self) -> usize {
        self.members.read().await.len()
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Instantiates scripted events from the template's raw definitions, in
    /// definition order. Definitions without a registered script get a no-op.
    pub fn create_events(&self, mode: EventMode) -> Vec<ScriptedEvent> {
        self.create_events_from(&self.template.events, mode)
    }

    /// Instantiates scripted events from explicit raw definitions.
    pub fn create_events_from(&self, defs: &[EventDef], mode: EventMode) -> Vec<ScriptedEvent> {
        defs.iter()
            .map(|def| ScriptedEvent {
                name: def.name.clone(),
                mode,
                script: self
                    .event_scripts
                    .get(&def.name)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(NoopScript)),
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Lifecycle hooks
    // ------------------------------------------------------------------

    pub async fn on_enter(
        &self,
        player: &SharedPlayer,
        prev: Option<&MapId>,
    ) -> Result<(), WorldError> {
        self.script.on_enter(self, player, prev).await
    }

    pub async fn on_join_map(&self) -> Result<(), WorldError> {
        self.script.on_join_map(self).await
    }

    pub async fn on_leave(&self, player: &SharedPlayer) -> Result<(), WorldError> {
        self.script.on_leave(self, player).await
    }

    pub async fn on_leave_map(&self) -> Result<(), WorldError> {
        self.script.on_leave_map(self).await
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Builds the client-facing snapshot: template data minus shape and
    /// event definitions, layers minus their server-internal back-references,
    /// plus the instance sound list and map id.
    pub fn snapshot(&self) -> MapSnapshot {
        let t = &self.template;
        debug!("Building snapshot for map '{}'", t.id);
        MapSnapshot {
            id: t.id.clone(),
            sounds: t.sounds.clone(),
            tile_width: t.tile_width,
            tile_height: t.tile_height,
            width: t.width,
            height: t.height,
            tilesets: t.tilesets.clone(),
            layers: t.layers.iter().map(|l| l.to_snapshot()).collect(),
        }
    }
}
