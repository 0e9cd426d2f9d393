//! # Typed Hook Bus
//!
//! The hook bus carries notification-style hooks between the synchronization
//! core and outside observers (plugins, UI, tooling). Hook names form a
//! closed set, the [`WorldHook`] enum, and every hook has exactly one
//! payload type, so a handler can never be registered against a name that
//! does not exist.
//!
//! Dispatch is fire-and-forget: a failing handler is logged and counted but
//! never poisons the emitter or the remaining handlers. Lifecycle hooks whose
//! failures must abort an operation (map scripts, event scripts) are trait
//! methods on the server side instead, not bus traffic.

use crate::events::{Event, EventError, EventHandler, TypedEventHandler};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// The closed set of hooks the core emits.
///
/// Each variant is documented with the payload type it carries; emitting a
/// different type is a programming error surfaced by handler-side
/// deserialization failures in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldHook {
    /// A scene started loading ([`crate::SceneLoadingEvent`]).
    SceneLoading,
    /// A render object was added to the scene ([`crate::SpriteAddedEvent`]).
    SpriteAdded,
    /// A render object was removed from the scene ([`crate::SpriteRemovedEvent`]).
    SpriteRemoved,
    /// A player completed a map transition ([`crate::PlayerChangedMapEvent`]).
    PlayerChangedMap,
}

impl std::fmt::Display for WorldHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorldHook::SceneLoading => "scene_loading",
            WorldHook::SpriteAdded => "sprite_added",
            WorldHook::SpriteRemoved => "sprite_removed",
            WorldHook::PlayerChangedMap => "player_changed_map",
        };
        write!(f, "{name}")
    }
}

/// Statistics for monitoring bus activity.
#[derive(Debug, Clone, Default)]
pub struct HookBusStats {
    /// Total number of registered handlers across all hooks
    pub total_handlers: u64,
    /// Total number of hook emissions
    pub events_emitted: u64,
    /// Total number of handler invocations that returned an error
    pub handler_failures: u64,
}

/// The typed hook bus.
///
/// Uses a `DashMap` keyed by [`WorldHook`] for lock-free concurrent access to
/// handler lists; statistics sit behind an async `RwLock` for atomic updates.
pub struct HookBus {
    handlers: DashMap<WorldHook, Vec<Arc<dyn EventHandler>>>,
    stats: RwLock<HookBusStats>,
}

impl std::fmt::Debug for HookBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookBus")
            .field("hooks", &self.handlers.len())
            .finish()
    }
}

impl HookBus {
    /// Creates a new bus with no registered handlers.
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            stats: RwLock::new(HookBusStats::default()),
        }
    }

    /// Registers a typed handler for a hook.
    ///
    /// # Arguments
    ///
    /// * `hook` - The hook to listen on
    /// * `handler` - Function receiving the hook's payload type
    ///
    /// # Examples
    ///
    /// ```rust
    /// use atlas_event_system::{HookBus, WorldHook, SpriteAddedEvent};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let bus = HookBus::new();
    /// bus.on(WorldHook::SpriteAdded, |event: SpriteAddedEvent| {
    ///     println!("sprite {} appeared", event.object_id);
    ///     Ok(())
    /// })
    /// .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn on<T, F>(&self, hook: WorldHook, handler: F) -> Result<(), EventError>
    where
        T: Event + 'static,
        F: Fn(T) -> Result<(), EventError> + Send + Sync + Clone + 'static,
    {
        let name = format!("{}::{}", hook, T::type_name());
        let typed = Arc::new(TypedEventHandler::new(name, handler));
        self.handlers.entry(hook).or_default().push(typed);

        let mut stats = self.stats.write().await;
        stats.total_handlers += 1;
        debug!("Registered handler for hook '{}'", hook);
        Ok(())
    }

    /// Emits a payload to every handler registered for a hook.
    ///
    /// The payload is serialized once; each handler decodes its own copy.
    /// Handler failures are logged and counted, never propagated; emission
    /// succeeds as long as the payload serializes.
    pub async fn emit<T>(&self, hook: WorldHook, payload: &T) -> Result<(), EventError>
    where
        T: Event,
    {
        let data = payload.serialize()?;

        let targets: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .get(&hook)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        let mut failures = 0u64;
        for handler in &targets {
            if let Err(e) = handler.handle(&data).await {
                warn!(
                    "Handler '{}' failed for hook '{}': {}",
                    handler.handler_name(),
                    hook,
                    e
                );
                failures += 1;
            }
        }

        let mut stats = self.stats.write().await;
        stats.events_emitted += 1;
        stats.handler_failures += failures;
        Ok(())
    }

    /// Returns the number of handlers registered for a hook.
    pub fn handler_count(&self, hook: WorldHook) -> usize {
        self.handlers.get(&hook).map(|e| e.value().len()).unwrap_or(0)
    }

    /// Gets the current bus statistics.
    pub async fn get_stats(&self) -> HookBusStats {
        self.stats.read().await.clone()
    }
}

impl Default for HookBus {
    fn default() -> Self {
        Self::new()
    }
}
