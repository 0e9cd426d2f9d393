//! # Event Traits and Hook Payloads
//!
//! Core event infrastructure for the typed hook bus: the fundamental
//! [`Event`] trait, handler abstractions, and the payload structs for every
//! client-side hook the core can emit.
//!
//! ## Design Principles
//!
//! - **Type Safety**: Every hook carries a strongly typed payload
//! - **Serialization**: Built-in JSON serialization for dispatch and logging
//! - **Closed Set**: Hook names are enum variants, never ad hoc strings

use crate::types::{MapId, PlayerId};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    any::{Any, TypeId},
    fmt::Debug,
};

// ============================================================================
// Event Traits and Core Infrastructure
// ============================================================================

/// Errors that can occur while dispatching events through the hook bus.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The payload could not be serialized for dispatch
    #[error("Serialization failed: {0}")]
    Serialization(serde_json::Error),

    /// A handler could not decode the payload it was given
    #[error("Deserialization failed: {0}")]
    Deserialization(serde_json::Error),

    /// A handler reported a failure of its own
    #[error("Handler failed: {0}")]
    HandlerFailed(String),
}

/// Core trait that all hook payloads implement.
///
/// Provides serialization for dispatch, type identification for routing, and
/// dynamic typing support for generic handlers. Any `Serialize +
/// DeserializeOwned + Send + Sync + Debug` type gets this for free through
/// the blanket implementation.
pub trait Event: Send + Sync + Any + Debug {
    /// Returns a stable type name for this payload, used in logs.
    fn type_name() -> &'static str
    where
        Self: Sized;

    /// Serializes the payload for dispatch.
    fn serialize(&self) -> Result<Vec<u8>, EventError>;

    /// Deserializes a payload from dispatch bytes.
    fn deserialize(data: &[u8]) -> Result<Self, EventError>
    where
        Self: Sized;

    /// Returns this payload as `&dyn Any` for runtime downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl<T> Event for T
where
    T: Serialize + DeserializeOwned + Send + Sync + Any + Debug + 'static,
{
    fn type_name() -> &'static str {
        std::any::type_name::<T>()
    }

    fn serialize(&self) -> Result<Vec<u8>, EventError> {
        serde_json::to_vec(self).map_err(|e| {
            tracing::error!(
                "Event serialization failed for type '{}': {}",
                Self::type_name(),
                e
            );
            EventError::Serialization(e)
        })
    }

    fn deserialize(data: &[u8]) -> Result<Self, EventError> {
        serde_json::from_slice(data).map_err(|e| {
            tracing::error!(
                "Event deserialization failed for type '{}': {} ({} bytes)",
                Self::type_name(),
                e,
                data.len()
            );
            EventError::Deserialization(e)
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handler trait for processing hook payloads.
///
/// Abstracts over the type-specific handling logic so the bus can store
/// heterogeneous handlers behind one interface. Most users go through
/// [`TypedEventHandler`] rather than implementing this directly.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static + Debug {
    /// Handles a payload from serialized data.
    async fn handle(&self, data: &[u8]) -> Result<(), EventError>;

    /// Returns the TypeId of the payload type this handler expects.
    fn expected_type_id(&self) -> TypeId;

    /// Returns a human-readable name for this handler for debugging.
    fn handler_name(&self) -> &str;
}

/// Type-safe wrapper bridging a payload type to the generic handler trait.
pub struct TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    handler: F,
    name: String,
    _phantom: std::marker::PhantomData<T>,
}

impl<T, F> std::fmt::Debug for TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedEventHandler")
            .field("name", &self.name)
            .finish()
    }
}

impl<T, F> TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync,
{
    /// Creates a new typed handler with a human-readable name.
    pub fn new(name: String, handler: F) -> Self {
        Self {
            handler,
            name,
            _phantom: std::marker::PhantomData,
        }
    }
}

#[async_trait]
impl<T, F> EventHandler for TypedEventHandler<T, F>
where
    T: Event,
    F: Fn(T) -> Result<(), EventError> + Send + Sync + Clone + 'static,
{
    async fn handle(&self, data: &[u8]) -> Result<(), EventError> {
        let event = T::deserialize(data)?;
        (self.handler)(event)
    }

    fn expected_type_id(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Client Hook Payloads
// ============================================================================

/// Emitted when a scene begins loading, before any asset fetch is issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneLoadingEvent {
    /// Map being loaded
    pub map_id: MapId,
    /// Number of tileset resources that still need to be fetched
    pub pending_assets: usize,
    /// Unix timestamp when loading began
    pub timestamp: u64,
}

/// Emitted once each time a render object is added to the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteAddedEvent {
    /// Scene-unique identifier of the object
    pub object_id: String,
    /// Map the scene is displaying
    pub map_id: MapId,
    /// Whether this object represents the locally controlled player
    pub current_player: bool,
    /// Unix timestamp when the object was added
    pub timestamp: u64,
}

/// Emitted once each time a render object is removed from the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpriteRemovedEvent {
    /// Scene-unique identifier of the object
    pub object_id: String,
    /// Map the scene is displaying
    pub map_id: MapId,
    /// Unix timestamp when the object was removed
    pub timestamp: u64,
}

/// Emitted when a player finishes a map transition on the server side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerChangedMapEvent {
    /// The player that moved
    pub player_id: PlayerId,
    /// Map the player left, if any
    pub previous_map: Option<MapId>,
    /// Map the player now occupies
    pub map_id: MapId,
    /// Unix timestamp when the transition completed
    pub timestamp: u64,
}
