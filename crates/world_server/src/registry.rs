//! Lazy map instance resolution with a per-id single-flight guard.
//!
//! The naive check-then-construct sequence races: two players transitioning
//! into the same unseen map id could each construct an instance. The
//! registry closes that race with one `tokio::sync::OnceCell` per map id:
//! the first resolver runs the construction, concurrent resolvers await the
//! same cell, and every caller observes the same eventual instance.

use crate::error::WorldError;
use crate::instance::{MapDescriptor, MapInstance};
use crate::rooms::RoomDirectory;
use crate::template::TemplateStore;
use atlas_event_system::MapId;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Lazily creates and caches live map instances.
///
/// The descriptor set is fixed at construction; resolving an id outside it
/// is the expected [`WorldError::MapNotFound`] failure.
pub struct InstanceRegistry {
    descriptors: HashMap<MapId, MapDescriptor>,
    store: Arc<TemplateStore>,
    rooms: Arc<RoomDirectory>,
    cells: DashMap<MapId, Arc<OnceCell<Arc<MapInstance>>>>,
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("descriptors", &self.descriptors.len())
            .field("live_cells", &self.cells.len())
            .finish()
    }
}

impl InstanceRegistry {
    /// Builds a registry over a fixed set of map descriptors.
    pub fn new(
        descriptors: Vec<MapDescriptor>,
        store: Arc<TemplateStore>,
        rooms: Arc<RoomDirectory>,
    ) -> Self {
        let descriptors: HashMap<MapId, MapDescriptor> = descriptors
            .into_iter()
            .map(|d| (d.id().clone(), d))
            .collect();
        info!("Instance registry ready with {} maps", descriptors.len());
        Self {
            descriptors,
            store,
            rooms,
            cells: DashMap::new(),
        }
    }

    /// Whether a map id has a registered descriptor.
    pub fn contains(&self, id: &MapId) -> bool {
        self.descriptors.contains_key(id)
    }

    /// Ids of all registered maps.
    pub fn map_ids(&self) -> Vec<MapId> {
        self.descriptors.keys().cloned().collect()
    }

    /// Resolves the live instance for a map id, constructing it on first
    /// reference.
    ///
    /// Resolution order:
    /// 1. the registry's own instance cache (the single-flight cell);
    /// 2. an instance pre-instantiated elsewhere and published to the
    ///    template store;
    /// 3. fresh construction: publish the template, register the instance
    ///    with the room directory, run its internal load, cache it.
    ///
    /// Concurrent calls for the same unseen id converge on one construction.
    pub async fn resolve(&self, id: &MapId) -> Result<Arc<MapInstance>, WorldError> {
        let Some(descriptor) = self.descriptors.get(id) else {
            warn!("Map '{}' does not exist", id);
            return Err(WorldError::MapNotFound(id.clone()));
        };

        let cell = self
            .cells
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| async {
            if let Some(existing) = self.store.instance(id) {
                debug!("Adopting pre-instantiated map '{}'", id);
                return Ok(existing);
            }

            let template = self.store.publish(descriptor.template.clone());
            let instance = Arc::new(MapInstance::new(
                template,
                descriptor.script(),
                descriptor.event_scripts(),
            ));
            let instance = self.rooms.add_room(id.clone(), instance);
            instance.load().await?;
            self.store.publish_instance(instance.clone());
            Ok(instance)
        })
        .await
        .cloned()
    }

    /// Evicts the live instance for a map id.
    ///
    /// Explicit policy for the otherwise-unbounded instance lifetime:
    /// refuses while players are resident, otherwise clears the
    /// single-flight cell, the room entry, and the store's instance entry.
    /// The next resolve constructs a fresh instance.
    pub async fn evict(&self, id: &MapId) -> Result<(), WorldError> {
        let Some(instance) = self.rooms.room(id) else {
            self.cells.remove(id);
            self.store.remove_instance(id);
            return Ok(());
        };

        let residents = instance.member_count().await;
        if residents > 0 {
            return Err(WorldError::InstanceBusy(id.clone(), residents));
        }

        self.cells.remove(id);
        self.rooms.remove_room(id);
        self.store.remove_instance(id);
        info!("Evicted idle map instance '{}'", id);
        Ok(())
    }
}
