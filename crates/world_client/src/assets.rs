//! Tileset resource cache and the batched asset fetch seam.
//!
//! The scene loader computes the subset of tileset images not already
//! present in the shared [`ResourceCache`] and issues exactly one batched
//! [`AssetFetcher::fetch`] for that subset. When the subset is empty no
//! fetch is issued at all; the zero-asset fast path must not wait for any
//! completion signal.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Errors from the asset pipeline.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// A batched fetch failed; no resources from the batch are usable
    #[error("asset fetch failed for '{name}': {message}")]
    Fetch { name: String, message: String },
}

/// A loaded tileset image resource.
///
/// Pixel data stays with the rendering surface; the core tracks the
/// descriptor it needs for cache membership and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilesetResource {
    /// Cache key, matching the template's tileset name.
    pub name: String,
    /// Image locator the resource was fetched from.
    pub image: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

/// Shared, process-wide cache of loaded tileset resources.
///
/// Constructed once and injected into every scene; a resource fetched for
/// one scene is reused by every later scene referencing the same tileset.
pub struct ResourceCache {
    resources: DashMap<String, Arc<TilesetResource>>,
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("resources", &self.resources.len())
            .finish()
    }
}

impl ResourceCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            resources: DashMap::new(),
        }
    }

    /// Whether a tileset is already loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Inserts a loaded resource under its name.
    pub fn insert(&self, resource: TilesetResource) {
        self.resources
            .insert(resource.name.clone(), Arc::new(resource));
    }

    /// Looks up a loaded resource.
    pub fn get(&self, name: &str) -> Option<Arc<TilesetResource>> {
        self.resources.get(name).map(|e| e.value().clone())
    }

    /// Number of loaded resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Seam to the platform's asset loading.
///
/// Implementations fetch every requested tileset in one batch. A failure
/// fails the whole batch; the scene loader rejects without partial
/// finalization.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(
        &self,
        requests: &[atlas_event_system::TilesetRef],
    ) -> Result<Vec<TilesetResource>, AssetError>;
}
