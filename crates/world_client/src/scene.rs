//! The map scene: snapshot consumption, asset loading, and readiness.
//!
//! [`MapScene::load`] consumes the snapshot a transition delivered, fetches
//! whatever tileset resources the shared cache is missing in one batch, and
//! only then publishes a ready render surface. The returned future settles
//! exactly once (resolve or reject, never both) and on the zero-asset
//! fast path it finishes without awaiting any completion signal.
//!
//! The frame loop calls [`MapScene::draw`] once per frame; it returns
//! immediately until the scene is ready. That flag is the suspension
//! boundary between frame-driven rendering and load-driven state
//! transitions.
//!
//! Cancellation is drop-the-future: abandoning `load` mid-fetch publishes
//! nothing, because finalization happens strictly after the fetch await.
//! No timeout is imposed; a stalled fetcher stalls readiness.

use crate::assets::{AssetFetcher, ResourceCache};
use crate::map::{GameMap, MapCache};
use crate::objects::RenderObject;
use crate::reconcile::apply_shape_diff;
use crate::sound::SoundPlayer;
use crate::viewport::Viewport;
use atlas_event_system::{
    current_timestamp, Event, HookBus, MapSnapshot, Position, ScenePartial, SceneLoadingEvent,
    SpriteAddedEvent, SpriteRemovedEvent, TilesetRef, WorldHook,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Errors from scene operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The scene has no loaded map yet
    #[error("scene has no loaded map")]
    NotLoaded,

    /// The batched asset fetch failed; no partial scene was published
    #[error(transparent)]
    Asset(#[from] crate::assets::AssetError),
}

/// Scene construction options.
#[derive(Debug, Clone)]
pub struct SceneOptions {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Standalone scenes skip publishing their map to the shared cache.
    pub standalone: bool,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            screen_width: 800,
            screen_height: 600,
            standalone: false,
        }
    }
}

/// The client's map scene.
///
/// Owns the local map copy, the viewport, and the id → render-object table.
/// All mutation goes through `&mut self`, matching the single-threaded
/// cooperative model of the frame loop.
pub struct MapScene {
    options: SceneOptions,
    resources: Arc<ResourceCache>,
    fetcher: Arc<dyn AssetFetcher>,
    sound: Arc<dyn SoundPlayer>,
    hooks: Arc<HookBus>,
    map_cache: Option<Arc<MapCache>>,
    game_map: Option<GameMap>,
    viewport: Option<Viewport>,
    objects: HashMap<String, RenderObject>,
    ready: bool,
    frames_drawn: u64,
}

impl std::fmt::Debug for MapScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapScene")
            .field("map", &self.game_map.as_ref().map(|m| m.id.clone()))
            .field("ready", &self.ready)
            .field("objects", &self.objects.len())
            .finish()
    }
}

impl MapScene {
    /// Creates an empty, not-yet-ready scene.
    pub fn new(
        options: SceneOptions,
        resources: Arc<ResourceCache>,
        fetcher: Arc<dyn AssetFetcher>,
        sound: Arc<dyn SoundPlayer>,
        hooks: Arc<HookBus>,
    ) -> Self {
        Self {
            options,
            resources,
            fetcher,
            sound,
            hooks,
            map_cache: None,
            game_map: None,
            viewport: None,
            objects: HashMap::new(),
            ready: false,
            frames_drawn: 0,
        }
    }

    /// Attaches the shared map cache the scene publishes into.
    pub fn with_map_cache(mut self, cache: Arc<MapCache>) -> Self {
        self.map_cache = Some(cache);
        self
    }

    /// Loads a scene from a transition snapshot.
    ///
    /// 1. Builds the local map copy (and publishes it to the shared map
    ///    cache unless the scene is standalone).
    /// 2. Computes the subset of tileset resources missing from the shared
    ///    resource cache and issues exactly one batched fetch for it; an
    ///    empty subset skips the fetch entirely.
    /// 3. Finalizes: swaps ambient audio, builds the viewport clamped to
    ///    world bounds, marks the scene ready.
    ///
    /// A fetch failure rejects without any finalization side effect.
    pub async fn load(&mut self, snapshot: MapSnapshot) -> Result<&Viewport, SceneError> {
        let map = GameMap::from_snapshot(&snapshot);

        if !self.options.standalone {
            if let Some(cache) = &self.map_cache {
                cache.insert(snapshot.clone());
            }
        }

        let missing: Vec<TilesetRef> = map
            .tilesets
            .iter()
            .filter(|t| !self.resources.contains(&t.name))
            .cloned()
            .collect();

        self.emit_hook(
            WorldHook::SceneLoading,
            &SceneLoadingEvent {
                map_id: map.id.clone(),
                pending_assets: missing.len(),
                timestamp: current_timestamp(),
            },
        )
        .await;

        if !missing.is_empty() {
            debug!(
                "Fetching {} tileset(s) for map '{}'",
                missing.len(),
                map.id
            );
            let fetched = self.fetcher.fetch(&missing).await?;
            for resource in fetched {
                self.resources.insert(resource);
            }
        }

        // Finalization. Nothing below suspends, so a dropped load can never
        // leave a half-published scene.
        self.sound.stop_all();
        let viewport = Viewport::new(
            self.options.screen_width,
            self.options.screen_height,
            map.world_width(),
            map.world_height(),
        );
        for sound_id in &snapshot.sounds {
            self.sound.play(sound_id);
        }
        debug!("Scene for map '{}' ready", map.id);
        self.game_map = Some(map);
        self.ready = true;
        self.frames_drawn = 0;
        Ok(self.viewport.insert(viewport))
    }

    /// Whether the scene has finished loading.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Frame-driven draw entry point.
    ///
    /// Returns `false` without doing any work until the scene is ready.
    pub fn draw(&mut self, _t: f64, _dt: f64, _frame: u64) -> bool {
        if !self.ready {
            return false;
        }
        self.frames_drawn += 1;
        true
    }

    /// Number of frames drawn since the scene became ready.
    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn game_map(&self) -> Option<&GameMap> {
        self.game_map.as_ref()
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn object(&self, id: &str) -> Option<&RenderObject> {
        self.objects.get(id)
    }

    /// Applies a partial update delivered after the initial snapshot.
    pub fn update_scene(&mut self, partial: &ScenePartial) -> Result<(), SceneError> {
        let map = self.game_map.as_mut().ok_or(SceneError::NotLoaded)?;
        if let Some(shapes) = &partial.shapes {
            apply_shape_diff(map, shapes);
        }
        Ok(())
    }

    /// Adds a render object to the scene.
    ///
    /// The object's size defaults to the map's tile dimensions. If it is the
    /// locally controlled player, the camera follows it. Notifies the hook
    /// system exactly once.
    pub async fn add_object(
        &mut self,
        id: impl Into<String>,
        current_player: bool,
    ) -> Result<(), SceneError> {
        let (map_id, tile_w, tile_h) = {
            let map = self.game_map.as_ref().ok_or(SceneError::NotLoaded)?;
            (map.id.clone(), map.tile_width, map.tile_height)
        };
        let id = id.into();

        let mut object = RenderObject::new(id.clone(), current_player);
        object.width = tile_w as f64;
        object.height = tile_h as f64;
        self.objects.insert(id.clone(), object);

        if current_player {
            if let Some(viewport) = &mut self.viewport {
                viewport.follow(id.clone());
            }
        }

        self.emit_hook(
            WorldHook::SpriteAdded,
            &SpriteAddedEvent {
                object_id: id,
                map_id,
                current_player,
                timestamp: current_timestamp(),
            },
        )
        .await;
        Ok(())
    }

    /// Removes a render object, detaching the camera if it was following
    /// it. Notifies the hook system exactly once. Unknown ids are a no-op.
    pub async fn remove_object(&mut self, id: &str) -> bool {
        let Some(map_id) = self.game_map.as_ref().map(|m| m.id.clone()) else {
            return false;
        };
        if self.objects.remove(id).is_none() {
            return false;
        }

        if let Some(viewport) = &mut self.viewport {
            if viewport.follow_target() == Some(id) {
                viewport.unfollow();
            }
        }

        self.emit_hook(
            WorldHook::SpriteRemoved,
            &SpriteRemovedEvent {
                object_id: id.to_string(),
                map_id,
                timestamp: current_timestamp(),
            },
        )
        .await;
        true
    }

    /// Moves a tracked object, keeping the camera centered on it when it is
    /// the follow target.
    pub fn set_object_position(&mut self, id: &str, position: Position) -> bool {
        let Some(object) = self.objects.get_mut(id) else {
            return false;
        };
        object.position = position;

        if let Some(viewport) = &mut self.viewport {
            if viewport.follow_target() == Some(id) {
                viewport.center_on(position);
            }
        }
        true
    }

    /// Recomputes an object's overlay tiles after it moved or was resized.
    ///
    /// The whole overlay set is cleared and rebuilt on every qualifying
    /// update. Non-qualifying updates (neither moved nor resized) leave the
    /// set untouched.
    pub fn update_object(&mut self, id: &str, moving: bool, resized: bool) -> Result<(), SceneError> {
        let (tile_w, tile_h) = {
            let map = self.game_map.as_ref().ok_or(SceneError::NotLoaded)?;
            (map.tile_width, map.tile_height)
        };
        let Some(object) = self.objects.get_mut(id) else {
            return Ok(());
        };
        if moving || resized {
            let (x, y, w, h) = object.bounds();
            object.overlay.recompute(x, y, w, h, tile_w, tile_h);
        }
        Ok(())
    }

    async fn emit_hook<T: Event>(&self, hook: WorldHook, payload: &T) {
        if let Err(e) = self.hooks.emit(hook, payload).await {
            warn!("Hook '{}' emission failed: {}", hook, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, TilesetResource};
    use crate::sound::NullSoundPlayer;
    use async_trait::async_trait;
    use atlas_event_system::{LayerKind, LayerSnapshot, MapId, ShapeDiff};
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn snapshot(tilesets: &[(&str, &str)]) -> MapSnapshot {
        MapSnapshot {
            id: MapId::from("town"),
            sounds: vec!["town-theme".to_string()],
            tile_width: 32,
            tile_height: 32,
            width: 20,
            height: 15,
            tilesets: tilesets
                .iter()
                .map(|(name, image)| TilesetRef::new(*name, *image))
                .collect(),
            layers: vec![LayerSnapshot {
                name: "ground".to_string(),
                kind: LayerKind::Tile,
                tiles: vec![0; 300],
            }],
        }
    }

    fn resource(name: &str) -> TilesetResource {
        TilesetResource {
            name: name.to_string(),
            image: format!("{name}.png"),
            width: 256,
            height: 256,
        }
    }

    /// Fetcher that records batches and returns a resource per request.
    struct CountingFetcher {
        calls: AtomicUsize,
        batches: Mutex<Vec<Vec<String>>>,
    }

    impl CountingFetcher {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                batches: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AssetFetcher for CountingFetcher {
        async fn fetch(
            &self,
            requests: &[TilesetRef],
        ) -> Result<Vec<TilesetResource>, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.batches
                .lock()
                .unwrap()
                .push(requests.iter().map(|r| r.name.clone()).collect());
            Ok(requests.iter().map(|r| resource(&r.name)).collect())
        }
    }

    /// Fetcher that never completes; any await on it stalls forever.
    struct PendingFetcher;

    #[async_trait]
    impl AssetFetcher for PendingFetcher {
        async fn fetch(
            &self,
            _requests: &[TilesetRef],
        ) -> Result<Vec<TilesetResource>, AssetError> {
            std::future::pending().await
        }
    }

    /// Fetcher that always fails.
    struct FailingFetcher;

    #[async_trait]
    impl AssetFetcher for FailingFetcher {
        async fn fetch(
            &self,
            requests: &[TilesetRef],
        ) -> Result<Vec<TilesetResource>, AssetError> {
            Err(AssetError::Fetch {
                name: requests[0].name.clone(),
                message: "connection reset".to_string(),
            })
        }
    }

    fn scene_with(fetcher: Arc<dyn AssetFetcher>, resources: Arc<ResourceCache>) -> MapScene {
        MapScene::new(
            SceneOptions {
                screen_width: 320,
                screen_height: 240,
                standalone: false,
            },
            resources,
            fetcher,
            Arc::new(NullSoundPlayer),
            Arc::new(HookBus::new()),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cached_assets_resolve_without_awaiting_any_fetch() {
        let resources = Arc::new(ResourceCache::new());
        resources.insert(resource("town-tiles"));

        // The fetcher can never complete; if the zero-asset path touched it
        // at all, load would hang and now_or_never would return None.
        let mut scene = scene_with(Arc::new(PendingFetcher), resources);
        let result = scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .now_or_never()
            .expect("Zero-asset load must settle within the same tick");

        assert!(result.is_ok());
        assert!(scene.is_ready());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_subset_is_fetched_in_exactly_one_batch() {
        let resources = Arc::new(ResourceCache::new());
        resources.insert(resource("town-tiles"));
        let fetcher = Arc::new(CountingFetcher::new());

        let mut scene = scene_with(fetcher.clone(), resources.clone());
        scene
            .load(snapshot(&[
                ("town-tiles", "town.png"),
                ("props", "props.png"),
                ("roofs", "roofs.png"),
            ]))
            .await
            .expect("Load failed");

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            fetcher.batches.lock().unwrap()[0],
            vec!["props".to_string(), "roofs".to_string()],
            "Exactly the uncached subset is requested"
        );
        assert!(resources.contains("props"));
        assert!(resources.contains("roofs"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_failure_rejects_without_partial_scene() {
        let resources = Arc::new(ResourceCache::new());
        let mut scene = scene_with(Arc::new(FailingFetcher), resources);

        let result = scene.load(snapshot(&[("town-tiles", "town.png")])).await;
        assert!(matches!(result, Err(SceneError::Asset(_))));
        assert!(!scene.is_ready());
        assert!(scene.viewport().is_none());
        assert!(scene.game_map().is_none());
        assert!(!scene.draw(0.0, 0.016, 1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn draw_is_gated_on_readiness() {
        let resources = Arc::new(ResourceCache::new());
        let mut scene = scene_with(Arc::new(CountingFetcher::new()), resources);

        assert!(!scene.draw(0.0, 0.016, 1));
        assert_eq!(scene.frames_drawn(), 0);

        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");

        assert!(scene.draw(0.016, 0.016, 2));
        assert_eq!(scene.frames_drawn(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn viewport_is_clamped_to_world_bounds() {
        let resources = Arc::new(ResourceCache::new());
        let mut scene = scene_with(Arc::new(CountingFetcher::new()), resources);
        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");

        let viewport = scene.viewport().expect("Viewport published");
        assert_eq!(viewport.world_width, 640.0);
        assert_eq!(viewport.world_height, 480.0);
        assert_eq!(viewport.screen_width, 320);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn loaded_map_is_published_to_shared_cache() {
        let resources = Arc::new(ResourceCache::new());
        let map_cache = Arc::new(MapCache::new());
        let mut scene = scene_with(Arc::new(CountingFetcher::new()), resources)
            .with_map_cache(map_cache.clone());

        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");

        assert!(map_cache.contains(&MapId::from("town")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn standalone_scene_skips_shared_cache() {
        let resources = Arc::new(ResourceCache::new());
        let map_cache = Arc::new(MapCache::new());
        let mut scene = MapScene::new(
            SceneOptions {
                screen_width: 320,
                screen_height: 240,
                standalone: true,
            },
            resources,
            Arc::new(CountingFetcher::new()),
            Arc::new(NullSoundPlayer),
            Arc::new(HookBus::new()),
        )
        .with_map_cache(map_cache.clone());

        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");

        assert!(!map_cache.contains(&MapId::from("town")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn object_lifecycle_notifies_hooks_and_drives_camera() {
        let resources = Arc::new(ResourceCache::new());
        let hooks = Arc::new(HookBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let log_add = log.clone();
        hooks
            .on(WorldHook::SpriteAdded, move |event: SpriteAddedEvent| {
                log_add
                    .lock()
                    .unwrap()
                    .push(format!("added:{}", event.object_id));
                Ok(())
            })
            .await
            .expect("Failed to register handler");
        let log_remove = log.clone();
        hooks
            .on(WorldHook::SpriteRemoved, move |event: SpriteRemovedEvent| {
                log_remove
                    .lock()
                    .unwrap()
                    .push(format!("removed:{}", event.object_id));
                Ok(())
            })
            .await
            .expect("Failed to register handler");

        let mut scene = MapScene::new(
            SceneOptions {
                screen_width: 320,
                screen_height: 240,
                standalone: false,
            },
            resources,
            Arc::new(CountingFetcher::new()),
            Arc::new(NullSoundPlayer),
            hooks,
        );
        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");

        scene.add_object("hero", true).await.expect("Add failed");
        assert_eq!(
            scene.viewport().and_then(|v| v.follow_target()),
            Some("hero"),
            "The camera follows the locally controlled player"
        );

        assert!(scene.remove_object("hero").await);
        assert!(scene.viewport().and_then(|v| v.follow_target()).is_none());
        assert!(!scene.remove_object("hero").await, "Second removal is a no-op");

        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["added:hero".to_string(), "removed:hero".to_string()],
            "Hooks fire once per add and once per remove"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn moving_the_followed_object_centers_the_camera() {
        let resources = Arc::new(ResourceCache::new());
        let mut scene = scene_with(Arc::new(CountingFetcher::new()), resources);
        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");
        scene.add_object("hero", true).await.expect("Add failed");

        assert!(scene.set_object_position("hero", Position::new(320.0, 240.0)));
        let viewport = scene.viewport().expect("Viewport published");
        assert_eq!(viewport.origin(), Position::new(160.0, 120.0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn qualifying_update_rebuilds_the_overlay_set() {
        let resources = Arc::new(ResourceCache::new());
        let mut scene = scene_with(Arc::new(CountingFetcher::new()), resources);
        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");
        scene.add_object("hero", true).await.expect("Add failed");

        // Tile-sized object on a tile boundary: one overlay tile.
        scene.set_object_position("hero", Position::new(64.0, 64.0));
        scene.update_object("hero", true, false).expect("Update failed");
        assert_eq!(scene.object("hero").unwrap().overlay.tiles().len(), 1);

        // A non-qualifying update leaves the set untouched.
        scene.set_object_position("hero", Position::new(96.0, 96.0));
        scene.update_object("hero", false, false).expect("Update failed");
        assert_eq!(scene.object("hero").unwrap().overlay.tiles().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn partial_update_reconciles_shapes() {
        let resources = Arc::new(ResourceCache::new());
        let mut scene = scene_with(Arc::new(CountingFetcher::new()), resources);
        scene
            .load(snapshot(&[("town-tiles", "town.png")]))
            .await
            .expect("Load failed");

        let mut shapes = ShapeDiff::new();
        shapes.insert(
            "door1".to_string(),
            Some(atlas_event_system::ShapePayload::new(
                atlas_event_system::HitboxRegion::new(32.0, 64.0, 16.0, 48.0),
            )),
        );
        scene
            .update_scene(&ScenePartial {
                shapes: Some(shapes),
            })
            .expect("Update failed");

        let map = scene.game_map().expect("Map loaded");
        assert!(map.shape("door1").is_some());
    }
}
