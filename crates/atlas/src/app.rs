//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that orchestrates world
//! bootstrap, startup logging, and graceful shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::{display_banner, setup_logging},
    signals::wait_for_shutdown,
};
use async_trait::async_trait;
use atlas_event_system::{
    HitboxRegion, HookBus, LayerKind, MapId, PlayerChangedMapEvent, PlayerId, Position, ShapeDef,
    TilesetRef, WorldHook,
};
use std::sync::Arc;
use tracing::info;
use world_server::{
    EventDef, EventScript, InstanceRegistry, MapDescriptor, MapInstance, MapScript, MapService,
    MapTemplate, Player, RoomDirectory, SharedPlayer, TemplateStore, TileLayer, WorldError,
};

/// The wired-up world: every injected registry plus the transition service.
pub struct WorldHandles {
    pub hooks: Arc<HookBus>,
    pub store: Arc<TemplateStore>,
    pub rooms: Arc<RoomDirectory>,
    pub registry: Arc<InstanceRegistry>,
    pub service: Arc<MapService>,
}

/// Main application struct.
///
/// Manages the complete lifecycle of the Atlas server: configuration
/// loading, world bootstrap, and graceful shutdown handling.
pub struct Application {
    config: AppConfig,
    world: WorldHandles,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, sets
    /// up logging, and bootstraps the world.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` ready to run, or an error if
    /// initialization failed.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }

        setup_logging(&config.logging, args.json_logs)?;
        display_banner();
        info!("Configuration loaded from {}", args.config_path.display());

        let world = bootstrap_world(&config).await;

        Ok(Self { config, world })
    }

    /// The wired world handles, for embedding Atlas into a larger host.
    pub fn world(&self) -> &WorldHandles {
        &self.world
    }

    /// Connects a player and moves them onto the world's entry map.
    pub async fn spawn_player(&self, name: impl Into<String>) -> Result<PlayerId, WorldError> {
        let handle = self.world.rooms.connect(Player::new(name));
        let player_id = handle.read().await.id;
        self.world
            .service
            .change_map(&MapId::from(ENTRY_MAP), player_id, None)
            .await?;
        Ok(player_id)
    }

    /// Runs the application until a shutdown signal arrives.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("World '{}' is up", self.config.server.world_name);
        for id in self.world.registry.map_ids() {
            info!("  map registered: '{}'", id);
        }
        info!("Transports attach through the room directory; press Ctrl+C to shut down");

        wait_for_shutdown().await?;

        let stats = self.world.hooks.get_stats().await;
        info!(
            "Final statistics: {} hook emissions, {} handler failures",
            stats.events_emitted, stats.handler_failures
        );
        info!("Atlas server shutdown complete");
        Ok(())
    }
}

/// Map id every fresh player starts on.
const ENTRY_MAP: &str = "plaza";

/// Wires store, rooms, registry, and service together around the built-in
/// world content and subscribes the startup observers to the hook bus.
pub async fn bootstrap_world(config: &AppConfig) -> WorldHandles {
    let hooks = Arc::new(HookBus::new());

    // Surface finished transitions in the server log.
    hooks
        .on(
            WorldHook::PlayerChangedMap,
            |event: PlayerChangedMapEvent| {
                info!(
                    "transition: player {} now on '{}'",
                    event.player_id, event.map_id
                );
                Ok(())
            },
        )
        .await
        .expect("Hook registration cannot fail on a fresh bus");

    let store = Arc::new(TemplateStore::new());
    let rooms = Arc::new(RoomDirectory::new());
    let registry = Arc::new(InstanceRegistry::new(
        default_world(),
        store.clone(),
        rooms.clone(),
    ));
    let service = Arc::new(MapService::with_config(
        registry.clone(),
        rooms.clone(),
        hooks.clone(),
        config.to_world_config(),
    ));

    WorldHandles {
        hooks,
        store,
        rooms,
        registry,
        service,
    }
}

/// The built-in bootstrap world: a single plaza map. Game content crates
/// replace this with their own descriptor set when embedding Atlas.
fn default_world() -> Vec<MapDescriptor> {
    let mut plaza = MapTemplate::new(ENTRY_MAP, 32, 32, 20, 15);
    plaza.tilesets.push(TilesetRef::new("plaza-tiles", "assets/plaza.png"));
    plaza
        .layers
        .push(TileLayer::new("ground", LayerKind::Tile, vec![1; 300]));
    plaza
        .layers
        .push(TileLayer::new("arches", LayerKind::Overhead, vec![0; 300]));
    plaza.shapes.push(ShapeDef::new(
        "notice-board",
        HitboxRegion::new(96.0, 64.0, 32.0, 32.0),
    ));
    plaza.events.push(EventDef::new("greeter"));
    plaza.sounds.push("plaza-ambience".to_string());
    plaza
        .markers
        .insert("start".to_string(), Position::new(320.0, 240.0));

    vec![MapDescriptor::new(plaza)
        .with_script(Arc::new(PlazaScript))
        .with_event_script("greeter", Arc::new(GreeterEvent))]
}

/// Lifecycle script of the plaza map.
struct PlazaScript;

#[async_trait]
impl MapScript for PlazaScript {
    async fn on_enter(
        &self,
        map: &MapInstance,
        player: &SharedPlayer,
        _prev: Option<&MapId>,
    ) -> Result<(), WorldError> {
        let name = player.read().await.name.clone();
        info!("'{}' entered map '{}'", name, map.id());
        Ok(())
    }
}

/// Greets every player whose transition instantiated the event.
struct GreeterEvent;

#[async_trait]
impl EventScript for GreeterEvent {
    async fn on_init(&self, player: &SharedPlayer) -> Result<(), WorldError> {
        let name = player.read().await.name.clone();
        info!("greeter waves at '{}'", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_server::SceneMessage;

    #[tokio::test(flavor = "multi_thread")]
    async fn bootstrap_registers_the_entry_map() {
        let world = bootstrap_world(&AppConfig::default()).await;
        assert!(world.registry.contains(&MapId::from(ENTRY_MAP)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_flows_from_transition_into_a_client_scene() {
        use world_client::{
            AssetError, AssetFetcher, MapScene, NullSoundPlayer, ResourceCache, SceneOptions,
            TilesetResource,
        };

        /// Resolves every request so the end-to-end path completes.
        struct StubFetcher;

        #[async_trait]
        impl AssetFetcher for StubFetcher {
            async fn fetch(
                &self,
                requests: &[TilesetRef],
            ) -> Result<Vec<TilesetResource>, AssetError> {
                Ok(requests
                    .iter()
                    .map(|r| TilesetResource {
                        name: r.name.clone(),
                        image: r.image.clone(),
                        width: 256,
                        height: 256,
                    })
                    .collect())
            }
        }

        let world = bootstrap_world(&AppConfig::default()).await;
        let handle = world.rooms.connect(Player::new("roundtrip"));
        let (player_id, mut outbox) = {
            let mut p = handle.write().await;
            (p.id, p.attach_outbox())
        };

        world
            .service
            .change_map(&MapId::from(ENTRY_MAP), player_id, None)
            .await
            .expect("Transition failed");

        let SceneMessage::LoadScene { snapshot, .. } =
            outbox.try_recv().expect("Snapshot delivered to outbox");

        let mut scene = MapScene::new(
            SceneOptions::default(),
            Arc::new(ResourceCache::new()),
            Arc::new(StubFetcher),
            Arc::new(NullSoundPlayer),
            world.hooks.clone(),
        );
        let viewport = scene.load(snapshot).await.expect("Scene load failed");

        assert_eq!(viewport.world_width, 640.0);
        assert_eq!(viewport.world_height, 480.0);
        assert!(scene.is_ready());
        assert_eq!(
            scene.game_map().map(|m| m.id.clone()),
            Some(MapId::from(ENTRY_MAP))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn spawned_player_lands_on_the_plaza_start_marker() {
        let world = bootstrap_world(&AppConfig::default()).await;

        let handle = world.rooms.connect(Player::new("visitor"));
        let player_id = handle.read().await.id;
        world
            .service
            .change_map(&MapId::from(ENTRY_MAP), player_id, None)
            .await
            .expect("Transition failed");

        let player = world.rooms.get_user(player_id).expect("Player vanished");
        let p = player.read().await;
        assert_eq!(p.map, Some(MapId::from(ENTRY_MAP)));
        assert_eq!(p.position, Position::new(320.0, 240.0));
        assert_eq!(p.events.len(), 1, "The greeter event is instantiated");

        let stats = world.hooks.get_stats().await;
        assert_eq!(stats.events_emitted, 1, "Transition notification emitted");
    }
}
