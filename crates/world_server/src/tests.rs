
// Include tests
#[cfg(test)]
mod tests {
    use crate::*;
    use async_trait::async_trait;
    use atlas_event_system::{
        HitboxRegion, HookBus, LayerKind, MapId, Position, ShapeDef, TilesetRef,
    };
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Map script that records every hook dispatch and counts loads.
    struct RecordingScript {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        loads: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MapScript for RecordingScript {
        async fn on_load(&self, _map: &MapInstance) -> Result<(), WorldError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:on_load", self.label));
            Ok(())
        }

        async fn on_enter(
            &self,
            _map: &MapInstance,
            _player: &SharedPlayer,
            prev: Option<&MapId>,
        ) -> Result<(), WorldError> {
            self.log.lock().unwrap().push(format!(
                "{}:on_enter({})",
                self.label,
                prev.map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "none".to_string())
            ));
            Ok(())
        }

        async fn on_join_map(&self, _map: &MapInstance) -> Result<(), WorldError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:on_join_map", self.label));
            Ok(())
        }

        async fn on_leave(
            &self,
            _map: &MapInstance,
            _player: &SharedPlayer,
        ) -> Result<(), WorldError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:on_leave", self.label));
            Ok(())
        }

        async fn on_leave_map(&self, _map: &MapInstance) -> Result<(), WorldError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:on_leave_map", self.label));
            Ok(())
        }
    }

    /// Event script that records its initialization.
    struct RecordingEvent {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventScript for RecordingEvent {
        async fn on_init(&self, _player: &SharedPlayer) -> Result<(), WorldError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("event:{}:on_init", self.name));
            Ok(())
        }
    }

    struct Fixture {
        rooms: Arc<RoomDirectory>,
        registry: Arc<InstanceRegistry>,
        service: MapService,
        log: Arc<Mutex<Vec<String>>>,
        loads: Arc<AtomicUsize>,
    }

    fn town_template() -> MapTemplate {
        let mut t = MapTemplate::new("town", 32, 32, 20, 15);
        t.tilesets.push(TilesetRef::new("town-tiles", "town.png"));
        t.layers
            .push(TileLayer::new("ground", LayerKind::Tile, vec![0; 300]));
        t.markers
            .insert("start".to_string(), Position::new(64.0, 64.0));
        t
    }

    fn cave_template() -> MapTemplate {
        let mut t = MapTemplate::new("cave", 16, 16, 40, 30);
        t.tilesets.push(TilesetRef::new("cave-tiles", "cave.png"));
        t.layers
            .push(TileLayer::new("rock", LayerKind::Tile, vec![0; 1200]));
        t.shapes.push(ShapeDef::new(
            "door1",
            HitboxRegion::new(0.0, 0.0, 16.0, 32.0),
        ));
        t.events.push(EventDef::new("chest"));
        t.events.push(EventDef::new("guardian"));
        t.sounds.push("cave-drip".to_string());
        t.markers
            .insert("start".to_string(), Position::new(48.0, 64.0));
        t
    }

    fn build_world(evict_empty: bool) -> Fixture {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loads = Arc::new(AtomicUsize::new(0));

        let town = MapDescriptor::new(town_template()).with_script(Arc::new(RecordingScript {
            label: "town",
            log: log.clone(),
            loads: loads.clone(),
        }));
        let cave = MapDescriptor::new(cave_template())
            .with_script(Arc::new(RecordingScript {
                label: "cave",
                log: log.clone(),
                loads: loads.clone(),
            }))
            .with_event_script(
                "chest",
                Arc::new(RecordingEvent {
                    name: "chest",
                    log: log.clone(),
                }),
            )
            .with_event_script(
                "guardian",
                Arc::new(RecordingEvent {
                    name: "guardian",
                    log: log.clone(),
                }),
            );

        let store = Arc::new(TemplateStore::new());
        let rooms = Arc::new(RoomDirectory::new());
        let registry = Arc::new(InstanceRegistry::new(vec![town, cave], store, rooms.clone()));
        let service = MapService::with_config(
            registry.clone(),
            rooms.clone(),
            Arc::new(HookBus::new()),
            WorldConfig {
                start_marker: "start".to_string(),
                evict_empty_instances: evict_empty,
            },
        );

        Fixture {
            rooms,
            registry,
            service,
            log,
            loads,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_resolution_yields_exactly_one_instance() {
        let world = build_world(false);

        let resolves = (0..16).map(|_| {
            let registry = world.registry.clone();
            async move { registry.resolve(&MapId::from("cave")).await }
        });
        let results = join_all(resolves).await;

        let first = results[0].as_ref().expect("Resolution failed").clone();
        for result in &results {
            let instance = result.as_ref().expect("Resolution failed");
            assert!(
                Arc::ptr_eq(&first, instance),
                "All concurrent resolvers must observe the same instance"
            );
        }
        assert_eq!(
            world.loads.load(Ordering::SeqCst),
            1,
            "Exactly one construction may run for one map id"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_transitions_converge_on_one_instance() {
        let world = build_world(false);
        let a = world.rooms.connect(Player::new("alice")).read().await.id;
        let b = world.rooms.connect(Player::new("bob")).read().await.id;

        let cave = MapId::from("cave");
        let (ra, rb) = tokio::join!(
            world.service.change_map(&cave, a, None),
            world.service.change_map(&cave, b, None),
        );

        let ia = ra.expect("Transition for alice failed");
        let ib = rb.expect("Transition for bob failed");
        assert!(Arc::ptr_eq(&ia, &ib));
        assert!(ia.has_member(a).await);
        assert!(ia.has_member(b).await);
        assert_eq!(world.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn change_map_moves_player_between_rooms() {
        let world = build_world(false);
        let player_id = world.rooms.connect(Player::new("wanderer")).read().await.id;

        let town = MapId::from("town");
        let cave = MapId::from("cave");

        world
            .service
            .change_map(&town, player_id, None)
            .await
            .expect("Transition into town failed");
        world
            .service
            .change_map(&cave, player_id, None)
            .await
            .expect("Transition into cave failed");

        let player = world.rooms.get_user(player_id).expect("Player vanished");
        let p = player.read().await;
        assert_eq!(p.map, Some(cave.clone()));
        assert_eq!(p.prev_map, Some(town.clone()));
        assert_eq!(p.events.len(), 2, "Events come from cave's definitions");
        assert_eq!(p.events[0].name, "chest");
        assert_eq!(p.events[1].name, "guardian");
        assert!(matches!(p.events[0].mode, EventMode::Scenario));
        drop(p);

        let town_room = world.rooms.room(&town).expect("Town room missing");
        let cave_room = world.rooms.room(&cave).expect("Cave room missing");
        assert!(!town_room.has_member(player_id).await);
        assert!(cave_room.has_member(player_id).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn change_map_positions_at_start_marker() {
        let world = build_world(false);
        let player_id = world.rooms.connect(Player::new("spelunker")).read().await.id;

        world
            .service
            .change_map(&MapId::from("cave"), player_id, None)
            .await
            .expect("Transition failed");

        let player = world.rooms.get_user(player_id).expect("Player vanished");
        assert_eq!(player.read().await.position, Position::new(48.0, 64.0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn change_map_honors_explicit_position() {
        let world = build_world(false);
        let player_id = world.rooms.connect(Player::new("teleporter")).read().await.id;

        world
            .service
            .change_map(
                &MapId::from("cave"),
                player_id,
                Some(Position::new(200.0, 120.0)),
            )
            .await
            .expect("Transition failed");

        let player = world.rooms.get_user(player_id).expect("Player vanished");
        assert_eq!(player.read().await.position, Position::new(200.0, 120.0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn change_map_defaults_dimensions_only_when_unset() {
        let world = build_world(false);
        let handle = world.rooms.connect(Player::new("sized"));
        let player_id = {
            let mut p = handle.write().await;
            p.width = Some(99);
            p.id
        };

        world
            .service
            .change_map(&MapId::from("cave"), player_id, None)
            .await
            .expect("Transition failed");

        let player = world.rooms.get_user(player_id).expect("Player vanished");
        let p = player.read().await;
        assert_eq!(p.width, Some(99), "Set fields are never overwritten");
        assert_eq!(p.height, Some(16), "Unset fields default to tile height");
        assert_eq!(p.hitbox.w, Some(16));
        assert_eq!(p.hitbox.h, Some(16));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_map_aborts_before_membership_and_hooks() {
        let world = build_world(false);
        let player_id = world.rooms.connect(Player::new("lost")).read().await.id;

        let town = MapId::from("town");
        world
            .service
            .change_map(&town, player_id, None)
            .await
            .expect("Transition into town failed");
        let hook_count_before = world.log.lock().unwrap().len();

        let result = world
            .service
            .change_map(&MapId::from("nonexistent"), player_id, None)
            .await;
        assert!(matches!(result, Err(WorldError::MapNotFound(_))));

        // Beyond the field reset, nothing happened: still resident in town,
        // no leave hooks fired.
        let town_room = world.rooms.room(&town).expect("Town room missing");
        assert!(town_room.has_member(player_id).await);
        assert_eq!(world.log.lock().unwrap().len(), hook_count_before);

        let player = world.rooms.get_user(player_id).expect("Player vanished");
        let p = player.read().await;
        assert_eq!(p.prev_map, Some(town));
        assert!(p.events.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn hooks_dispatch_in_protocol_order() {
        let world = build_world(false);
        let player_id = world.rooms.connect(Player::new("orderly")).read().await.id;

        world
            .service
            .change_map(&MapId::from("town"), player_id, None)
            .await
            .expect("Transition into town failed");
        world.log.lock().unwrap().clear();

        world
            .service
            .change_map(&MapId::from("cave"), player_id, None)
            .await
            .expect("Transition into cave failed");

        let log = world.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "town:on_leave".to_string(),
                "town:on_leave_map".to_string(),
                "cave:on_load".to_string(),
                "cave:on_enter(town)".to_string(),
                "cave:on_join_map".to_string(),
                "event:chest:on_init".to_string(),
                "event:guardian:on_init".to_string(),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn snapshot_is_delivered_once_with_definitions_stripped() {
        let world = build_world(false);
        let handle = world.rooms.connect(Player::new("viewer"));
        let (player_id, mut outbox) = {
            let mut p = handle.write().await;
            (p.id, p.attach_outbox())
        };

        world
            .service
            .change_map(&MapId::from("cave"), player_id, None)
            .await
            .expect("Transition failed");

        let message = outbox.try_recv().expect("Exactly one scene expected");
        let SceneMessage::LoadScene { kind, snapshot } = message;
        assert!(matches!(kind, SceneKind::Map));
        assert_eq!(snapshot.id, MapId::from("cave"));
        assert_eq!(snapshot.sounds, vec!["cave-drip".to_string()]);
        assert_eq!(snapshot.tile_width, 16);
        assert_eq!(snapshot.layers.len(), 1);

        // The wire form carries no shape or event definitions at all.
        let wire = serde_json::to_value(&snapshot).expect("Snapshot serializes");
        assert!(wire.get("shapes").is_none());
        assert!(wire.get("events").is_none());

        assert!(outbox.try_recv().is_err(), "Only one scene per transition");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn join_rehomes_the_canonical_player_handle() {
        let world = build_world(false);
        let stale = world.rooms.connect(Player::new("rehomed"));
        let player_id = stale.read().await.id;

        world
            .service
            .change_map(&MapId::from("cave"), player_id, None)
            .await
            .expect("Transition failed");

        let canonical = world.rooms.get_user(player_id).expect("Player vanished");
        assert!(
            !Arc::ptr_eq(&stale, &canonical),
            "Joining a room re-homes the canonical handle"
        );
        // Post-join mutations landed on the canonical record only.
        assert_eq!(
            canonical.read().await.position,
            Position::new(48.0, 64.0)
        );
        assert_eq!(stale.read().await.position, Position::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn eviction_refuses_while_occupied_then_clears() {
        let world = build_world(false);
        let player_id = world.rooms.connect(Player::new("resident")).read().await.id;

        let cave = MapId::from("cave");
        world
            .service
            .change_map(&cave, player_id, None)
            .await
            .expect("Transition failed");

        let busy = world.registry.evict(&cave).await;
        assert!(matches!(busy, Err(WorldError::InstanceBusy(_, 1))));

        // Move the resident away, then eviction succeeds and the next
        // resolve constructs a fresh instance.
        world
            .service
            .change_map(&MapId::from("town"), player_id, None)
            .await
            .expect("Transition failed");
        world.registry.evict(&cave).await.expect("Eviction failed");
        assert!(world.rooms.room(&cave).is_none());

        world
            .registry
            .resolve(&cave)
            .await
            .expect("Re-resolution failed");
        assert_eq!(world.loads.load(Ordering::SeqCst), 3, "town + cave + fresh cave");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn emptied_previous_map_is_auto_evicted_when_enabled() {
        let world = build_world(true);
        let player_id = world.rooms.connect(Player::new("drifter")).read().await.id;

        let town = MapId::from("town");
        world
            .service
            .change_map(&town, player_id, None)
            .await
            .expect("Transition into town failed");
        world
            .service
            .change_map(&MapId::from("cave"), player_id, None)
            .await
            .expect("Transition into cave failed");

        assert!(
            world.rooms.room(&town).is_none(),
            "Town emptied by the transition and was evicted"
        );
    }
}
