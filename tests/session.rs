use std::sync::Arc;

use glam::Vec2;

use survivor_sim::game::components::*;
use survivor_sim::game::movement::{FixedInput, OrbitInput};
use survivor_sim::game::presentation::{CameraTarget, EntityKind, RecordingUi, UiSignal};
use survivor_sim::{Collaborators, Game, GameConfig};

fn quiet_config() -> GameConfig {
    let mut config = GameConfig::default();
    // Keep spawns far away and rare so they do not interfere.
    config.spawner.interval = 1000.0;
    config.spawner.distance = 50.0;
    config
}

fn game(config: GameConfig) -> (Game, Arc<RecordingUi>, Arc<CameraTarget>) {
    let ui = Arc::new(RecordingUi::new());
    let camera = Arc::new(CameraTarget::new());
    let collaborators = Collaborators {
        input: Arc::new(FixedInput(Vec2::ZERO)),
        ui: ui.clone(),
        camera: camera.clone(),
        physics: None,
    };
    (Game::new(config, collaborators).unwrap(), ui, camera)
}

fn count_with<T: 'static>(game: &Game) -> usize {
    let world = game.world();
    let query = world.query().with::<T>().build().unwrap();
    world.count(&query).unwrap()
}

#[test]
fn gem_pickup_counts_once_and_refreshes_ui_once() {
    let (mut game, ui, _) = game(quiet_config());
    let gem_template = game.prefabs().gem;
    let gem = game.world_mut().instantiate(gem_template).unwrap();
    game.world_mut().attach(gem, Transform::at(Vec2::new(0.2, 0.0))).unwrap();

    game.tick().unwrap();

    let player = game.player();
    assert_eq!(game.world().cloned::<GemCollectedCount>(player), Some(GemCollectedCount(1)));
    assert!(!game.world().is_alive(gem));
    assert!(!game.world().is_enabled::<UpdateGemUiFlag>(player));
    assert_eq!(ui.signals(), vec![UiSignal::GemCount(1)]);

    game.tick().unwrap();
    assert_eq!(ui.signals(), vec![UiSignal::GemCount(1)]);
}

#[test]
fn player_death_ends_the_session_once() {
    let mut config = quiet_config();
    config.player.hit_points = 1;
    let (mut game, ui, _) = game(config);
    let enemy_template = game.prefabs().enemy;
    let enemy = game.world_mut().instantiate(enemy_template).unwrap();
    game.world_mut().attach(enemy, Transform::at(Vec2::new(0.3, 0.0))).unwrap();

    game.tick().unwrap();

    assert!(game.is_over());
    assert!(!game.world().is_alive(game.player()));
    assert_eq!(count_with::<PlayerTag>(&game), 0);
    assert_eq!(ui.game_overs(), 1);

    for _ in 0..5 {
        game.tick().unwrap();
    }
    assert_eq!(ui.game_overs(), 1);
    assert_eq!(game.run(100).unwrap(), 0);
}

#[test]
fn destroyed_enemy_drops_a_gem_next_tick() {
    let (mut game, _, _) = game(quiet_config());
    let enemy_template = game.prefabs().enemy;
    let enemy = game.world_mut().instantiate(enemy_template).unwrap();
    game.world_mut().attach(enemy, Transform::at(Vec2::new(5.0, 5.0))).unwrap();
    game.world_mut().set_enabled::<DestroyFlag>(enemy, true).unwrap();

    game.tick().unwrap();
    assert!(!game.world().is_alive(enemy));
    assert_eq!(count_with::<EnemyTag>(&game), 0);
    assert_eq!(count_with::<GemTag>(&game), 0);

    game.tick().unwrap();
    let snapshot = game.snapshot().unwrap();
    let gems: Vec<_> = snapshot.of_kind(EntityKind::Gem).collect();
    assert_eq!(gems.len(), 1);
    assert!(gems[0].transform.position.distance(Vec2::new(5.0, 5.0)) < 0.1);
}

#[test]
fn camera_follows_the_player() {
    let mut config = quiet_config();
    config.player.move_speed = 6.0;
    let ui = Arc::new(RecordingUi::new());
    let camera = Arc::new(CameraTarget::new());
    let collaborators = Collaborators {
        input: Arc::new(FixedInput(Vec2::X)),
        ui,
        camera: camera.clone(),
        physics: None,
    };
    let mut game = Game::new(config, collaborators).unwrap();
    assert_eq!(camera.get(), None);

    for _ in 0..60 {
        game.tick().unwrap();
    }
    let player = game.world().cloned::<Transform>(game.player()).unwrap();
    assert_eq!(camera.get(), Some(player.position));
    assert!((player.position.x - 6.0).abs() < 1e-3);
    assert_eq!(
        game.world().cloned::<PlayerAnimation>(game.player()),
        Some(PlayerAnimation(AnimationIndex::Movement))
    );
    assert_eq!(game.world().cloned::<FacingDirection>(game.player()), Some(FacingDirection(1.0)));
}

#[test]
fn sessions_are_reproducible_across_worker_counts() {
    let run = |threads: usize| {
        let mut config = GameConfig::default();
        config.simulation.worker_threads = threads;
        config.spawner.seed = 11;
        let collaborators = Collaborators {
            input: Arc::new(OrbitInput { period: 240 }),
            ui: Arc::new(RecordingUi::new()),
            ..Collaborators::default()
        };
        let mut game = Game::new(config, collaborators).unwrap();
        game.run(600).unwrap();
        game.snapshot().unwrap()
    };

    let single = run(1);
    let many = run(4);
    assert!(single.entities.len() > 1);
    assert_eq!(single, many);
}
