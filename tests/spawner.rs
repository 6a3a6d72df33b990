use glam::Vec2;

use survivor_sim::game::components::*;
use survivor_sim::game::spawner::{next_spawn, spawn_offset, SpawnerSystem};
use survivor_sim::{Entity, Template, World};

mod common;
use common::*;

fn arena(seed: u64, interval: f32) -> (World, Entity) {
    let mut world = world();
    let bolt = bolt_template(&mut world);
    player(&mut world, Vec2::new(3.0, -2.0), 10, bolt);
    let grunt = world.register_template(
        Template::new("grunt").with(EnemyTag).with(Transform::default()),
    );
    let spawner = world.spawn().unwrap();
    world
        .attach(spawner, SpawnerData { template: grunt, interval, distance: 10.0 })
        .unwrap();
    world.attach(spawner, SpawnerState::seeded(seed)).unwrap();
    (world, spawner)
}

fn enemy_positions(world: &World) -> Vec<Vec2> {
    let query = world.query().with::<EnemyTag>().with::<Transform>().build().unwrap();
    world
        .iter(&query)
        .unwrap()
        .filter_map(|e| world.cloned::<Transform>(e))
        .map(|t| t.position)
        .collect()
}

#[test]
fn first_tick_spawns_and_resets_countdown() {
    let (mut world, spawner) = arena(7, 2.0);

    let buffers = run_once(&world, &SpawnerSystem, at(1.0 / 60.0)).unwrap();
    assert_eq!(world.get::<SpawnerState>(spawner).unwrap().countdown, 2.0);
    apply(&mut world, buffers);

    let positions = enemy_positions(&world);
    assert_eq!(positions.len(), 1);
    assert!((positions[0].distance(Vec2::new(3.0, -2.0)) - 10.0).abs() < 1e-4);

    let buffers = run_once(&world, &SpawnerSystem, at(2.0 / 60.0)).unwrap();
    assert!(buffers.is_empty());
}

#[test]
fn same_seed_and_deltas_reproduce_positions() {
    let deltas = [0.4_f32, 0.7, 0.1, 1.3, 0.25, 0.9, 0.6, 0.05, 1.1, 0.5];
    let run = |seed| {
        let (mut world, _) = arena(seed, 0.5);
        let mut elapsed = 0.0;
        for (tick, &delta) in deltas.iter().enumerate() {
            elapsed += f64::from(delta);
            let time = survivor_sim::Time { elapsed, delta, tick: tick as u64 + 1 };
            let buffers = run_once(&world, &SpawnerSystem, time).unwrap();
            apply(&mut world, buffers);
        }
        enemy_positions(&world)
    };

    let first = run(42);
    let second = run(42);
    assert!(first.len() > 3);
    assert_eq!(first, second);
    assert_ne!(first, run(43));
}

#[test]
fn angles_stay_in_range() {
    let (world, spawner) = arena(3, 0.1);
    let data = world.cloned::<SpawnerData>(spawner).unwrap();
    let mut state = SpawnerState::seeded(3);
    for _ in 0..200 {
        if let Some(angle) = next_spawn(&mut state, &data, 0.1) {
            assert!((0.0..std::f32::consts::TAU).contains(&angle));
            assert!((spawn_offset(angle, data.distance).length() - 10.0).abs() < 1e-3);
        }
    }
}

#[test]
fn spawner_waits_for_a_player() {
    let mut world = world();
    let grunt = world.register_template(Template::new("grunt").with(EnemyTag));
    let spawner = world.spawn().unwrap();
    world
        .attach(spawner, SpawnerData { template: grunt, interval: 1.0, distance: 5.0 })
        .unwrap();
    world.attach(spawner, SpawnerState::seeded(1)).unwrap();

    let buffers = run_once(&world, &SpawnerSystem, at(0.1)).unwrap();
    assert!(buffers.is_empty());
    assert_eq!(world.get::<SpawnerState>(spawner).unwrap().countdown, 0.0);
}
