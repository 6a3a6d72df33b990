use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use survivor_sim::game::collision::{default_resolvers, dispatch, CollisionDispatchSystem};
use survivor_sim::game::components::*;
use survivor_sim::game::damage::{resolve_damage, DamageResolutionSystem};
use survivor_sim::game::physics::{CollisionEvent, CollisionEvents, EventKind};
use survivor_sim::Entity;

mod common;
use common::*;

fn collision(a: Entity, b: Entity) -> CollisionEvent {
    CollisionEvent { a, b, kind: EventKind::Collision }
}

fn trigger(a: Entity, b: Entity) -> CollisionEvent {
    CollisionEvent { a, b, kind: EventKind::Trigger }
}

#[test]
fn enemy_contact_damages_player_and_starts_cooldown() {
    let mut world = world();
    let bolt = bolt_template(&mut world);
    let player = player(&mut world, Vec2::ZERO, 10, bolt);
    let enemy = enemy(&mut world, Vec2::new(0.5, 0.0), 5, 3, 1.0);

    let stats = dispatch(&world, 4.0, &[collision(player, enemy)], &default_resolvers()).unwrap();
    assert_eq!(stats.resolved, 1);
    resolve_damage(&world).unwrap();

    assert_eq!(hp(&world, player), 7);
    assert!(world.is_enabled::<EnemyCooldownExpiration>(enemy));
    assert_eq!(world.cloned::<EnemyCooldownExpiration>(enemy), Some(EnemyCooldownExpiration(5.0)));
    assert!(!world.is_enabled::<DestroyFlag>(player));
}

#[test]
fn enemy_on_cooldown_does_not_hit_again() {
    let mut world = world();
    let bolt = bolt_template(&mut world);
    let player = player(&mut world, Vec2::ZERO, 10, bolt);
    let enemy = enemy(&mut world, Vec2::new(0.5, 0.0), 5, 3, 1.0);

    let events = [collision(enemy, player), collision(player, enemy)];
    let stats = dispatch(&world, 0.0, &events, &default_resolvers()).unwrap();
    assert_eq!((stats.resolved, stats.gated), (1, 1));
    resolve_damage(&world).unwrap();
    assert_eq!(hp(&world, player), 7);
}

#[test]
fn two_projectiles_kill_one_enemy() {
    let mut world = world();
    let enemy = enemy(&mut world, Vec2::ZERO, 5, 1, 1.0);
    let first = projectile(&mut world, 3);
    let second = projectile(&mut world, 4);

    let events = [trigger(first, enemy), trigger(enemy, second)];
    dispatch(&world, 0.0, &events, &default_resolvers()).unwrap();
    assert_eq!(world.get::<DamageBuffer>(enemy).unwrap().pending(), &[3, 4]);
    resolve_damage(&world).unwrap();

    assert_eq!(hp(&world, enemy), -2);
    assert!(world.is_enabled::<DestroyFlag>(enemy));
    assert!(world.is_enabled::<DestroyFlag>(first));
    assert!(world.is_enabled::<DestroyFlag>(second));
}

#[test]
fn duplicate_projectile_events_are_not_deduplicated() {
    let mut world = world();
    let enemy = enemy(&mut world, Vec2::ZERO, 20, 1, 1.0);
    let bolt = projectile(&mut world, 3);

    let events = [trigger(bolt, enemy), trigger(bolt, enemy)];
    dispatch(&world, 0.0, &events, &default_resolvers()).unwrap();
    resolve_damage(&world).unwrap();
    assert_eq!(hp(&world, enemy), 14);
}

#[test]
fn duplicate_gem_events_count_twice() {
    let mut world = world();
    let bolt = bolt_template(&mut world);
    let player = player(&mut world, Vec2::ZERO, 10, bolt);
    let gem = gem(&mut world);

    let events = [trigger(gem, player), trigger(player, gem)];
    let stats = dispatch(&world, 0.0, &events, &default_resolvers()).unwrap();
    assert_eq!(stats.resolved, 2);
    assert_eq!(world.cloned::<GemCollectedCount>(player), Some(GemCollectedCount(2)));
    assert!(world.is_enabled::<UpdateGemUiFlag>(player));
    assert!(world.is_enabled::<DestroyFlag>(gem));
}

#[test]
fn projectile_does_not_hurt_the_player() {
    let mut world = world();
    let bolt = bolt_template(&mut world);
    let player = player(&mut world, Vec2::ZERO, 10, bolt);
    let shot = projectile(&mut world, 3);

    let stats = dispatch(&world, 0.0, &[trigger(shot, player)], &default_resolvers()).unwrap();
    assert_eq!(stats.ignored, 1);
    assert!(!world.is_enabled::<DestroyFlag>(shot));
}

#[test]
fn systems_consume_the_event_resource() {
    let mut world = world();
    let bolt = bolt_template(&mut world);
    let player = player(&mut world, Vec2::ZERO, 2, bolt);
    let enemy = enemy(&mut world, Vec2::ZERO, 5, 3, 1.0);
    world
        .resource_mut::<CollisionEvents>()
        .unwrap()
        .replace(vec![collision(enemy, player)]);

    run_once(&world, &CollisionDispatchSystem::default(), at(1.0)).unwrap();
    run_once(&world, &DamageResolutionSystem, at(1.0)).unwrap();

    assert_eq!(hp(&world, player), -1);
    assert!(world.is_enabled::<DestroyFlag>(player));
}

#[test]
fn damage_resolution_properties_hold_for_random_buffers() {
    let mut rng = ChaCha8Rng::seed_from_u64(0xD1CE);
    for _ in 0..40 {
        let mut world = world();
        let mut expected = Vec::new();
        for _ in 0..rng.gen_range(1..30) {
            let start = rng.gen_range(1..25);
            let e = enemy(&mut world, Vec2::ZERO, start, 1, 1.0);
            let mut buffer = DamageBuffer::default();
            for _ in 0..rng.gen_range(0..5) {
                buffer.push(rng.gen_range(0..8));
            }
            expected.push((e, start - buffer.total()));
            world.attach(e, buffer).unwrap();
        }

        resolve_damage(&world).unwrap();

        for (e, hp_after) in expected {
            assert!(world.get::<DamageBuffer>(e).unwrap().is_empty());
            assert_eq!(hp(&world, e), hp_after);
            assert_eq!(world.is_enabled::<DestroyFlag>(e), hp_after <= 0);
        }
    }
}
