#![allow(dead_code)]

use std::collections::BTreeMap;

use glam::Vec2;

use survivor_sim::engine::error::ECSResult;
use survivor_sim::engine::scheduler::Barrier;
use survivor_sim::engine::systems::{System, SystemContext};
use survivor_sim::engine::time::Time;
use survivor_sim::game::components::*;
use survivor_sim::game::physics::{KinematicPhysics, Physics};
use survivor_sim::game::prefabs::{ATTACK_FILTER, ENEMY_FILTER, PLAYER_FILTER};
use survivor_sim::{CommandBuffer, Entity, Template, TemplateId, World};

/// World with every gameplay component registered and a physics backend.
pub fn world() -> World {
    let mut world = World::new();
    register_components(&mut world).unwrap();
    world.insert_resource(Physics::new(KinematicPhysics::new(2.0))).unwrap();
    world
}

/// Clock at `elapsed` seconds, one 1/60 s tick in.
pub fn at(elapsed: f64) -> Time {
    Time { elapsed, delta: 1.0 / 60.0, tick: 1 }
}

/// Runs `system` once and returns the buffers it recorded.
pub fn run_once(
    world: &World,
    system: &dyn System,
    time: Time,
) -> ECSResult<BTreeMap<Barrier, CommandBuffer>> {
    let mut ctx = SystemContext::new(world, time);
    system.run(&mut ctx)?;
    Ok(ctx.into_buffers())
}

/// Plays back every buffer in barrier order.
pub fn apply(world: &mut World, buffers: BTreeMap<Barrier, CommandBuffer>) {
    for (_, buffer) in buffers {
        world.playback(buffer).unwrap();
    }
}

pub fn player(world: &mut World, position: Vec2, hp: i32, projectile: TemplateId) -> Entity {
    let e = world.spawn().unwrap();
    let (max, current) = hit_points(hp);
    world.attach(e, PlayerTag).unwrap();
    world.attach(e, Transform::at(position)).unwrap();
    world.attach(e, max).unwrap();
    world.attach(e, current).unwrap();
    world.attach(e, DamageBuffer::default()).unwrap();
    world.attach(e, GemCollectedCount(0)).unwrap();
    world.attach_disabled(e, UpdateGemUiFlag).unwrap();
    world.attach_disabled(e, DestroyFlag).unwrap();
    world.attach(e, PlayerAttackData {
        projectile,
        cooldown: 1.5,
        detection_size: 2.0,
        filter: ATTACK_FILTER,
    })
    .unwrap();
    world.attach_disabled(e, PlayerCooldownExpiration::default()).unwrap();
    world.attach(e, Collider { radius: 0.5, filter: PLAYER_FILTER, trigger: false }).unwrap();
    e
}

pub fn enemy(world: &mut World, position: Vec2, hp: i32, damage: i32, cooldown: f64) -> Entity {
    let e = world.spawn().unwrap();
    let (max, current) = hit_points(hp);
    world.attach(e, EnemyTag).unwrap();
    world.attach(e, Transform::at(position)).unwrap();
    world.attach(e, max).unwrap();
    world.attach(e, current).unwrap();
    world.attach(e, DamageBuffer::default()).unwrap();
    world.attach(e, EnemyAttackData { damage, cooldown }).unwrap();
    world.attach_disabled(e, EnemyCooldownExpiration::default()).unwrap();
    world.attach_disabled(e, DestroyFlag).unwrap();
    world.attach(e, Collider { radius: 0.5, filter: ENEMY_FILTER, trigger: false }).unwrap();
    e
}

pub fn projectile(world: &mut World, damage: i32) -> Entity {
    let e = world.spawn().unwrap();
    world.attach(e, Transform::default()).unwrap();
    world.attach(e, ProjectileData { move_speed: 10.0, damage }).unwrap();
    world.attach_disabled(e, DestroyFlag).unwrap();
    e
}

pub fn gem(world: &mut World) -> Entity {
    let e = world.spawn().unwrap();
    world.attach(e, GemTag).unwrap();
    world.attach(e, Transform::default()).unwrap();
    world.attach_disabled(e, DestroyFlag).unwrap();
    e
}

/// A projectile template with nothing but its data.
pub fn bolt_template(world: &mut World) -> TemplateId {
    world.register_template(
        Template::new("bolt")
            .with(Transform::default())
            .with(ProjectileData { move_speed: 10.0, damage: 1 })
            .with_disabled(DestroyFlag),
    )
}

pub fn hp(world: &World, entity: Entity) -> i32 {
    world.cloned::<CurrentHitPoints>(entity).map_or(i32::MIN, |hp| hp.0)
}
