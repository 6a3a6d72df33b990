//! Entity templates built from a [`GameConfig`].
//!
//! Enableable components are registered disabled, so a fresh entity starts
//! `Ready`, not flagged for destruction, with no pending UI refresh.

use glam::Vec2;

use crate::engine::template::{Template, TemplateId};
use crate::engine::world::World;
use crate::game::components::{
    hit_points, Collider, DamageBuffer, DestroyFlag, EnemyAttackData, EnemyCooldownExpiration,
    EnemyTag, FacingDirection, GemCollectedCount, GemDrop, GemTag, MoveDirection, MoveSpeed,
    PlayerAnimation, PlayerAttackData, PlayerCooldownExpiration, PlayerTag, ProjectileData,
    SpawnerData, SpawnerState, Transform, UpdateGemUiFlag, Velocity,
};
use crate::game::config::GameConfig;
use crate::game::physics::{layers, CollisionFilter};

/// Player body: hit by enemies, picks up gems.
pub const PLAYER_FILTER: CollisionFilter =
    CollisionFilter::new(layers::PLAYER, layers::ENEMY | layers::GEM);
/// Enemy body: touches the player and projectiles.
pub const ENEMY_FILTER: CollisionFilter =
    CollisionFilter::new(layers::ENEMY, layers::PLAYER | layers::PROJECTILE);
/// Projectile trigger: hits enemies only.
pub const PROJECTILE_FILTER: CollisionFilter =
    CollisionFilter::new(layers::PROJECTILE, layers::ENEMY);
/// Gem trigger: seen by the player only.
pub const GEM_FILTER: CollisionFilter = CollisionFilter::new(layers::GEM, layers::PLAYER);

/// Filter of the player's detection box: finds enemies only.
pub const ATTACK_FILTER: CollisionFilter = PROJECTILE_FILTER;

/// Ids of the registered templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prefabs {
    /// The player character.
    pub player: TemplateId,
    /// A chasing enemy.
    pub enemy: TemplateId,
    /// The player's projectile.
    pub projectile: TemplateId,
    /// A dropped gem.
    pub gem: TemplateId,
    /// The enemy spawner.
    pub spawner: TemplateId,
}

impl Prefabs {
    /// Registers all templates in dependency order.
    pub fn register(world: &mut World, config: &GameConfig) -> Self {
        let gem = world.register_template(gem(config));
        let projectile = world.register_template(projectile(config));
        let enemy = world.register_template(enemy(config, config.enemy.drops_gem.then_some(gem)));
        let player = world.register_template(player(config, projectile));
        let spawner = world.register_template(spawner(config, enemy));
        Self { player, enemy, projectile, gem, spawner }
    }
}

/// Trigger gem waiting to be picked up.
pub fn gem(config: &GameConfig) -> Template {
    Template::new("gem")
        .with(GemTag)
        .with(Transform::default())
        .with_disabled(DestroyFlag)
        .with(Collider { radius: config.gem.collider_radius, filter: GEM_FILTER, trigger: true })
}

/// Projectile flying along its forward axis.
pub fn projectile(config: &GameConfig) -> Template {
    Template::new("projectile")
        .with(Transform::default())
        .with(Velocity::default())
        .with(ProjectileData {
            move_speed: config.projectile.move_speed,
            damage: config.projectile.damage,
        })
        .with_disabled(DestroyFlag)
        .with(Collider {
            radius: config.projectile.collider_radius,
            filter: PROJECTILE_FILTER,
            trigger: true,
        })
}

/// Enemy chasing the player; leaves `drop` behind when it dies.
pub fn enemy(config: &GameConfig, drop: Option<TemplateId>) -> Template {
    let (max, current) = hit_points(config.enemy.hit_points);
    let template = Template::new("enemy")
        .with(EnemyTag)
        .with(Transform::default())
        .with(Velocity::default())
        .with(MoveDirection::default())
        .with(MoveSpeed(config.enemy.move_speed))
        .with(FacingDirection::default())
        .with(max)
        .with(current)
        .with(DamageBuffer::default())
        .with(EnemyAttackData {
            damage: config.enemy.attack_damage,
            cooldown: config.enemy.attack_cooldown,
        })
        .with_disabled(EnemyCooldownExpiration::default())
        .with_disabled(DestroyFlag)
        .with(Collider {
            radius: config.enemy.collider_radius,
            filter: ENEMY_FILTER,
            trigger: false,
        });
    match drop {
        Some(gem) => template.with(GemDrop(gem)),
        None => template,
    }
}

/// Player character firing `projectile`.
pub fn player(config: &GameConfig, projectile: TemplateId) -> Template {
    let (max, current) = hit_points(config.player.hit_points);
    Template::new("player")
        .with(PlayerTag)
        .with(Transform::at(Vec2::ZERO))
        .with(Velocity::default())
        .with(MoveDirection::default())
        .with(MoveSpeed(config.player.move_speed))
        .with(FacingDirection::default())
        .with(PlayerAnimation::default())
        .with(max)
        .with(current)
        .with(DamageBuffer::default())
        .with(PlayerAttackData {
            projectile,
            cooldown: config.player.attack_cooldown,
            detection_size: config.player.detection_size,
            filter: ATTACK_FILTER,
        })
        .with_disabled(PlayerCooldownExpiration::default())
        .with(GemCollectedCount::default())
        .with_disabled(UpdateGemUiFlag)
        .with_disabled(DestroyFlag)
        .with(Collider {
            radius: config.player.collider_radius,
            filter: PLAYER_FILTER,
            trigger: false,
        })
}

/// Spawner placing `enemy` around the player.
pub fn spawner(config: &GameConfig, enemy: TemplateId) -> Template {
    Template::new("enemy_spawner")
        .with(SpawnerData {
            template: enemy,
            interval: config.spawner.interval,
            distance: config.spawner.distance,
        })
        .with(SpawnerState::seeded(config.spawner.seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::register_components;

    #[test]
    fn filters_pair_up_as_intended() {
        assert!(CollisionFilter::can_collide(PLAYER_FILTER, ENEMY_FILTER));
        assert!(CollisionFilter::can_collide(PLAYER_FILTER, GEM_FILTER));
        assert!(CollisionFilter::can_collide(PROJECTILE_FILTER, ENEMY_FILTER));
        assert!(!CollisionFilter::can_collide(PROJECTILE_FILTER, PLAYER_FILTER));
        assert!(!CollisionFilter::can_collide(ATTACK_FILTER, GEM_FILTER));
    }

    #[test]
    fn enemy_starts_ready_and_alive() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        let prefabs = Prefabs::register(&mut world, &GameConfig::default());
        let enemy = world.instantiate(prefabs.enemy).unwrap();
        assert!(world.has::<EnemyCooldownExpiration>(enemy));
        assert!(!world.is_enabled::<EnemyCooldownExpiration>(enemy));
        assert!(!world.is_enabled::<DestroyFlag>(enemy));
        assert_eq!(world.cloned::<GemDrop>(enemy), Some(GemDrop(prefabs.gem)));
    }
}
