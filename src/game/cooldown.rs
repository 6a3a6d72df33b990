//! # Cooldowns and the player area attack
//!
//! A gated action is `Ready` while its timestamp component is disabled and
//! `OnCooldown` while it is enabled; the value is the elapsed time at which
//! the action becomes available again.
//!
//! ```text
//! Ready --(action fires, value = now + cooldown, enable)--> OnCooldown
//! OnCooldown --(now >= value, disable)--> Ready
//! ```
//!
//! [`CooldownExpirySystem`] performs the second transition once per tick, in
//! the Simulation phase, before any action is attempted. The first
//! transition belongs to the action: [`PlayerAttackSystem`] for the player,
//! the enemy-attack collision resolver for enemies.

use std::marker::PhantomData;

use glam::Vec2;

use crate::engine::component::{Component, ComponentRegistry};
use crate::engine::error::ECSResult;
use crate::engine::scheduler::Barrier;
use crate::engine::systems::{access, Requirement, System, SystemContext};
use crate::engine::types::{AccessSets, Entity};
use crate::game::components::{
    EnemyCooldownExpiration, PlayerAttackData, PlayerCooldownExpiration, PlayerTag, Transform,
};
use crate::game::physics::{Aabb, Physics};

/// Enableable component holding an expiry time.
pub trait CooldownTimestamp: Component {
    /// Elapsed time at which the cooldown ends.
    fn expires_at(&self) -> f64;
    /// Timestamp ending at `time`.
    fn until(time: f64) -> Self;
}

impl CooldownTimestamp for PlayerCooldownExpiration {
    fn expires_at(&self) -> f64 {
        self.0
    }

    fn until(time: f64) -> Self {
        Self(time)
    }
}

impl CooldownTimestamp for EnemyCooldownExpiration {
    fn expires_at(&self) -> f64 {
        self.0
    }

    fn until(time: f64) -> Self {
        Self(time)
    }
}

/// Disables every enabled `T` whose expiry has been reached.
pub struct CooldownExpirySystem<T> {
    name: &'static str,
    marker: PhantomData<fn() -> T>,
}

impl<T: CooldownTimestamp> CooldownExpirySystem<T> {
    /// System reported as `name`.
    pub fn new(name: &'static str) -> Self {
        Self { name, marker: PhantomData }
    }
}

impl<T: CooldownTimestamp> System for CooldownExpirySystem<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry).write::<T>().build()?)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let now = ctx.time().elapsed;
        let query = world.query().enabled::<T>().build()?;
        let timestamps = world.write::<T>()?;
        for entity in world.iter(&query)? {
            let expired = timestamps.get(entity).map_or(false, |t| t.expires_at() <= now);
            if expired {
                timestamps.set_enabled(entity, false);
            }
        }
        Ok(())
    }
}

/// Picks the hit closest to `origin`. Ties keep the earlier hit.
pub fn closest_target(
    origin: Vec2,
    hits: impl IntoIterator<Item = (Entity, Vec2)>,
) -> Option<(Entity, Vec2)> {
    let mut best: Option<(Entity, Vec2, f32)> = None;
    for (entity, position) in hits {
        let distance = origin.distance_squared(position);
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((entity, position, distance));
        }
    }
    best.map(|(entity, position, _)| (entity, position))
}

/// Fires a projectile at the closest enemy in the detection box.
///
/// Skipped while the cooldown is enabled. If the box is empty the attack
/// does not fire and the cooldown stays `Ready`.
pub struct PlayerAttackSystem;

impl System for PlayerAttackSystem {
    fn name(&self) -> &'static str {
        "player_attack"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<PlayerTag>()
            .read::<PlayerAttackData>()
            .read::<Transform>()
            .read::<Physics>()
            .write::<PlayerCooldownExpiration>()
            .build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![
            Requirement::component::<PlayerTag>(registry)?,
            Requirement::resource::<Physics>(registry)?,
        ])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let now = ctx.time().elapsed;
        let query = world
            .query()
            .with::<PlayerTag>()
            .with::<PlayerAttackData>()
            .with::<Transform>()
            .disabled::<PlayerCooldownExpiration>()
            .build()?;

        let physics = world.resource::<Physics>()?;
        let attacks = world.read::<PlayerAttackData>()?;
        let transforms = world.read::<Transform>()?;
        let mut cooldowns = world.write::<PlayerCooldownExpiration>()?;

        let players: Vec<Entity> = world.iter(&query)?.collect();
        for player in players {
            let (Some(attack), Some(transform)) = (attacks.get(player), transforms.get(player)) else {
                continue;
            };
            let origin = transform.position;
            let aabb = Aabb::from_center(origin, Vec2::splat(attack.detection_size));
            let hits = physics.0.overlap_aabb(&aabb, attack.filter);
            let located = hits
                .into_iter()
                .filter_map(|hit| physics.0.position(hit).map(|position| (hit, position)));
            let Some((target, position)) = closest_target(origin, located) else {
                continue;
            };

            let offset = position - origin;
            let angle = offset.y.atan2(offset.x);
            let commands = ctx.commands(Barrier::BeginTick);
            let projectile = commands.instantiate(attack.projectile);
            commands.set_component(projectile, Transform::rotated(origin, angle));

            if let Some(cooldown) = cooldowns.get_mut(player) {
                *cooldown = PlayerCooldownExpiration::until(now + attack.cooldown);
            }
            cooldowns.set_enabled(player, true);
            log::debug!("player {player} fires at {target} (angle {angle:.3})");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(raw: u64) -> Entity {
        Entity(raw)
    }

    #[test]
    fn closest_prefers_first_on_ties() {
        let hits = vec![
            (entity(1), Vec2::new(2.0, 0.0)),
            (entity(2), Vec2::new(0.0, -2.0)),
            (entity(3), Vec2::new(3.0, 0.0)),
        ];
        assert_eq!(closest_target(Vec2::ZERO, hits).map(|(e, _)| e), Some(entity(1)));
        assert_eq!(closest_target(Vec2::ZERO, Vec::new()), None);
    }
}
