//! Damage resolution.
//!
//! Runs once per tick after collision dispatch. Each entity's queued damage
//! is summed, subtracted from its hit points and cleared. Entities at or
//! below zero get their [`DestroyFlag`] enabled; nothing here ever disables
//! it.

use crate::engine::component::ComponentRegistry;
use crate::engine::error::ECSResult;
use crate::engine::systems::{access, System, SystemContext};
use crate::engine::types::AccessSets;
use crate::engine::world::World;
use crate::game::components::{CurrentHitPoints, DamageBuffer, DestroyFlag};

/// Drains every damage buffer in `world`.
pub fn resolve_damage(world: &World) -> ECSResult<()> {
    let query = world
        .query()
        .with::<CurrentHitPoints>()
        .with::<DamageBuffer>()
        .build()?;
    let destroy = world.flags::<DestroyFlag>()?;
    world.par_for_each_write2::<CurrentHitPoints, DamageBuffer, _>(&query, |entity, hp, buffer| {
        if buffer.is_empty() {
            return;
        }
        hp.0 -= buffer.total();
        buffer.clear();
        if hp.0 <= 0 {
            destroy.set(entity, true);
        }
    })
}

/// Scheduled form of [`resolve_damage`].
pub struct DamageResolutionSystem;

impl System for DamageResolutionSystem {
    fn name(&self) -> &'static str {
        "damage_resolution"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .write::<CurrentHitPoints>()
            .write::<DamageBuffer>()
            .write::<DestroyFlag>()
            .build()?)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        resolve_damage(ctx.world())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::components::{hit_points, register_components};

    #[test]
    fn positive_hp_never_flags() {
        let mut world = World::new();
        register_components(&mut world).unwrap();
        let e = world.spawn().unwrap();
        let (_, current) = hit_points(10);
        world.attach(e, current).unwrap();
        let mut buffer = DamageBuffer::default();
        buffer.push(9);
        world.attach(e, buffer).unwrap();
        world.attach_disabled(e, DestroyFlag).unwrap();

        resolve_damage(&world).unwrap();
        assert_eq!(world.cloned::<CurrentHitPoints>(e), Some(CurrentHitPoints(1)));
        assert!(!world.is_enabled::<DestroyFlag>(e));
        assert!(world.get::<DamageBuffer>(e).unwrap().is_empty());
    }
}
