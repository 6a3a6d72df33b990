//! Periodic spawning around the player.
//!
//! Every spawner entity owns its countdown and its RNG, so two spawners
//! never share a random stream and a fixed seed with a fixed sequence of
//! deltas always reproduces the same spawn positions.

use std::f32::consts::TAU;

use glam::Vec2;
use rand::Rng;

use crate::engine::component::ComponentRegistry;
use crate::engine::error::ECSResult;
use crate::engine::scheduler::Barrier;
use crate::engine::systems::{access, Requirement, System, SystemContext};
use crate::engine::types::{AccessSets, Entity};
use crate::game::components::{PlayerTag, SpawnerData, SpawnerState, Transform};
use crate::game::movement::player_position;

/// Offset on the circle of radius `distance` at `angle`.
///
/// Angle zero points along +Y.
pub fn spawn_offset(angle: f32, distance: f32) -> Vec2 {
    Vec2::new(angle.sin(), angle.cos()) * distance
}

/// Advances one spawner by `delta`.
///
/// Returns the angle drawn when the countdown ran out, `None` otherwise.
pub fn next_spawn(state: &mut SpawnerState, data: &SpawnerData, delta: f32) -> Option<f32> {
    state.countdown -= delta;
    if state.countdown > 0.0 {
        return None;
    }
    state.countdown = data.interval;
    Some(state.rng.gen_range(0.0..TAU))
}

/// Instantiates the spawner's template around the player.
pub struct SpawnerSystem;

impl System for SpawnerSystem {
    fn name(&self) -> &'static str {
        "spawner"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<SpawnerData>()
            .read::<PlayerTag>()
            .read::<Transform>()
            .write::<SpawnerState>()
            .build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![Requirement::component::<PlayerTag>(registry)?])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let delta = ctx.time().delta;
        let Some(center) = player_position(world)? else {
            return Ok(());
        };
        let query = world.query().with::<SpawnerData>().with::<SpawnerState>().build()?;
        let data = world.read::<SpawnerData>()?;
        let mut states = world.write::<SpawnerState>()?;

        let spawners: Vec<Entity> = world.iter(&query)?.collect();
        for spawner in spawners {
            let (Some(rule), Some(state)) = (data.get(spawner), states.get_mut(spawner)) else {
                continue;
            };
            let Some(angle) = next_spawn(state, rule, delta) else {
                continue;
            };
            let position = center + spawn_offset(angle, rule.distance);
            let commands = ctx.commands(Barrier::BeginTick);
            let spawned = commands.instantiate(rule.template);
            commands.set_component(spawned, Transform::at(position));
            log::debug!("spawner {spawner} queued spawn at ({:.2}, {:.2})", position.x, position.y);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::template::{Template, TemplateRegistry};

    fn rule(interval: f32) -> SpawnerData {
        let mut templates = TemplateRegistry::default();
        let template = templates.register(Template::new("enemy"));
        SpawnerData { template, interval, distance: 10.0 }
    }

    #[test]
    fn fires_on_first_tick_then_waits() {
        let data = rule(2.0);
        let mut state = SpawnerState::seeded(9);
        assert!(next_spawn(&mut state, &data, 0.5).is_some());
        assert_eq!(state.countdown, 2.0);
        assert!(next_spawn(&mut state, &data, 0.5).is_none());
        assert_eq!(state.countdown, 1.5);
    }

    #[test]
    fn offset_has_requested_length() {
        for angle in [0.0, 1.0, 3.0, 6.0] {
            assert!((spawn_offset(angle, 15.0).length() - 15.0).abs() < 1e-4);
        }
        assert!((spawn_offset(0.0, 1.0) - Vec2::Y).length() < 1e-6);
    }
}
