//! Input sampling and movement.
//!
//! - [`PlayerInputSystem`] (Initialization) copies the input collaborator's
//!   vector into the player's [`MoveDirection`].
//! - [`EnemyChaseSystem`] (Simulation) points every enemy at the player.
//! - [`CharacterMoveSystem`] (Simulation) turns direction and speed into
//!   velocity, facing and the player's animation clip.
//! - [`ProjectileFlightSystem`] (Simulation) drives projectiles along their
//!   orientation.
//!
//! Positions are integrated by the physics backend, not here.

use std::sync::Arc;

use glam::Vec2;

use crate::engine::component::ComponentRegistry;
use crate::engine::error::ECSResult;
use crate::engine::query::Query;
use crate::engine::systems::{access, Requirement, System, SystemContext};
use crate::engine::types::{AccessSets, Tick};
use crate::engine::world::World;
use crate::game::components::{
    AnimationIndex, EnemyTag, FacingDirection, MoveDirection, MoveSpeed, PlayerAnimation,
    PlayerTag, ProjectileData, Transform, Velocity,
};

/// Horizontal input below this magnitude keeps the current facing.
pub const FACING_DEADZONE: f32 = 0.15;

/// Input collaborator: one move vector per tick.
pub trait InputSource: Send + Sync {
    /// Move vector for `tick`; not normalised.
    fn move_direction(&self, tick: Tick) -> Vec2;
}

/// Constant input.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedInput(pub Vec2);

impl InputSource for FixedInput {
    fn move_direction(&self, _tick: Tick) -> Vec2 {
        self.0
    }
}

/// Walks the player around a circle, one lap every `period` ticks.
#[derive(Clone, Copy, Debug)]
pub struct OrbitInput {
    /// Ticks per lap.
    pub period: Tick,
}

impl InputSource for OrbitInput {
    fn move_direction(&self, tick: Tick) -> Vec2 {
        let period = self.period.max(1);
        let phase = (tick % period) as f32 / period as f32;
        Vec2::from_angle(phase * std::f32::consts::TAU).perp()
    }
}

/// Writes the sampled input into the player's move direction.
pub struct PlayerInputSystem {
    input: Arc<dyn InputSource>,
}

impl PlayerInputSystem {
    /// Samples `input` once per tick.
    pub fn new(input: Arc<dyn InputSource>) -> Self {
        Self { input }
    }
}

impl System for PlayerInputSystem {
    fn name(&self) -> &'static str {
        "player_input"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry).read::<PlayerTag>().write::<MoveDirection>().build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![Requirement::component::<PlayerTag>(registry)?])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let direction = self.input.move_direction(ctx.time().tick).clamp_length_max(1.0);
        let query = world.query().with::<PlayerTag>().with::<MoveDirection>().build()?;
        let mut directions = world.write::<MoveDirection>()?;
        for player in world.iter(&query)? {
            if let Some(value) = directions.get_mut(player) {
                value.0 = direction;
            }
        }
        Ok(())
    }
}

/// Position of the first live player, if any.
pub fn player_position(world: &World) -> ECSResult<Option<Vec2>> {
    let query = world.query().with::<PlayerTag>().with::<Transform>().build()?;
    let Some(player) = world.first(&query)? else {
        return Ok(None);
    };
    Ok(world.read::<Transform>()?.get(player).map(|t| t.position))
}

/// Points enemies at the player.
pub struct EnemyChaseSystem;

impl System for EnemyChaseSystem {
    fn name(&self) -> &'static str {
        "enemy_chase"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<PlayerTag>()
            .read::<EnemyTag>()
            .read::<Transform>()
            .write::<MoveDirection>()
            .build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![Requirement::component::<PlayerTag>(registry)?])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let Some(target) = player_position(world)? else {
            return Ok(());
        };
        let query = world
            .query()
            .with::<EnemyTag>()
            .with::<Transform>()
            .with::<MoveDirection>()
            .build()?;
        world.par_for_each_read_write::<Transform, MoveDirection, _>(&query, |_, transform, direction| {
            direction.0 = (target - transform.position).normalize_or_zero();
        })
    }
}

/// Velocity, facing and animation from move direction and speed.
pub struct CharacterMoveSystem {
    movers: Query,
    players: Query,
}

impl CharacterMoveSystem {
    /// Builds the mover and player queries.
    pub fn new(world: &World) -> ECSResult<Self> {
        Ok(Self {
            movers: world
                .query()
                .with::<MoveDirection>()
                .with::<MoveSpeed>()
                .with::<Velocity>()
                .with::<FacingDirection>()
                .build()?,
            players: world
                .query()
                .with::<PlayerTag>()
                .with::<Velocity>()
                .with::<PlayerAnimation>()
                .build()?,
        })
    }
}

impl System for CharacterMoveSystem {
    fn name(&self) -> &'static str {
        "character_move"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<MoveDirection>()
            .read::<MoveSpeed>()
            .read::<PlayerTag>()
            .write::<Velocity>()
            .write::<FacingDirection>()
            .write::<PlayerAnimation>()
            .build()?)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        {
            let directions = world.read::<MoveDirection>()?;
            let speeds = world.read::<MoveSpeed>()?;
            world.par_for_each_write2::<Velocity, FacingDirection, _>(
                &self.movers,
                |entity, velocity, facing| {
                    let (Some(direction), Some(speed)) = (directions.get(entity), speeds.get(entity))
                    else {
                        return;
                    };
                    velocity.0 = direction.0 * speed.0;
                    if direction.0.x.abs() > FACING_DEADZONE {
                        facing.0 = direction.0.x.signum();
                    }
                },
            )?;
        }

        world.par_for_each_read_write::<Velocity, PlayerAnimation, _>(
            &self.players,
            |_, velocity, animation| {
                animation.0 = if velocity.0.length_squared() > f32::EPSILON {
                    AnimationIndex::Movement
                } else {
                    AnimationIndex::Idle
                };
            },
        )
    }
}

/// Sets projectile velocity along the projectile's orientation.
pub struct ProjectileFlightSystem;

impl System for ProjectileFlightSystem {
    fn name(&self) -> &'static str {
        "projectile_flight"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<ProjectileData>()
            .read::<Transform>()
            .write::<Velocity>()
            .build()?)
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let query = world
            .query()
            .with::<ProjectileData>()
            .with::<Transform>()
            .with::<Velocity>()
            .build()?;
        let transforms = world.read::<Transform>()?;
        world.par_for_each_read_write::<ProjectileData, Velocity, _>(&query, |entity, data, velocity| {
            if let Some(transform) = transforms.get(entity) {
                velocity.0 = transform.forward() * data.move_speed;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_input_is_unit_length() {
        let input = OrbitInput { period: 120 };
        for tick in [0, 17, 60, 119] {
            assert!((input.move_direction(tick).length() - 1.0).abs() < 1e-5);
        }
    }
}
