//! Gameplay components.
//!
//! Flags with no payload are zero-sized; their meaning lives entirely in the
//! enabled bit. Components documented as "enableable" are attached once at
//! instantiation and afterwards only toggled.

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::engine::error::ECSResult;
use crate::engine::template::TemplateId;
use crate::engine::world::World;
use crate::game::physics::{CollisionEvents, CollisionFilter};

/// Marks the single player entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerTag;

/// Marks enemies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnemyTag;

/// Marks collectible gems.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GemTag;

/// Planar position plus orientation around the view axis, in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec2,
    /// Rotation in radians.
    pub angle: f32,
}

impl Transform {
    /// Transform at `position` with neutral orientation.
    pub fn at(position: Vec2) -> Self {
        Self { position, angle: 0.0 }
    }

    /// Transform at `position` facing `angle`.
    pub fn rotated(position: Vec2, angle: f32) -> Self {
        Self { position, angle }
    }

    /// Unit vector along the orientation.
    pub fn forward(&self) -> Vec2 {
        Vec2::from_angle(self.angle)
    }
}

/// Linear velocity, integrated by the physics backend.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity(pub Vec2);

/// Desired movement direction for this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveDirection(pub Vec2);

/// Movement speed in units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveSpeed(pub f32);

/// Horizontal facing sign: `1.0` right, `-1.0` left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FacingDirection(pub f32);

impl Default for FacingDirection {
    fn default() -> Self {
        Self(1.0)
    }
}

/// Animation clip selected for the player.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnimationIndex {
    /// Walking.
    Movement = 0,
    /// Standing still.
    #[default]
    Idle = 1,
}

/// Player animation state, written by the movement system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerAnimation(pub AnimationIndex);

/// Hit points at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxHitPoints(pub i32);

/// Current hit points. Not clamped; may go negative for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentHitPoints(pub i32);

/// Full-health pair for a new entity.
pub fn hit_points(max: i32) -> (MaxHitPoints, CurrentHitPoints) {
    (MaxHitPoints(max), CurrentHitPoints(max))
}

/// Damage queued during the current tick, drained once by damage resolution.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DamageBuffer {
    pending: Vec<i32>,
}

impl DamageBuffer {
    /// Queues one damage amount.
    pub fn push(&mut self, amount: i32) {
        debug_assert!(amount >= 0, "negative damage {amount}");
        self.pending.push(amount);
    }

    /// Sum of queued amounts.
    pub fn total(&self) -> i32 {
        self.pending.iter().sum()
    }

    /// Queued amounts in arrival order.
    pub fn pending(&self) -> &[i32] {
        &self.pending
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every queued amount.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Enableable: set when the entity must be destroyed this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DestroyFlag;

/// Contact attack of an enemy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnemyAttackData {
    /// Hit points removed per contact.
    pub damage: i32,
    /// Seconds between hits.
    pub cooldown: f64,
}

/// Enableable: enemy attack unavailable until this elapsed time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EnemyCooldownExpiration(pub f64);

/// Area attack of the player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayerAttackData {
    /// Projectile template fired at the closest target.
    pub projectile: TemplateId,
    /// Seconds between shots.
    pub cooldown: f64,
    /// Half extent of the square detection box.
    pub detection_size: f32,
    /// Filter for the detection overlap query.
    pub filter: CollisionFilter,
}

/// Enableable: player attack unavailable until this elapsed time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PlayerCooldownExpiration(pub f64);

/// Number of gems the player picked up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GemCollectedCount(pub u32);

/// Enableable: the gem counter changed and the UI has not been told yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateGemUiFlag;

/// Flight parameters of a player projectile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectileData {
    /// Units per second along the forward axis.
    pub move_speed: f32,
    /// Hit points removed on impact.
    pub damage: i32,
}

/// Template instantiated where the entity dies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GemDrop(pub TemplateId);

/// Spawn rule of a spawner entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnerData {
    /// Template instantiated on every spawn.
    pub template: TemplateId,
    /// Seconds between spawns.
    pub interval: f32,
    /// Distance from the player at which entities appear.
    pub distance: f32,
}

/// Countdown and RNG owned by one spawner.
#[derive(Clone, Debug)]
pub struct SpawnerState {
    /// Seconds until the next spawn.
    pub countdown: f32,
    /// Source of spawn angles.
    pub rng: ChaCha8Rng,
}

impl SpawnerState {
    /// State that fires on the first tick.
    pub fn seeded(seed: u64) -> Self {
        Self { countdown: 0.0, rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}

/// Circle collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Collider {
    /// Circle radius.
    pub radius: f32,
    /// Layer membership and mask.
    pub filter: CollisionFilter,
    /// Triggers report overlaps without blocking.
    pub trigger: bool,
}

/// Session-wide flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Set once the player has died.
    pub game_over: bool,
}

/// Registers every gameplay component and the per-tick resources.
pub fn register_components(world: &mut World) -> ECSResult<()> {
    world.register_component::<PlayerTag>()?;
    world.register_component::<EnemyTag>()?;
    world.register_component::<GemTag>()?;
    world.register_component::<Transform>()?;
    world.register_component::<Velocity>()?;
    world.register_component::<MoveDirection>()?;
    world.register_component::<MoveSpeed>()?;
    world.register_component::<FacingDirection>()?;
    world.register_component::<PlayerAnimation>()?;
    world.register_component::<MaxHitPoints>()?;
    world.register_component::<CurrentHitPoints>()?;
    world.register_component::<DamageBuffer>()?;
    world.register_component::<DestroyFlag>()?;
    world.register_component::<EnemyAttackData>()?;
    world.register_component::<EnemyCooldownExpiration>()?;
    world.register_component::<PlayerAttackData>()?;
    world.register_component::<PlayerCooldownExpiration>()?;
    world.register_component::<GemCollectedCount>()?;
    world.register_component::<UpdateGemUiFlag>()?;
    world.register_component::<ProjectileData>()?;
    world.register_component::<GemDrop>()?;
    world.register_component::<SpawnerData>()?;
    world.register_component::<SpawnerState>()?;
    world.register_component::<Collider>()?;

    if !world.has_resource::<CollisionEvents>() {
        world.insert_resource(CollisionEvents::default())?;
    }
    if !world.has_resource::<SessionState>() {
        world.insert_resource(SessionState::default())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_buffer_sums_in_any_order() {
        let mut a = DamageBuffer::default();
        a.push(3);
        a.push(4);
        let mut b = DamageBuffer::default();
        b.push(4);
        b.push(3);
        assert_eq!(a.total(), b.total());
        a.clear();
        assert!(a.is_empty());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "negative damage")]
    fn negative_damage_is_rejected() {
        DamageBuffer::default().push(-1);
    }

    #[test]
    fn forward_follows_angle() {
        let t = Transform::rotated(Vec2::ZERO, std::f32::consts::FRAC_PI_2);
        assert!((t.forward() - Vec2::Y).length() < 1e-6);
    }
}
