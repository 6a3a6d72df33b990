//! # Presentation boundary
//!
//! Everything the core tells the outside world goes through values handed
//! in at construction:
//! - [`UiSink`] receives the game-over signal and gem count changes,
//! - [`CameraTarget`] holds the position the camera should follow,
//! - [`FrameSnapshot`] is a serialisable read-only view of one frame
//!   (positions, facing, animation clip, hit points).
//!
//! None of these feed back into the simulation.

use std::sync::Arc;

use glam::Vec2;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::engine::component::ComponentRegistry;
use crate::engine::error::ECSResult;
use crate::engine::systems::{access, Requirement, System, SystemContext};
use crate::engine::types::{AccessSets, Entity, Tick};
use crate::engine::world::World;
use crate::engine::time::Time;
use crate::game::components::{
    AnimationIndex, CurrentHitPoints, EnemyTag, FacingDirection, GemCollectedCount, GemTag,
    PlayerAnimation, PlayerTag, ProjectileData, SessionState, Transform, UpdateGemUiFlag,
};
use crate::game::movement::player_position;

/// UI collaborator.
pub trait UiSink: Send + Sync {
    /// The player was destroyed.
    fn show_game_over(&self);
    /// The player's gem count is now `count`.
    fn gem_count_changed(&self, count: u32);
}

/// One signal received by a [`RecordingUi`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiSignal {
    /// [`UiSink::show_game_over`] was called.
    GameOver,
    /// [`UiSink::gem_count_changed`] was called with this count.
    GemCount(u32),
}

/// Keeps every signal for later inspection.
#[derive(Debug, Default)]
pub struct RecordingUi {
    signals: Mutex<Vec<UiSignal>>,
}

impl RecordingUi {
    /// Recorder with no signals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals received so far, oldest first.
    pub fn signals(&self) -> Vec<UiSignal> {
        self.signals.lock().clone()
    }

    /// Number of game-over signals received.
    pub fn game_overs(&self) -> usize {
        self.signals.lock().iter().filter(|s| **s == UiSignal::GameOver).count()
    }

    /// Latest gem count, if any was published.
    pub fn last_gem_count(&self) -> Option<u32> {
        self.signals.lock().iter().rev().find_map(|s| match s {
            UiSignal::GemCount(count) => Some(*count),
            UiSignal::GameOver => None,
        })
    }
}

impl UiSink for RecordingUi {
    fn show_game_over(&self) {
        self.signals.lock().push(UiSignal::GameOver);
    }

    fn gem_count_changed(&self, count: u32) {
        self.signals.lock().push(UiSignal::GemCount(count));
    }
}

/// Writes signals to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogUi;

impl UiSink for LogUi {
    fn show_game_over(&self) {
        log::info!("game over");
    }

    fn gem_count_changed(&self, count: u32) {
        log::info!("gems collected: {count}");
    }
}

/// Position the camera follows. Shared between the session and its owner.
#[derive(Debug, Default)]
pub struct CameraTarget {
    position: Mutex<Option<Vec2>>,
}

impl CameraTarget {
    /// Target with no position yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the target to `position`.
    pub fn set(&self, position: Vec2) {
        *self.position.lock() = Some(position);
    }

    /// Latest target, `None` before the first presentation pass.
    pub fn get(&self) -> Option<Vec2> {
        *self.position.lock()
    }
}

/// Publishes the gem count once per change.
pub struct GemUiSystem {
    ui: Arc<dyn UiSink>,
}

impl GemUiSystem {
    /// Publishes to `ui`.
    pub fn new(ui: Arc<dyn UiSink>) -> Self {
        Self { ui }
    }
}

impl System for GemUiSystem {
    fn name(&self) -> &'static str {
        "gem_ui"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry)
            .read::<PlayerTag>()
            .read::<GemCollectedCount>()
            .write::<UpdateGemUiFlag>()
            .build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![Requirement::component::<PlayerTag>(registry)?])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        let world = ctx.world();
        let query = world
            .query()
            .with::<PlayerTag>()
            .with::<GemCollectedCount>()
            .enabled::<UpdateGemUiFlag>()
            .build()?;
        let counts = world.read::<GemCollectedCount>()?;
        let flags = world.flags::<UpdateGemUiFlag>()?;
        for player in world.iter(&query)? {
            if let Some(count) = counts.get(player) {
                self.ui.gem_count_changed(count.0);
            }
            flags.set(player, false);
        }
        Ok(())
    }
}

/// Copies the player's position into the camera target.
pub struct CameraFollowSystem {
    target: Arc<CameraTarget>,
}

impl CameraFollowSystem {
    /// Writes into `target`.
    pub fn new(target: Arc<CameraTarget>) -> Self {
        Self { target }
    }
}

impl System for CameraFollowSystem {
    fn name(&self) -> &'static str {
        "camera_follow"
    }

    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(access(registry).read::<PlayerTag>().read::<Transform>().build()?)
    }

    fn requirements(&self, registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(vec![Requirement::component::<PlayerTag>(registry)?])
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        if let Some(position) = player_position(ctx.world())? {
            self.target.set(position);
        }
        Ok(())
    }
}

/// Role of an entity in a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Has [`PlayerTag`].
    Player,
    /// Has [`EnemyTag`].
    Enemy,
    /// Has [`ProjectileData`].
    Projectile,
    /// Has [`GemTag`].
    Gem,
}

/// Presentation view of one entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    /// Packed entity handle.
    pub entity: u64,
    /// Role of the entity.
    pub kind: EntityKind,
    /// Pose after the tick.
    pub transform: Transform,
    /// Horizontal facing sign, if the entity has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<f32>,
    /// Animation state, player only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationIndex>,
    /// Current hit points, if the entity has any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_points: Option<i32>,
}

/// Serialisable view of the world after a tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameSnapshot {
    /// Tick that produced the snapshot.
    pub tick: Tick,
    /// Elapsed session time in seconds.
    pub elapsed: f64,
    /// Set once the player has died.
    pub game_over: bool,
    /// Gems the player picked up.
    pub gems_collected: u32,
    /// Visible entities in slot order.
    pub entities: Vec<EntityView>,
}

fn kind_of(world: &World, entity: Entity) -> Option<EntityKind> {
    if world.has::<PlayerTag>(entity) {
        Some(EntityKind::Player)
    } else if world.has::<EnemyTag>(entity) {
        Some(EntityKind::Enemy)
    } else if world.has::<ProjectileData>(entity) {
        Some(EntityKind::Projectile)
    } else if world.has::<GemTag>(entity) {
        Some(EntityKind::Gem)
    } else {
        None
    }
}

impl FrameSnapshot {
    /// Captures every visible entity, in slot order.
    pub fn capture(world: &World) -> ECSResult<Self> {
        let time = world.resource::<Time>().map(|t| *t).unwrap_or_default();
        let game_over = world.resource::<SessionState>().map(|s| s.game_over).unwrap_or(false);

        let query = world.query().with::<Transform>().build()?;
        let transforms = world.read::<Transform>()?;
        let facings = world.read::<FacingDirection>()?;
        let animations = world.read::<PlayerAnimation>()?;
        let hit_points = world.read::<CurrentHitPoints>()?;
        let counts = world.read::<GemCollectedCount>()?;

        let mut snapshot = FrameSnapshot {
            tick: time.tick,
            elapsed: time.elapsed,
            game_over,
            ..Default::default()
        };
        for entity in world.iter(&query)? {
            let (Some(kind), Some(transform)) = (kind_of(world, entity), transforms.get(entity)) else {
                continue;
            };
            if kind == EntityKind::Player {
                snapshot.gems_collected = counts.get(entity).map_or(0, |c| c.0);
            }
            snapshot.entities.push(EntityView {
                entity: entity.0,
                kind,
                transform: *transform,
                facing: facings.get(entity).map(|f| f.0),
                animation: animations.get(entity).map(|a| a.0),
                hit_points: hit_points.get(entity).map(|hp| hp.0),
            });
        }
        Ok(snapshot)
    }

    /// Entities of `kind`.
    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &EntityView> {
        self.entities.iter().filter(move |view| view.kind == kind)
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_ui_keeps_order() {
        let ui = RecordingUi::new();
        ui.gem_count_changed(1);
        ui.show_game_over();
        ui.gem_count_changed(2);
        assert_eq!(
            ui.signals(),
            vec![UiSignal::GemCount(1), UiSignal::GameOver, UiSignal::GemCount(2)]
        );
        assert_eq!(ui.game_overs(), 1);
        assert_eq!(ui.last_gem_count(), Some(2));
    }

    #[test]
    fn snapshot_lists_known_kinds_only() {
        let mut world = World::new();
        crate::game::components::register_components(&mut world).unwrap();
        let player = world.spawn().unwrap();
        world.attach(player, PlayerTag).unwrap();
        world.attach(player, Transform::at(Vec2::new(1.0, 0.0))).unwrap();
        world.attach(player, GemCollectedCount(3)).unwrap();
        let prop = world.spawn().unwrap();
        world.attach(prop, Transform::default()).unwrap();

        let snapshot = FrameSnapshot::capture(&world).unwrap();
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.gems_collected, 3);
        assert_eq!(snapshot.of_kind(EntityKind::Player).count(), 1);
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"player\""));
        assert!(!json.contains("hit_points"));
    }

    #[test]
    fn camera_target_starts_empty() {
        let camera = CameraTarget::new();
        assert_eq!(camera.get(), None);
        camera.set(Vec2::new(1.0, 2.0));
        assert_eq!(camera.get(), Some(Vec2::new(1.0, 2.0)));
    }
}
