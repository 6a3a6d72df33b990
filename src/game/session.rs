//! # Game session
//!
//! [`Game`] wires a [`World`], a [`Scheduler`] and the external
//! collaborators into one playable session.
//!
//! ## System order
//! ```text
//! Initialization   player_input
//! Simulation       enemy_cooldown_expiry, player_cooldown_expiry, enemy_chase,
//!                  character_move, projectile_flight, player_attack, spawner
//! PhysicsReaction  physics_step, collision_dispatch, damage_resolution, destruction
//! Presentation     gem_ui, camera_follow
//! ```
//! Registration order is the tie-breaker between conflicting systems of a
//! phase, so the list above is also the order in which they observe each
//! other's writes.

use std::sync::Arc;

use glam::Vec2;
use thiserror::Error;

use crate::engine::error::{ECSError, ECSResult};
use crate::engine::scheduler::{Phase, Scheduler, TickReport};
use crate::engine::time::Time;
use crate::engine::types::Entity;
use crate::engine::world::World;
use crate::game::collision::CollisionDispatchSystem;
use crate::game::components::{
    register_components, EnemyCooldownExpiration, PlayerCooldownExpiration, SessionState,
};
use crate::game::config::{ConfigError, GameConfig};
use crate::game::cooldown::{CooldownExpirySystem, PlayerAttackSystem};
use crate::game::damage::DamageResolutionSystem;
use crate::game::destruction::DestructionSystem;
use crate::game::movement::{
    CharacterMoveSystem, EnemyChaseSystem, FixedInput, InputSource, PlayerInputSystem,
    ProjectileFlightSystem,
};
use crate::game::physics::{KinematicPhysics, Physics, PhysicsBackend, PhysicsStepSystem};
use crate::game::prefabs::Prefabs;
use crate::game::presentation::{
    CameraFollowSystem, CameraTarget, FrameSnapshot, GemUiSystem, LogUi, UiSink,
};
use crate::game::spawner::SpawnerSystem;

/// Failures while building a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Registration or spawning failed.
    #[error(transparent)]
    Engine(#[from] ECSError),
}

/// External collaborators of a session.
pub struct Collaborators {
    /// Player input.
    pub input: Arc<dyn InputSource>,
    /// Receives game-over and gem signals.
    pub ui: Arc<dyn UiSink>,
    /// Follows the player.
    pub camera: Arc<CameraTarget>,
    /// Physics backend; `None` builds a [`KinematicPhysics`] from the config.
    pub physics: Option<Box<dyn PhysicsBackend>>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            input: Arc::new(FixedInput(Vec2::ZERO)),
            ui: Arc::new(LogUi),
            camera: Arc::new(CameraTarget::new()),
            physics: None,
        }
    }
}

/// One running session.
pub struct Game {
    world: World,
    scheduler: Scheduler,
    config: GameConfig,
    prefabs: Prefabs,
    player: Entity,
    camera: Arc<CameraTarget>,
}

impl Game {
    /// Builds the world, registers every system and creates the player and
    /// the spawner.
    pub fn new(config: GameConfig, collaborators: Collaborators) -> Result<Self, SessionError> {
        config.validate()?;
        let Collaborators { input, ui, camera, physics } = collaborators;

        let mut world = World::new();
        register_components(&mut world)?;
        world.insert_resource(Time::default())?;
        let backend: Box<dyn PhysicsBackend> = match physics {
            Some(backend) => backend,
            None => Box::new(KinematicPhysics::new(config.physics.cell_size)),
        };
        world.insert_resource(Physics(backend))?;

        let prefabs = Prefabs::register(&mut world, &config);
        let scheduler = build_scheduler(&world, &config, input, ui, camera.clone())?;

        let player = world.instantiate(prefabs.player)?;
        world.instantiate(prefabs.spawner)?;
        log::info!(
            "session ready: player {player}, {} systems, spawner seed {}",
            scheduler.len(),
            config.spawner.seed
        );

        Ok(Self { world, scheduler, config, prefabs, player, camera })
    }

    /// Runs one tick with the configured delta.
    pub fn tick(&mut self) -> ECSResult<TickReport> {
        let delta = self.config.simulation.delta_time;
        self.tick_with(delta)
    }

    /// Runs one tick of `delta` seconds.
    pub fn tick_with(&mut self, delta: f32) -> ECSResult<TickReport> {
        let was_over = self.is_over();
        let report = self.scheduler.tick(&mut self.world, delta)?;
        if !was_over && self.is_over() {
            log::info!("session ended at tick {}", report.tick);
        }
        Ok(report)
    }

    /// Runs up to `ticks` ticks, stopping early once the game is over.
    /// Returns the number of ticks run.
    pub fn run(&mut self, ticks: u64) -> ECSResult<u64> {
        let mut ran = 0;
        while ran < ticks && !self.is_over() {
            self.tick()?;
            ran += 1;
        }
        Ok(ran)
    }

    /// `true` once the player has been destroyed.
    pub fn is_over(&self) -> bool {
        self.world
            .resource::<SessionState>()
            .map(|state| state.game_over)
            .unwrap_or(false)
    }

    /// Captures the world as of the last tick.
    pub fn snapshot(&self) -> ECSResult<FrameSnapshot> {
        FrameSnapshot::capture(&self.world)
    }

    /// The simulated world.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for setup outside of ticks.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Scheduler, for adding systems.
    pub fn scheduler(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// The player entity.
    pub fn player(&self) -> Entity {
        self.player
    }

    /// Registered templates.
    pub fn prefabs(&self) -> Prefabs {
        self.prefabs
    }

    /// Configuration the session was built from.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Shared camera target.
    pub fn camera(&self) -> &Arc<CameraTarget> {
        &self.camera
    }
}

fn build_scheduler(
    world: &World,
    config: &GameConfig,
    input: Arc<dyn InputSource>,
    ui: Arc<dyn UiSink>,
    camera: Arc<CameraTarget>,
) -> ECSResult<Scheduler> {
    let mut scheduler = Scheduler::with_threads(config.simulation.worker_threads)?;

    scheduler.add_system(world, Phase::Initialization, PlayerInputSystem::new(input))?;

    scheduler.add_system(
        world,
        Phase::Simulation,
        CooldownExpirySystem::<EnemyCooldownExpiration>::new("enemy_cooldown_expiry"),
    )?;
    scheduler.add_system(
        world,
        Phase::Simulation,
        CooldownExpirySystem::<PlayerCooldownExpiration>::new("player_cooldown_expiry"),
    )?;
    scheduler.add_system(world, Phase::Simulation, EnemyChaseSystem)?;
    scheduler.add_system(world, Phase::Simulation, CharacterMoveSystem::new(world)?)?;
    scheduler.add_system(world, Phase::Simulation, ProjectileFlightSystem)?;
    scheduler.add_system(world, Phase::Simulation, PlayerAttackSystem)?;
    scheduler.add_system(world, Phase::Simulation, SpawnerSystem)?;

    scheduler.add_system(world, Phase::PhysicsReaction, PhysicsStepSystem)?;
    scheduler.add_system(world, Phase::PhysicsReaction, CollisionDispatchSystem::default())?;
    scheduler.add_system(world, Phase::PhysicsReaction, DamageResolutionSystem)?;
    scheduler.add_system(world, Phase::PhysicsReaction, DestructionSystem::new(ui.clone()))?;

    scheduler.add_system(world, Phase::Presentation, GemUiSystem::new(ui))?;
    scheduler.add_system(world, Phase::Presentation, CameraFollowSystem::new(camera))?;
    Ok(scheduler)
}
