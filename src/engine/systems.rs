//! ECS System Abstractions
//!
//! A **system** is a unit of logic that runs once per tick inside one phase.
//! Systems:
//! - declare which components and resources they read and write,
//! - may declare requirements that must hold for them to run at all,
//! - receive a [`SystemContext`] holding a shared world reference and the
//!   command buffers they record into.
//!
//! ## Scheduling Model
//!
//! Access sets are resolved against the world's registry once, when the
//! system is added to the [`Scheduler`]. Within a phase, systems whose sets
//! do not conflict share a stage and run in parallel; conflicting systems
//! keep their registration order.
//!
//! ## Structural changes
//!
//! Systems never restructure the world directly. They record into the
//! buffer of the barrier at which the change should become visible via
//! [`SystemContext::commands`]. Each system run gets its own buffers, which
//! the scheduler queues in system registration order.
//!
//! [`Scheduler`]: crate::engine::scheduler::Scheduler

use std::collections::BTreeMap;

use crate::engine::commands::CommandBuffer;
use crate::engine::component::ComponentRegistry;
use crate::engine::error::{ECSResult, RegistryError};
use crate::engine::scheduler::Barrier;
use crate::engine::time::Time;
use crate::engine::types::{AccessMode, AccessSets, ComponentID};
use crate::engine::world::World;

/// Precondition for a system to run in a given tick.
///
/// Unmet requirements skip the system silently; they are not errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Requirement {
    /// At least one entity holds the component.
    Component(ComponentID),
    /// The resource is present.
    Resource(ComponentID),
}

impl Requirement {
    /// Requires at least one entity holding `T`.
    pub fn component<T: 'static>(registry: &ComponentRegistry) -> Result<Self, RegistryError> {
        Ok(Requirement::Component(registry.require::<T>()?))
    }

    /// Requires resource `T`.
    pub fn resource<T: 'static>(registry: &ComponentRegistry) -> Result<Self, RegistryError> {
        Ok(Requirement::Resource(registry.require::<T>()?))
    }

    /// Evaluates the requirement against `world`.
    pub fn is_met(&self, world: &World) -> bool {
        match *self {
            Requirement::Component(id) => world.any_with(id),
            Requirement::Resource(id) => world.has_resource_id(id),
        }
    }
}

/// Builder for [`AccessSets`] keyed by Rust types.
pub struct AccessBuilder<'r> {
    registry: &'r ComponentRegistry,
    sets: AccessSets,
    error: Option<RegistryError>,
}

impl<'r> AccessBuilder<'r> {
    fn declare<T: 'static>(mut self, mode: AccessMode) -> Self {
        match self.registry.require::<T>() {
            Ok(id) => {
                self.sets.declare(id, mode);
            }
            Err(error) => {
                self.error.get_or_insert(error);
            }
        }
        self
    }

    /// Declares shared access to `T`.
    pub fn read<T: 'static>(self) -> Self {
        self.declare::<T>(AccessMode::Read)
    }

    /// Declares exclusive access to `T`, including its enabled bits.
    pub fn write<T: 'static>(self) -> Self {
        self.declare::<T>(AccessMode::Write)
    }

    /// Finishes the declaration.
    pub fn build(self) -> Result<AccessSets, RegistryError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.sets),
        }
    }
}

/// Starts an access declaration against `registry`.
pub fn access(registry: &ComponentRegistry) -> AccessBuilder<'_> {
    AccessBuilder { registry, sets: AccessSets::default(), error: None }
}

/// Everything a running system may touch.
pub struct SystemContext<'w> {
    world: &'w World,
    time: Time,
    buffers: BTreeMap<Barrier, CommandBuffer>,
}

impl<'w> SystemContext<'w> {
    /// Creates a context over `world` at `time`.
    pub fn new(world: &'w World, time: Time) -> Self {
        Self { world, time, buffers: BTreeMap::new() }
    }

    /// Shared world reference.
    #[inline]
    pub fn world(&self) -> &'w World {
        self.world
    }

    /// Clock of the current tick.
    #[inline]
    pub fn time(&self) -> Time {
        self.time
    }

    /// Buffer replayed at `barrier`.
    pub fn commands(&mut self, barrier: Barrier) -> &mut CommandBuffer {
        self.buffers.entry(barrier).or_default()
    }

    /// Consumes the context, returning the non-empty buffers.
    pub fn into_buffers(self) -> BTreeMap<Barrier, CommandBuffer> {
        self.buffers.into_iter().filter(|(_, b)| !b.is_empty()).collect()
    }
}

/// A unit of executable logic operating on the world.
///
/// Systems must be `Send + Sync` so they can be executed on worker threads.
pub trait System: Send + Sync {
    /// Human-readable name used in logs and traces.
    fn name(&self) -> &'static str;

    /// Component and resource access of this system.
    fn access(&self, registry: &ComponentRegistry) -> ECSResult<AccessSets>;

    /// Conditions that must hold for the system to run.
    fn requirements(&self, _registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(Vec::new())
    }

    /// Executes the system.
    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()>;
}

/// A concrete [`System`] backed by a function or closure.
pub struct FnSystem<F>
where
    F: Fn(&mut SystemContext<'_>) -> ECSResult<()> + Send + Sync + 'static,
{
    name: &'static str,
    access: AccessSets,
    requirements: Vec<Requirement>,
    f: F,
}

impl<F> FnSystem<F>
where
    F: Fn(&mut SystemContext<'_>) -> ECSResult<()> + Send + Sync + 'static,
{
    /// Creates a new function-backed system.
    pub fn new(name: &'static str, access: AccessSets, f: F) -> Self {
        Self { name, access, requirements: Vec::new(), f }
    }

    /// Adds a run requirement.
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }
}

impl<F> System for FnSystem<F>
where
    F: Fn(&mut SystemContext<'_>) -> ECSResult<()> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn access(&self, _registry: &ComponentRegistry) -> ECSResult<AccessSets> {
        Ok(self.access.clone())
    }

    fn requirements(&self, _registry: &ComponentRegistry) -> ECSResult<Vec<Requirement>> {
        Ok(self.requirements.clone())
    }

    fn run(&self, ctx: &mut SystemContext<'_>) -> ECSResult<()> {
        (self.f)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Position;
    struct Velocity;

    #[test]
    fn access_builder_collects_modes() {
        let mut world = World::new();
        let p = world.register_component::<Position>().unwrap();
        let v = world.register_component::<Velocity>().unwrap();
        let sets = access(world.registry()).read::<Velocity>().write::<Position>().build().unwrap();
        assert!(sets.read.contains(v));
        assert!(sets.write.contains(p));
        assert!(!sets.read.contains(p));
    }

    #[test]
    fn component_requirement_tracks_presence() {
        let mut world = World::new();
        world.register_component::<Position>().unwrap();
        let requirement = Requirement::component::<Position>(world.registry()).unwrap();
        assert!(!requirement.is_met(&world));
        let e = world.spawn().unwrap();
        world.attach(e, Position).unwrap();
        assert!(requirement.is_met(&world));
    }

    #[test]
    fn empty_buffers_are_dropped() {
        let world = World::new();
        let mut ctx = SystemContext::new(&world, Time::default());
        ctx.commands(Barrier::EndSimulation);
        ctx.commands(Barrier::BeginTick).spawn();
        let buffers = ctx.into_buffers();
        assert_eq!(buffers.keys().copied().collect::<Vec<_>>(), vec![Barrier::BeginTick]);
    }
}
