//! # Commands
//!
//! Deferred structural mutations and their playback.
//!
//! ## Purpose
//! Systems run against a shared `&World` and may not create, destroy or
//! restructure entities directly. They record [`Command`]s into a
//! [`CommandBuffer`] instead; the scheduler replays the buffer at a barrier
//! with exclusive access to the world.
//!
//! ## Provisional handles
//! `instantiate` and `spawn` return a [`ProvisionalEntity`]. Later commands in
//! the same buffer may target it; playback maps it to the real entity once
//! the creating command has been applied. Handles are scoped to the buffer
//! that produced them.
//!
//! ## Invariants
//! - Commands apply in recording order.
//! - A command whose live target was destroyed before playback is skipped
//!   and counted in [`PlaybackReport::skipped`].
//! - A provisional handle from another buffer is a [`PlaybackError`].

use std::any::{type_name, TypeId};

use crate::engine::component::Component;
use crate::engine::error::{ECSResult, PlaybackError};
use crate::engine::template::TemplateId;
use crate::engine::types::Entity;
use crate::engine::world::World;

/// Placeholder for an entity that will exist after playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvisionalEntity(u32);

impl ProvisionalEntity {
    /// Position of the creating command among this buffer's creations.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Target of a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityRef {
    /// An entity that existed when the command was recorded.
    Live(Entity),
    /// An entity created earlier in the same buffer.
    Provisional(ProvisionalEntity),
}

impl From<Entity> for EntityRef {
    fn from(entity: Entity) -> Self {
        EntityRef::Live(entity)
    }
}

impl From<ProvisionalEntity> for EntityRef {
    fn from(entity: ProvisionalEntity) -> Self {
        EntityRef::Provisional(entity)
    }
}

/// A boxed component value waiting to be attached.
pub trait DeferredInsert: Send {
    /// Attaches the value to `entity`.
    fn insert(self: Box<Self>, world: &mut World, entity: Entity) -> ECSResult<()>;
    /// Type name of the value.
    fn type_name(&self) -> &'static str;
}

struct Pending<T>(T);

impl<T: Component> DeferredInsert for Pending<T> {
    fn insert(self: Box<Self>, world: &mut World, entity: Entity) -> ECSResult<()> {
        world.attach(entity, self.0)
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A recorded world mutation.
pub enum Command {
    /// Creates an entity from a registered template.
    Instantiate {
        /// Template to clone.
        template: TemplateId,
        /// Handle returned to the recorder.
        slot: ProvisionalEntity,
    },
    /// Creates an entity with no components.
    Spawn {
        /// Handle returned to the recorder.
        slot: ProvisionalEntity,
    },
    /// Destroys an entity and all of its components.
    Destroy {
        /// Entity to destroy.
        target: EntityRef,
    },
    /// Attaches or overwrites a component value.
    Set {
        /// Receiving entity.
        target: EntityRef,
        /// Value to attach.
        value: Box<dyn DeferredInsert>,
    },
    /// Removes a component.
    Remove {
        /// Entity losing the component.
        target: EntityRef,
        /// Component type.
        type_id: TypeId,
        /// Component type name, for logs.
        name: &'static str,
    },
    /// Sets the enabled bit of a component.
    SetEnabled {
        /// Entity holding the component.
        target: EntityRef,
        /// Component type.
        type_id: TypeId,
        /// Component type name, for logs.
        name: &'static str,
        /// New state.
        enabled: bool,
    },
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Instantiate { template, slot } => {
                write!(f, "Instantiate({template:?} -> {slot:?})")
            }
            Command::Spawn { slot } => write!(f, "Spawn({slot:?})"),
            Command::Destroy { target } => write!(f, "Destroy({target:?})"),
            Command::Set { target, value } => write!(f, "Set({target:?}, {})", value.type_name()),
            Command::Remove { target, name, .. } => write!(f, "Remove({target:?}, {name})"),
            Command::SetEnabled { target, name, enabled, .. } => {
                write!(f, "SetEnabled({target:?}, {name}, {enabled})")
            }
        }
    }
}

/// Outcome of replaying one buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    /// Entities created, indexed by provisional handle.
    pub created: Vec<Option<Entity>>,
    /// Number of entities destroyed.
    pub destroyed: usize,
    /// Commands applied.
    pub applied: usize,
    /// Commands skipped because their target no longer existed.
    pub skipped: usize,
}

impl PlaybackReport {
    /// Real entity behind a provisional handle, if it was created.
    pub fn resolve(&self, entity: ProvisionalEntity) -> Option<Entity> {
        self.created.get(entity.index()).copied().flatten()
    }

    /// Folds another report into this one. Created handles are not merged.
    pub fn absorb(&mut self, other: &PlaybackReport) {
        self.destroyed += other.destroyed;
        self.applied += other.applied;
        self.skipped += other.skipped;
    }
}

/// Ordered list of deferred commands.
#[derive(Default, Debug)]
pub struct CommandBuffer {
    commands: Vec<Command>,
    provisional: u32,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_provisional(&mut self) -> ProvisionalEntity {
        let slot = ProvisionalEntity(self.provisional);
        self.provisional += 1;
        slot
    }

    /// Records creation of an entity from `template`.
    pub fn instantiate(&mut self, template: TemplateId) -> ProvisionalEntity {
        let slot = self.next_provisional();
        self.commands.push(Command::Instantiate { template, slot });
        slot
    }

    /// Records creation of an empty entity.
    pub fn spawn(&mut self) -> ProvisionalEntity {
        let slot = self.next_provisional();
        self.commands.push(Command::Spawn { slot });
        slot
    }

    /// Records destruction of `target`.
    pub fn destroy(&mut self, target: impl Into<EntityRef>) {
        self.commands.push(Command::Destroy { target: target.into() });
    }

    /// Records attaching `value` to `target`, replacing any existing value.
    pub fn set_component<T: Component>(&mut self, target: impl Into<EntityRef>, value: T) {
        self.commands.push(Command::Set {
            target: target.into(),
            value: Box::new(Pending(value)),
        });
    }

    /// Records removal of `T` from `target`.
    pub fn remove_component<T: Component>(&mut self, target: impl Into<EntityRef>) {
        self.commands.push(Command::Remove {
            target: target.into(),
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        });
    }

    /// Records setting the enabled bit of `T` on `target`.
    pub fn set_enabled<T: Component>(&mut self, target: impl Into<EntityRef>, enabled: bool) {
        self.commands.push(Command::SetEnabled {
            target: target.into(),
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
            enabled,
        });
    }

    /// Number of recorded commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Recorded commands in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Applies every command to `world` in recording order.
    pub fn playback(self, world: &mut World) -> ECSResult<PlaybackReport> {
        let mut report = PlaybackReport {
            created: vec![None; self.provisional as usize],
            ..PlaybackReport::default()
        };

        for command in self.commands {
            match command {
                Command::Instantiate { template, slot } => {
                    let entity = world.instantiate(template)?;
                    report.created[slot.index()] = Some(entity);
                    report.applied += 1;
                }
                Command::Spawn { slot } => {
                    let entity = world.spawn()?;
                    report.created[slot.index()] = Some(entity);
                    report.applied += 1;
                }
                Command::Destroy { target } => match resolve(world, &report, target)? {
                    Some(entity) if world.destroy(entity) => {
                        report.destroyed += 1;
                        report.applied += 1;
                    }
                    _ => skip(&mut report, "destroy", target),
                },
                Command::Set { target, value } => match resolve(world, &report, target)? {
                    Some(entity) => {
                        value.insert(world, entity)?;
                        report.applied += 1;
                    }
                    None => skip(&mut report, value.type_name(), target),
                },
                Command::Remove { target, type_id, name } => {
                    match resolve(world, &report, target)? {
                        Some(entity) => {
                            world.remove_erased(entity, type_id);
                            report.applied += 1;
                        }
                        None => skip(&mut report, name, target),
                    }
                }
                Command::SetEnabled { target, type_id, name, enabled } => {
                    match resolve(world, &report, target)? {
                        Some(entity) if world.set_enabled_erased(entity, type_id, enabled) => {
                            report.applied += 1;
                        }
                        _ => skip(&mut report, name, target),
                    }
                }
            }
        }
        Ok(report)
    }
}

fn resolve(
    world: &World,
    report: &PlaybackReport,
    target: EntityRef,
) -> Result<Option<Entity>, PlaybackError> {
    match target {
        EntityRef::Live(entity) => Ok(world.is_alive(entity).then_some(entity)),
        EntityRef::Provisional(slot) => match report.created.get(slot.index()) {
            Some(created) => Ok((*created).filter(|&entity| world.is_alive(entity))),
            None => Err(PlaybackError::ForeignProvisional(slot)),
        },
    }
}

fn skip(report: &mut PlaybackReport, what: &str, target: EntityRef) {
    log::debug!("skipping {what} on {target:?}: target no longer exists");
    report.skipped += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisional_handles_are_sequential_per_buffer() {
        let mut buffer = CommandBuffer::new();
        let a = buffer.spawn();
        let b = buffer.instantiate(TemplateId(0));
        buffer.set_component(b, 5u32);
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(buffer.len(), 3);

        let mut other = CommandBuffer::new();
        assert_eq!(other.spawn(), a);
    }

    #[test]
    fn debug_output_names_component_types() {
        let mut buffer = CommandBuffer::new();
        buffer.set_enabled::<u8>(Entity::from_parts(1, 0), true);
        let rendered = format!("{:?}", buffer.commands()[0]);
        assert!(rendered.contains("u8"));
        assert!(rendered.contains("true"));
    }
}
