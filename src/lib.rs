//! # survivor_sim
//!
//! Parallel entity-component simulation core of a real-time arena-survival
//! game: the player fights waves of enemies, fires periodic area attacks,
//! collects gems, and the session ends when the player dies.
//!
//! ## Layout
//! - [`engine`]: the game-agnostic ECS. Slot-indexed component tables with
//!   enabled bits, lazy queries, templates, deferred command buffers and a
//!   phase scheduler that runs conflict-free systems in parallel.
//! - [`game`]: gameplay systems on top of the engine, plus the boundaries
//!   to physics, input, UI and camera collaborators.
//! - [`profiling`]: feature-gated Chrome trace output.
//!
//! Results do not depend on the worker count, and structural changes only
//! happen at barriers.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]
#![deny(dead_code)]

pub mod engine;
pub mod game;
pub mod profiling;

pub use profiling::profiler;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

// Core ECS types

pub use engine::world::{ColumnMut, ColumnRef, EnabledFlags, World};

pub use engine::types::{AccessMode, AccessSets, ComponentID, Entity, EntityID, Tick};

pub use engine::component::{Component, ComponentRegistry, StorageKind};

pub use engine::query::{Query, QueryBuilder};

pub use engine::template::{Template, TemplateId};

pub use engine::commands::{CommandBuffer, EntityRef, PlaybackReport, ProvisionalEntity};

pub use engine::systems::{access, FnSystem, Requirement, System, SystemContext};
pub use engine::scheduler::{Barrier, Phase, Scheduler, Stage, TickReport};
pub use engine::time::Time;

pub use engine::error::{
    AttributeError,
    ECSError,
    ECSResult,
    ExecutionError,
    PlaybackError,
    RegistryError,
    SpawnError,
};

// Gameplay

pub use game::config::{ConfigError, GameConfig};
pub use game::session::{Collaborators, Game, SessionError};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used types.
///
/// Import with:
/// ```rust
/// use survivor_sim::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        access,
        Barrier,
        CommandBuffer,
        ECSResult,
        Entity,
        FnSystem,
        Phase,
        Scheduler,
        System,
        SystemContext,
        Template,
        World,
        Game,
        GameConfig,
        Collaborators,
    };
    pub use crate::game::components::*;
}
