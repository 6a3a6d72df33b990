//! Error types for registration, spawning, storage access and execution.
//!
//! Each failure family gets its own small error type carrying enough context
//! to be actionable in a log line. Higher-level code bubbles them with `?`
//! into [`ECSError`], which callers can match on.
//!
//! Most of these represent programming errors (an unregistered component, a
//! system touching a column it never declared). Gameplay conditions such as
//! "no player yet" are never errors: the affected system is skipped for the
//! tick instead.

use thiserror::Error;

use crate::engine::commands::ProvisionalEntity;
use crate::engine::template::TemplateId;
use crate::engine::types::{ComponentID, Entity};

/// Failures of the per-world component/resource registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The type was never registered with this world.
    #[error("component `{name}` is not registered")]
    Unregistered {
        /// Rust type name of the offending type.
        name: &'static str,
    },

    /// A query names a component ID with no column in the world it is
    /// evaluated against.
    #[error("component id {id} has no column in this world")]
    NoColumn {
        /// ID carried by the query.
        id: ComponentID,
    },

    /// The world cannot register more types.
    #[error("component capacity exceeded ({capacity} types)")]
    CapacityExceeded {
        /// Configured registry capacity.
        capacity: usize,
    },
}

/// Returned when the entity allocator cannot hand out another slot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("entity limit reached ({entities_needed} needed; capacity {capacity})")]
pub struct CapacityError {
    /// Total entities the operation attempted to allocate.
    pub entities_needed: u64,
    /// Current capacity limiting the operation.
    pub capacity: u64,
}

/// Failures while creating entities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    /// The allocator is full.
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// `instantiate` named a template the registry does not know.
    #[error("unknown template {0:?}")]
    UnknownTemplate(TemplateId),
}

/// Failures touching a single component value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttributeError {
    /// The entity handle is no longer live.
    #[error("stale or dead entity reference {0:?}")]
    StaleEntity(Entity),

    /// A type-erased value did not match the column's element type.
    #[error("type mismatch for component {component_id}: expected `{expected}`")]
    TypeMismatch {
        /// Column that rejected the value.
        component_id: ComponentID,
        /// Element type of the column.
        expected: &'static str,
    },
}

/// Failures while running systems.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// A column or resource was already borrowed incompatibly. This only
    /// happens when a system touches a type it did not declare.
    #[error("borrow conflict on `{name}` ({mode})")]
    BorrowConflict {
        /// Type name of the contended column or resource.
        name: &'static str,
        /// "read" or "write".
        mode: &'static str,
    },

    /// A resource was requested that the world does not hold.
    #[error("missing resource `{name}`")]
    MissingResource {
        /// Type name of the resource.
        name: &'static str,
    },

    /// The dedicated worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    /// A system returned an error; wraps the system name for context.
    #[error("system `{system}` failed: {message}")]
    SystemFailed {
        /// Name of the failing system.
        system: &'static str,
        /// Rendered inner error.
        message: String,
    },
}

/// Failures while replaying a command buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// A provisional handle was used that this buffer never produced.
    #[error("provisional entity {0:?} was not created by this buffer")]
    ForeignProvisional(ProvisionalEntity),
}

/// Aggregate error type of the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ECSError {
    /// See [`RegistryError`].
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// See [`SpawnError`].
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    /// See [`AttributeError`].
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    /// See [`ExecutionError`].
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// See [`PlaybackError`].
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl From<CapacityError> for ECSError {
    fn from(error: CapacityError) -> Self {
        ECSError::Spawn(SpawnError::Capacity(error))
    }
}

/// Result alias used across the engine.
pub type ECSResult<T> = Result<T, ECSError>;
