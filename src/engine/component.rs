//! Per-world type registry.
//!
//! Assigns compact [`ComponentID`] values to Rust types. Each [`World`] owns
//! one registry; component columns and resources share its ID space so that
//! systems can declare access to both through the same [`AccessSets`].
//!
//! IDs are dense, start at zero and never change once assigned;
//! re-registering a type returns its existing ID.
//!
//! [`World`]: crate::engine::world::World
//! [`AccessSets`]: crate::engine::types::AccessSets

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::engine::error::RegistryError;
use crate::engine::types::{ComponentID, COMPONENT_CAP};

/// Marker for types that can be stored in a world.
///
/// Implemented for every `Send + Sync + 'static` type.
pub trait Component: Send + Sync + 'static {}

impl<T: Send + Sync + 'static> Component for T {}

/// Whether a registered type lives in a per-entity column or as a singleton
/// resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Per-entity column.
    Column,
    /// World-wide singleton value.
    Resource,
}

/// What the registry remembers about a type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Registration {
    /// Rust type name, used in error messages.
    pub name: &'static str,
    /// Storage kind the type was first registered with.
    pub kind: StorageKind,
}

/// Mapping between Rust types and [`ComponentID`] values for one world.
#[derive(Default, Debug)]
pub struct ComponentRegistry {
    by_type: HashMap<TypeId, ComponentID>,
    by_id: Vec<Registration>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `T` and returns its ID. Idempotent.
    pub fn register<T: Component>(&mut self, kind: StorageKind) -> Result<ComponentID, RegistryError> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&type_id) {
            return Ok(existing);
        }
        if self.by_id.len() >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded { capacity: COMPONENT_CAP });
        }

        let id = self.by_id.len() as ComponentID;
        self.by_type.insert(type_id, id);
        self.by_id.push(Registration { name: type_name::<T>(), kind });
        Ok(id)
    }

    /// Returns the ID of `T`, if registered.
    #[inline]
    pub fn id_of<T: 'static>(&self) -> Option<ComponentID> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the ID of `T` or an [`RegistryError::Unregistered`] error.
    #[inline]
    pub fn require<T: 'static>(&self) -> Result<ComponentID, RegistryError> {
        self.id_of::<T>()
            .ok_or(RegistryError::Unregistered { name: type_name::<T>() })
    }

    /// Returns the ID registered for a runtime `TypeId`.
    #[inline]
    pub fn id_of_type_id(&self, type_id: TypeId) -> Option<ComponentID> {
        self.by_type.get(&type_id).copied()
    }

    /// Registration record of `component_id`.
    #[inline]
    pub fn describe(&self, component_id: ComponentID) -> Option<&Registration> {
        self.by_id.get(component_id as usize)
    }

    /// Number of registered types.
    #[inline]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health;
    struct Clock;

    #[test]
    fn registration_is_idempotent_and_dense() {
        let mut registry = ComponentRegistry::new();
        let a = registry.register::<Health>(StorageKind::Column).unwrap();
        let b = registry.register::<Clock>(StorageKind::Resource).unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(registry.register::<Health>(StorageKind::Column).unwrap(), a);
        assert_eq!(registry.describe(b).unwrap().kind, StorageKind::Resource);
    }

    #[test]
    fn unregistered_lookup_names_the_type() {
        let registry = ComponentRegistry::new();
        let err = registry.require::<Health>().unwrap_err();
        assert!(err.to_string().contains("Health"));
    }
}
