//! Entity templates.
//!
//! A [`Template`] is a named list of component prototypes. Instantiating it
//! allocates an entity and attaches a clone of every prototype, preserving
//! each prototype's enabled state. Templates are registered once per world
//! and referred to by [`TemplateId`] from components and command buffers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::component::Component;
use crate::engine::error::ECSResult;
use crate::engine::types::Entity;
use crate::engine::world::World;

/// Handle to a registered [`Template`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub(crate) u32);

impl TemplateId {
    /// Position of the template in its registry.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One component value to clone into each instance.
pub trait ComponentPrototype: Send + Sync {
    /// Attaches a copy of the prototype to `entity`.
    fn apply(&self, world: &mut World, entity: Entity) -> ECSResult<()>;
    /// Type name of the prototype value.
    fn type_name(&self) -> &'static str;
}

struct Prototype<T> {
    value: T,
    enabled: bool,
}

impl<T: Component + Clone> ComponentPrototype for Prototype<T> {
    fn apply(&self, world: &mut World, entity: Entity) -> ECSResult<()> {
        if self.enabled {
            world.attach(entity, self.value.clone())
        } else {
            world.attach_disabled(entity, self.value.clone())
        }
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Named bundle of component prototypes.
pub struct Template {
    name: String,
    parts: Vec<Box<dyn ComponentPrototype>>,
}

impl Template {
    /// Starts an empty template.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parts: Vec::new() }
    }

    /// Adds an enabled component.
    pub fn with<T: Component + Clone>(mut self, value: T) -> Self {
        self.parts.push(Box::new(Prototype { value, enabled: true }));
        self
    }

    /// Adds a component whose enabled bit starts cleared.
    pub fn with_disabled<T: Component + Clone>(mut self, value: T) -> Self {
        self.parts.push(Box::new(Prototype { value, enabled: false }));
        self
    }

    /// Template name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of component prototypes.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Returns `true` if the template holds no components.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn apply(&self, world: &mut World, entity: Entity) -> ECSResult<()> {
        for part in &self.parts {
            part.apply(world, entity)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<_> = self.parts.iter().map(|p| p.type_name()).collect();
        f.debug_struct("Template").field("name", &self.name).field("parts", &parts).finish()
    }
}

/// Templates known to a world.
#[derive(Default, Debug)]
pub struct TemplateRegistry {
    templates: Vec<Arc<Template>>,
}

impl TemplateRegistry {
    /// Registers `template` and returns its handle.
    pub fn register(&mut self, template: Template) -> TemplateId {
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(Arc::new(template));
        id
    }

    /// Looks up a template.
    pub fn get(&self, id: TemplateId) -> Option<&Arc<Template>> {
        self.templates.get(id.index())
    }

    /// Finds a template by name.
    pub fn find(&self, name: &str) -> Option<TemplateId> {
        self.templates
            .iter()
            .position(|t| t.name == name)
            .map(|index| TemplateId(index as u32))
    }

    /// Number of registered templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if no template is registered.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
