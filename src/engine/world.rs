//! # World
//!
//! Owns entities, component tables, resources and templates.
//!
//! ## Purpose
//! `World` is the single store every system reads and writes. Structural
//! changes (spawning, destroying, attaching, removing) require `&mut World`
//! and therefore only happen outside system execution: at setup time or
//! during command-buffer playback at a barrier.
//!
//! Systems receive `&World` and borrow individual columns through
//! [`World::read`] and [`World::write`]. Borrows are non-blocking: a column
//! already borrowed incompatibly yields [`ExecutionError::BorrowConflict`]
//! rather than waiting, which surfaces undeclared access immediately.
//!
//! ## Enabled bits
//! Every component slot carries an enabled bit next to its presence bit.
//! Toggling it needs only `&World` and never restructures storage.
//! Newly attached components start enabled; overwriting an existing value
//! keeps its bit.
//!
//! ## Parallel passes
//! `par_for_each_*` split the touched columns into partitions of
//! [`PARTITION_ROWS`] slots and visit them on the rayon pool. Every slot
//! belongs to exactly one partition, so workers never alias.

use std::any::{type_name, TypeId};

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};
use rayon::prelude::*;

use crate::engine::commands::{CommandBuffer, PlaybackReport};
use crate::engine::component::{Component, ComponentRegistry, StorageKind};
use crate::engine::entity::Entities;
use crate::engine::error::{
    AttributeError, ECSError, ECSResult, ExecutionError, RegistryError, SpawnError,
};
use crate::engine::query::{Matcher, Query, QueryBuilder, QueryIter};
use crate::engine::storage::{Column, ComponentTable, ResourceCell};
use crate::engine::template::{Template, TemplateId, TemplateRegistry};
use crate::engine::types::{ComponentID, Entity, PARTITION_ROWS};

/// Entity and component store.
#[derive(Default, Debug)]
pub struct World {
    registry: ComponentRegistry,
    entities: Entities,
    tables: Vec<Option<ComponentTable>>,
    resources: Vec<Option<ResourceCell>>,
    templates: TemplateRegistry,
}

impl World {
    /// Creates an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Type registry of this world.
    #[inline]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Entity allocator of this world.
    #[inline]
    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Number of live entities.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Registers `T` as a component and creates its table. Idempotent.
    pub fn register_component<T: Component>(&mut self) -> ECSResult<ComponentID> {
        let id = self.registry.register::<T>(StorageKind::Column)?;
        let slot = id as usize;
        if self.tables.len() <= slot {
            self.tables.resize_with(slot + 1, || None);
        }
        if self.tables[slot].is_none() {
            self.tables[slot] = Some(ComponentTable::new::<T>(id));
        }
        Ok(id)
    }

    fn table<T: 'static>(&self) -> ECSResult<&ComponentTable> {
        let id = self.registry.require::<T>()?;
        self.tables
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| RegistryError::Unregistered { name: type_name::<T>() }.into())
    }

    fn table_of(&self, type_id: TypeId) -> Option<&ComponentTable> {
        let id = self.registry.id_of_type_id(type_id)?;
        self.tables.get(id as usize).and_then(Option::as_ref)
    }

    fn table_of_mut(&mut self, type_id: TypeId) -> Option<&mut ComponentTable> {
        let id = self.registry.id_of_type_id(type_id)?;
        self.tables.get_mut(id as usize).and_then(Option::as_mut)
    }

    // Templates

    /// Registers an entity template.
    pub fn register_template(&mut self, template: Template) -> TemplateId {
        self.templates.register(template)
    }

    /// Registered templates.
    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    // Structural changes

    /// Creates an entity with no components.
    pub fn spawn(&mut self) -> ECSResult<Entity> {
        Ok(self.entities.spawn()?)
    }

    /// Creates an entity from a registered template.
    ///
    /// If attaching any prototype fails the partial entity is destroyed.
    pub fn instantiate(&mut self, template: TemplateId) -> ECSResult<Entity> {
        let template = self
            .templates
            .get(template)
            .cloned()
            .ok_or(SpawnError::UnknownTemplate(template))?;
        let entity = self.spawn()?;
        if let Err(error) = template.apply(self, entity) {
            self.destroy(entity);
            return Err(error);
        }
        Ok(entity)
    }

    /// Destroys `entity` and drops all of its components.
    ///
    /// Returns `false` if the handle was already stale.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        for table in self.tables.iter_mut().flatten() {
            if table.presence.get(index) {
                table.remove_slot(index);
            }
        }
        self.entities.despawn(entity)
    }

    /// Returns `true` if `entity` is live.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    fn insert<T: Component>(
        &mut self,
        entity: Entity,
        value: T,
        enabled: Option<bool>,
    ) -> ECSResult<()> {
        if !self.entities.is_alive(entity) {
            return Err(AttributeError::StaleEntity(entity).into());
        }
        let id = self.register_component::<T>()?;
        let capacity = self.entities.capacity();
        let table = self
            .tables
            .get_mut(id as usize)
            .and_then(Option::as_mut)
            .ok_or(RegistryError::Unregistered { name: type_name::<T>() })?;
        table.grow_to(capacity);

        let index = entity.index() as usize;
        let column = table
            .column
            .get_mut()
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(AttributeError::TypeMismatch { component_id: id, expected: type_name::<T>() })?;
        let replaced = column.insert(index, value).is_some();

        let enabled = enabled.unwrap_or_else(|| !replaced || table.enabled.get(index));
        table.presence.set(index, true);
        table.enabled.set(index, enabled);
        Ok(())
    }

    /// Attaches `value` to `entity`, replacing any existing `T`.
    pub fn attach<T: Component>(&mut self, entity: Entity, value: T) -> ECSResult<()> {
        self.insert(entity, value, None)
    }

    /// Attaches `value` to `entity` with its enabled bit cleared.
    pub fn attach_disabled<T: Component>(&mut self, entity: Entity, value: T) -> ECSResult<()> {
        self.insert(entity, value, Some(false))
    }

    /// Detaches and returns `T` from `entity`.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> ECSResult<Option<T>> {
        if !self.entities.is_alive(entity) {
            return Err(AttributeError::StaleEntity(entity).into());
        }
        let Some(table) = self.table_of_mut(TypeId::of::<T>()) else {
            return Ok(None);
        };
        let index = entity.index() as usize;
        let id = table.component_id;
        let value = table
            .column
            .get_mut()
            .as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(AttributeError::TypeMismatch { component_id: id, expected: type_name::<T>() })?
            .take(index);
        table.presence.set(index, false);
        table.enabled.set(index, false);
        Ok(value)
    }

    pub(crate) fn remove_erased(&mut self, entity: Entity, type_id: TypeId) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        self.table_of_mut(type_id)
            .map_or(false, |table| table.remove_slot(entity.index() as usize))
    }

    pub(crate) fn set_enabled_erased(&self, entity: Entity, type_id: TypeId, enabled: bool) -> bool {
        if !self.entities.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        match self.table_of(type_id) {
            Some(table) if table.presence.get(index) => table.enabled.set(index, enabled),
            _ => false,
        }
    }

    /// Replays `buffer` against this world.
    pub fn playback(&mut self, buffer: CommandBuffer) -> ECSResult<PlaybackReport> {
        buffer.playback(self)
    }

    // Presence and enabled bits

    /// Returns `true` if `entity` holds `T`, enabled or not.
    pub fn has<T: 'static>(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
            && self
                .table_of(TypeId::of::<T>())
                .map_or(false, |table| table.presence.get(entity.index() as usize))
    }

    /// Returns `true` if `entity` holds `T` and it is enabled.
    pub fn is_enabled<T: 'static>(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
            && self
                .table_of(TypeId::of::<T>())
                .map_or(false, |table| table.enabled.get(entity.index() as usize))
    }

    /// Sets the enabled bit of `T` on `entity`.
    ///
    /// Returns `Ok(false)` if the entity is stale or does not hold `T`.
    pub fn set_enabled<T: 'static>(&self, entity: Entity, enabled: bool) -> ECSResult<bool> {
        self.table::<T>()?;
        Ok(self.set_enabled_erased(entity, TypeId::of::<T>(), enabled))
    }

    /// Handle for toggling the enabled bit of `T` from inside a pass.
    pub fn flags<T: 'static>(&self) -> ECSResult<EnabledFlags<'_>> {
        Ok(EnabledFlags { table: self.table::<T>()?, entities: &self.entities })
    }

    /// Returns `true` if any entity holds the component `id`.
    pub fn any_with(&self, id: ComponentID) -> bool {
        self.tables
            .get(id as usize)
            .and_then(Option::as_ref)
            .map_or(false, |table| table.presence.any())
    }

    // Column access

    /// Borrows the `T` column for reading.
    pub fn read<T: Component>(&self) -> ECSResult<ColumnRef<'_, T>> {
        let table = self.table::<T>()?;
        let guard = table
            .column
            .try_read()
            .ok_or(ExecutionError::BorrowConflict { name: table.name, mode: "read" })?;
        let column = RwLockReadGuard::try_map(guard, |c| (**c).as_any().downcast_ref::<Column<T>>())
            .map_err(|_| mismatch::<T>(table))?;
        Ok(ColumnRef { column, table, entities: &self.entities })
    }

    /// Borrows the `T` column for writing.
    pub fn write<T: Component>(&self) -> ECSResult<ColumnMut<'_, T>> {
        let table = self.table::<T>()?;
        let guard = table
            .column
            .try_write()
            .ok_or(ExecutionError::BorrowConflict { name: table.name, mode: "write" })?;
        let column =
            RwLockWriteGuard::try_map(guard, |c| (**c).as_any_mut().downcast_mut::<Column<T>>())
                .map_err(|_| mismatch::<T>(table))?;
        Ok(ColumnMut { column, table, entities: &self.entities })
    }

    /// Borrows one component value. `None` if absent, stale or contended.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<MappedRwLockReadGuard<'_, T>> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let index = entity.index() as usize;
        let guard = self.table::<T>().ok()?.column.try_read()?;
        RwLockReadGuard::try_map(guard, |c| {
            (**c).as_any().downcast_ref::<Column<T>>().and_then(|col| col.get(index))
        })
        .ok()
    }

    /// Mutably borrows one component value. `None` if absent, stale or contended.
    pub fn get_mut<T: Component>(&self, entity: Entity) -> Option<MappedRwLockWriteGuard<'_, T>> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        let index = entity.index() as usize;
        let guard = self.table::<T>().ok()?.column.try_write()?;
        RwLockWriteGuard::try_map(guard, |c| {
            (**c).as_any_mut().downcast_mut::<Column<T>>().and_then(|col| col.get_mut(index))
        })
        .ok()
    }

    /// Copies one component value out.
    pub fn cloned<T: Component + Clone>(&self, entity: Entity) -> Option<T> {
        self.get::<T>(entity).map(|value| value.clone())
    }

    // Queries

    /// Starts building a query against this world's registry.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(&self.registry)
    }

    /// Binds `query` to this world's tables.
    pub fn matcher(&self, query: &Query) -> ECSResult<Matcher<'_>> {
        Ok(Matcher::new(&self.tables, &self.entities, query)?)
    }

    /// Lazily iterates the entities matching `query`.
    pub fn iter(&self, query: &Query) -> ECSResult<QueryIter<'_>> {
        Ok(self.matcher(query)?.into_iter())
    }

    /// Number of entities matching `query`.
    pub fn count(&self, query: &Query) -> ECSResult<usize> {
        Ok(self.iter(query)?.count())
    }

    /// First entity matching `query` in slot order.
    pub fn first(&self, query: &Query) -> ECSResult<Option<Entity>> {
        Ok(self.iter(query)?.next())
    }

    /// Runs `f` on every `W` of entities matching `query`, in parallel.
    pub fn par_for_each_write<W, F>(&self, query: &Query, f: F) -> ECSResult<()>
    where
        W: Component,
        F: Fn(Entity, &mut W) + Send + Sync,
    {
        let matcher = self.matcher(query)?;
        let mut column = self.write::<W>()?;
        let slots = column.partition_slots();
        slots
            .par_chunks_mut(PARTITION_ROWS)
            .enumerate()
            .for_each(|(partition, chunk)| {
                let start = partition * PARTITION_ROWS;
                matcher.for_each_in(start..start + chunk.len(), |offset, entity| {
                    if let Some(value) = chunk[offset].as_mut() {
                        f(entity, value);
                    }
                });
            });
        Ok(())
    }

    /// Runs `f` with a shared `R` and a mutable `W` for every match, in parallel.
    pub fn par_for_each_read_write<R, W, F>(&self, query: &Query, f: F) -> ECSResult<()>
    where
        R: Component,
        W: Component,
        F: Fn(Entity, &R, &mut W) + Send + Sync,
    {
        let matcher = self.matcher(query)?;
        let read = self.read::<R>()?;
        let mut write = self.write::<W>()?;
        let source = read.column.slots();
        let slots = write.partition_slots();
        slots
            .par_chunks_mut(PARTITION_ROWS)
            .enumerate()
            .for_each(|(partition, chunk)| {
                let start = partition * PARTITION_ROWS;
                matcher.for_each_in(start..start + chunk.len(), |offset, entity| {
                    let input = source.get(start + offset).and_then(Option::as_ref);
                    if let (Some(input), Some(output)) = (input, chunk[offset].as_mut()) {
                        f(entity, input, output);
                    }
                });
            });
        Ok(())
    }

    /// Runs `f` with mutable `A` and `B` for every match, in parallel.
    pub fn par_for_each_write2<A, B, F>(&self, query: &Query, f: F) -> ECSResult<()>
    where
        A: Component,
        B: Component,
        F: Fn(Entity, &mut A, &mut B) + Send + Sync,
    {
        let matcher = self.matcher(query)?;
        let mut first = self.write::<A>()?;
        let mut second = self.write::<B>()?;
        let a = first.partition_slots();
        let b = second.partition_slots();
        a.par_chunks_mut(PARTITION_ROWS)
            .zip(b.par_chunks_mut(PARTITION_ROWS))
            .enumerate()
            .for_each(|(partition, (ca, cb))| {
                let start = partition * PARTITION_ROWS;
                matcher.for_each_in(start..start + ca.len(), |offset, entity| {
                    if let (Some(x), Some(y)) = (ca[offset].as_mut(), cb[offset].as_mut()) {
                        f(entity, x, y);
                    }
                });
            });
        Ok(())
    }

    // Resources

    /// Inserts or replaces the resource `T`.
    pub fn insert_resource<T: Component>(&mut self, value: T) -> ECSResult<()> {
        let slot = self.registry.register::<T>(StorageKind::Resource)? as usize;
        if self.resources.len() <= slot {
            self.resources.resize_with(slot + 1, || None);
        }
        self.resources[slot] = Some(ResourceCell::new(value));
        Ok(())
    }

    fn resource_cell<T: 'static>(&self) -> ECSResult<&ResourceCell> {
        self.registry
            .id_of::<T>()
            .and_then(|id| self.resources.get(id as usize))
            .and_then(Option::as_ref)
            .ok_or_else(|| ExecutionError::MissingResource { name: type_name::<T>() }.into())
    }

    /// Returns `true` if resource `T` is present.
    pub fn has_resource<T: 'static>(&self) -> bool {
        self.resource_cell::<T>().is_ok()
    }

    /// Returns `true` if the resource with `id` is present.
    pub fn has_resource_id(&self, id: ComponentID) -> bool {
        matches!(self.resources.get(id as usize), Some(Some(_)))
    }

    /// Borrows resource `T` for reading.
    pub fn resource<T: Component>(&self) -> ECSResult<MappedRwLockReadGuard<'_, T>> {
        let cell = self.resource_cell::<T>()?;
        let guard = cell
            .value
            .try_read()
            .ok_or(ExecutionError::BorrowConflict { name: cell.name, mode: "read" })?;
        RwLockReadGuard::try_map(guard, |value| (**value).downcast_ref::<T>())
            .map_err(|_| ExecutionError::MissingResource { name: type_name::<T>() }.into())
    }

    /// Borrows resource `T` for writing.
    pub fn resource_mut<T: Component>(&self) -> ECSResult<MappedRwLockWriteGuard<'_, T>> {
        let cell = self.resource_cell::<T>()?;
        let guard = cell
            .value
            .try_write()
            .ok_or(ExecutionError::BorrowConflict { name: cell.name, mode: "write" })?;
        RwLockWriteGuard::try_map(guard, |value| (**value).downcast_mut::<T>())
            .map_err(|_| ExecutionError::MissingResource { name: type_name::<T>() }.into())
    }

    /// Removes and returns resource `T`.
    pub fn remove_resource<T: Component>(&mut self) -> Option<T> {
        let id = self.registry.id_of::<T>()? as usize;
        let cell = self.resources.get_mut(id)?.take()?;
        cell.value.into_inner().downcast::<T>().ok().map(|boxed| *boxed)
    }
}

fn mismatch<T>(table: &ComponentTable) -> ECSError {
    AttributeError::TypeMismatch { component_id: table.component_id, expected: type_name::<T>() }
        .into()
}

/// Shared borrow of one component column.
pub struct ColumnRef<'w, T> {
    column: MappedRwLockReadGuard<'w, Column<T>>,
    table: &'w ComponentTable,
    entities: &'w Entities,
}

impl<'w, T> ColumnRef<'w, T> {
    /// Value of `entity`, if live and present.
    #[inline]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.column.get(entity.index() as usize)
    }

    /// Returns `true` if the value of `entity` is present and enabled.
    #[inline]
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity) && self.table.enabled.get(entity.index() as usize)
    }
}

/// Exclusive borrow of one component column.
pub struct ColumnMut<'w, T> {
    column: MappedRwLockWriteGuard<'w, Column<T>>,
    table: &'w ComponentTable,
    entities: &'w Entities,
}

impl<'w, T> ColumnMut<'w, T> {
    /// Value of `entity`, if live and present.
    #[inline]
    pub fn get(&self, entity: Entity) -> Option<&T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.column.get(entity.index() as usize)
    }

    /// Mutable value of `entity`, if live and present.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.entities.is_alive(entity) {
            return None;
        }
        self.column.get_mut(entity.index() as usize)
    }

    /// Returns `true` if the value of `entity` is present and enabled.
    #[inline]
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity) && self.table.enabled.get(entity.index() as usize)
    }

    /// Sets the enabled bit of `entity`'s value. Returns `false` if absent.
    pub fn set_enabled(&self, entity: Entity, enabled: bool) -> bool {
        let index = entity.index() as usize;
        self.entities.is_alive(entity)
            && self.table.presence.get(index)
            && self.table.enabled.set(index, enabled)
    }

    fn partition_slots(&mut self) -> &mut [Option<T>] {
        self.column.ensure_len(self.entities.capacity());
        self.column.slots_mut()
    }
}

/// Toggles the enabled bit of one component type without borrowing its column.
#[derive(Clone, Copy)]
pub struct EnabledFlags<'w> {
    table: &'w ComponentTable,
    entities: &'w Entities,
}

impl EnabledFlags<'_> {
    /// Returns `true` if `entity` holds the component and it is enabled.
    pub fn get(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity) && self.table.enabled.get(entity.index() as usize)
    }

    /// Sets the enabled bit. Returns `false` if `entity` does not hold the component.
    pub fn set(&self, entity: Entity, enabled: bool) -> bool {
        let index = entity.index() as usize;
        self.entities.is_alive(entity)
            && self.table.presence.get(index)
            && self.table.enabled.set(index, enabled)
    }
}
