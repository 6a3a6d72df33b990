//! # Queries
//!
//! Filters over the component tables of a world.
//!
//! A [`Query`] is plain data: four lists of component IDs describing which
//! entities match. It is built once, usually when a system is constructed,
//! and evaluated every tick.
//!
//! ## Filter terms
//! - `with::<T>()`     T is present, enabled or not
//! - `enabled::<T>()`  T is present and enabled
//! - `disabled::<T>()` T is present and disabled
//! - `without::<T>()`  T is absent
//!
//! ## Evaluation
//! Matching happens word by word over the atomic presence and enabled
//! bitsets, 64 slots at a time. Iteration is lazy and yields entities in
//! ascending slot order. Entities destroyed by an earlier barrier have their
//! presence bits cleared, so they never match.

use std::ops::Range;

use crate::engine::component::ComponentRegistry;
use crate::engine::entity::Entities;
use crate::engine::error::RegistryError;
use crate::engine::storage::{ComponentTable, FlagBits};
use crate::engine::types::{ComponentID, Entity, IndexID};

/// Compiled entity filter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    with: Vec<ComponentID>,
    enabled: Vec<ComponentID>,
    disabled: Vec<ComponentID>,
    without: Vec<ComponentID>,
}

impl Query {
    /// Returns `true` if the query names no component that must be present.
    pub fn is_unbounded(&self) -> bool {
        self.with.is_empty() && self.enabled.is_empty() && self.disabled.is_empty()
    }

    /// All component IDs mentioned by the query.
    pub fn components(&self) -> impl Iterator<Item = ComponentID> + '_ {
        self.with
            .iter()
            .chain(&self.enabled)
            .chain(&self.disabled)
            .chain(&self.without)
            .copied()
    }
}

/// Builder for [`Query`].
///
/// Lookup failures are deferred to [`QueryBuilder::build`] so that the filter
/// chain reads top to bottom.
pub struct QueryBuilder<'r> {
    registry: &'r ComponentRegistry,
    query: Query,
    error: Option<RegistryError>,
}

impl<'r> QueryBuilder<'r> {
    /// Starts an empty query against `registry`.
    pub fn new(registry: &'r ComponentRegistry) -> Self {
        Self { registry, query: Query::default(), error: None }
    }

    fn resolve<T: 'static>(&mut self) -> Option<ComponentID> {
        match self.registry.require::<T>() {
            Ok(id) => Some(id),
            Err(error) => {
                self.error.get_or_insert(error);
                None
            }
        }
    }

    /// Matches entities that hold `T`, enabled or not.
    pub fn with<T: 'static>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.query.with.push(id);
        }
        self
    }

    /// Matches entities whose `T` is present and enabled.
    pub fn enabled<T: 'static>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.query.enabled.push(id);
        }
        self
    }

    /// Matches entities whose `T` is present and disabled.
    pub fn disabled<T: 'static>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.query.disabled.push(id);
        }
        self
    }

    /// Matches entities that do not hold `T`.
    pub fn without<T: 'static>(mut self) -> Self {
        if let Some(id) = self.resolve::<T>() {
            self.query.without.push(id);
        }
        self
    }

    /// Finishes the query.
    pub fn build(self) -> Result<Query, RegistryError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.query),
        }
    }
}

/// A [`Query`] bound to the tables of one world.
#[derive(Clone)]
pub struct Matcher<'w> {
    entities: &'w Entities,
    with: Vec<&'w FlagBits>,
    enabled: Vec<(&'w FlagBits, &'w FlagBits)>,
    disabled: Vec<(&'w FlagBits, &'w FlagBits)>,
    without: Vec<&'w FlagBits>,
    unbounded: bool,
}

impl<'w> Matcher<'w> {
    pub(crate) fn new(
        tables: &'w [Option<ComponentTable>],
        entities: &'w Entities,
        query: &Query,
    ) -> Result<Self, RegistryError> {
        let table = |id: ComponentID| {
            tables
                .get(id as usize)
                .and_then(Option::as_ref)
                .ok_or(RegistryError::NoColumn { id })
        };

        let mut matcher = Matcher {
            entities,
            with: Vec::with_capacity(query.with.len()),
            enabled: Vec::with_capacity(query.enabled.len()),
            disabled: Vec::with_capacity(query.disabled.len()),
            without: Vec::with_capacity(query.without.len()),
            unbounded: query.is_unbounded(),
        };
        for &id in &query.with {
            matcher.with.push(&table(id)?.presence);
        }
        for &id in &query.enabled {
            let t = table(id)?;
            matcher.enabled.push((&t.presence, &t.enabled));
        }
        for &id in &query.disabled {
            let t = table(id)?;
            matcher.disabled.push((&t.presence, &t.enabled));
        }
        for &id in &query.without {
            matcher.without.push(&table(id)?.presence);
        }
        Ok(matcher)
    }

    /// Number of 64-slot words to scan.
    #[inline]
    pub fn word_len(&self) -> usize {
        (self.entities.capacity() + 63) / 64
    }

    /// Match mask for slots `64 * word_index ..`.
    pub fn word(&self, word_index: usize) -> u64 {
        let mut mask = if self.unbounded {
            self.entities.alive_word(word_index)
        } else {
            u64::MAX
        };
        for presence in &self.with {
            mask &= presence.word(word_index);
        }
        for (presence, enabled) in &self.enabled {
            mask &= presence.word(word_index) & enabled.word(word_index);
        }
        for (presence, enabled) in &self.disabled {
            mask &= presence.word(word_index) & !enabled.word(word_index);
        }
        for presence in &self.without {
            mask &= !presence.word(word_index);
        }
        mask
    }

    /// Returns `true` if slot `index` matches.
    #[inline]
    pub fn matches(&self, index: usize) -> bool {
        (self.word(index / 64) >> (index % 64)) & 1 == 1
    }

    /// Calls `f(offset, entity)` for every matching slot in `range`, where
    /// `offset` is relative to `range.start`. `range.start` must be a multiple
    /// of 64.
    pub fn for_each_in(&self, range: Range<usize>, mut f: impl FnMut(usize, Entity)) {
        debug_assert_eq!(range.start % 64, 0);
        let mut word_index = range.start / 64;
        while word_index * 64 < range.end {
            let mut bits = self.word(word_index);
            while bits != 0 {
                let index = word_index * 64 + bits.trailing_zeros() as usize;
                bits &= bits - 1;
                if index >= range.end {
                    break;
                }
                if let Some(entity) = self.entity_at(index) {
                    f(index - range.start, entity);
                }
            }
            word_index += 1;
        }
    }

    /// Live handle in slot `index`.
    #[inline]
    pub fn entity_at(&self, index: usize) -> Option<Entity> {
        self.entities.entity_at(index as IndexID)
    }
}

impl<'w> IntoIterator for Matcher<'w> {
    type Item = Entity;
    type IntoIter = QueryIter<'w>;

    fn into_iter(self) -> QueryIter<'w> {
        QueryIter { words: self.word_len(), matcher: self, next_word: 0, bits: 0, base: 0 }
    }
}

/// Lazy, single-pass iterator over matching entities.
pub struct QueryIter<'w> {
    matcher: Matcher<'w>,
    words: usize,
    next_word: usize,
    bits: u64,
    base: usize,
}

impl Iterator for QueryIter<'_> {
    type Item = Entity;

    fn next(&mut self) -> Option<Entity> {
        loop {
            while self.bits == 0 {
                if self.next_word >= self.words {
                    return None;
                }
                self.bits = self.matcher.word(self.next_word);
                self.base = self.next_word * 64;
                self.next_word += 1;
            }
            let tz = self.bits.trailing_zeros() as usize;
            self.bits &= self.bits - 1;
            if let Some(entity) = self.matcher.entity_at(self.base + tz) {
                return Some(entity);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::component::StorageKind;

    struct A;
    struct B;

    #[test]
    fn builder_reports_first_unregistered_type() {
        let mut registry = ComponentRegistry::new();
        registry.register::<A>(StorageKind::Column).unwrap();
        let err = QueryBuilder::new(&registry).with::<A>().without::<B>().build().unwrap_err();
        assert!(err.to_string().contains("B"));
    }

    #[test]
    fn unbounded_query_falls_back_to_liveness() {
        let mut registry = ComponentRegistry::new();
        registry.register::<A>(StorageKind::Column).unwrap();
        let query = QueryBuilder::new(&registry).without::<A>().build().unwrap();
        assert!(query.is_unbounded());
        assert_eq!(query.components().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn matcher_names_the_missing_column() {
        let mut registry = ComponentRegistry::new();
        registry.register::<A>(StorageKind::Column).unwrap();
        registry.register::<B>(StorageKind::Column).unwrap();
        let query = QueryBuilder::new(&registry).with::<A>().without::<B>().build().unwrap();

        let tables = [Some(ComponentTable::new::<A>(0))];
        let entities = Entities::new();
        let err = Matcher::new(&tables, &entities, &query).err();
        assert_eq!(err, Some(RegistryError::NoColumn { id: 1 }));
        assert_eq!(err.unwrap().to_string(), "component id 1 has no column in this world");
    }
}
