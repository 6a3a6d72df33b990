//! Entity allocation and liveness tracking.
//!
//! Slots are recycled through a free list. Every release bumps the slot's
//! version, so a handle that outlived its entity never aliases the next
//! occupant of the slot.

use crate::engine::error::CapacityError;
use crate::engine::types::{Entity, EntityID, IndexID, VersionID, INDEX_CAP};

/// Number of slots added whenever the free list runs dry.
const GROWTH: IndexID = 1024;

/// Slot allocator for one world.
#[derive(Default, Debug)]
pub struct Entities {
    versions: Vec<VersionID>,
    alive: Vec<bool>,
    free_store: Vec<IndexID>,
    live_count: usize,
}

impl Entities {
    /// Creates an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_capacity(&mut self, additional: IndexID) -> Result<(), CapacityError> {
        let current = self.versions.len() as EntityID;
        let entities_needed = current + additional as EntityID;
        let capacity = INDEX_CAP as EntityID + 1;
        if entities_needed > capacity {
            return Err(CapacityError { entities_needed, capacity });
        }

        self.versions.resize(entities_needed as usize, 0);
        self.alive.resize(entities_needed as usize, false);

        // Reverse so that popping hands out the lowest index first.
        for index in (current..entities_needed).rev() {
            self.free_store.push(index as IndexID);
        }
        Ok(())
    }

    /// Allocates a fresh entity handle.
    pub fn spawn(&mut self) -> Result<Entity, CapacityError> {
        let index = match self.free_store.pop() {
            Some(index) => index,
            None => {
                self.ensure_capacity(GROWTH)?;
                self.free_store.pop().ok_or(CapacityError {
                    entities_needed: self.versions.len() as u64 + 1,
                    capacity: self.versions.len() as u64,
                })?
            }
        };

        self.alive[index as usize] = true;
        self.live_count += 1;
        Ok(Entity::from_parts(index, self.versions[index as usize]))
    }

    /// Releases `entity`. Returns `false` if the handle was already stale.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let index = entity.index() as usize;
        self.versions[index] = self.versions[index].wrapping_add(1);
        self.alive[index] = false;
        self.free_store.push(entity.index());
        self.live_count -= 1;
        true
    }

    /// Returns `true` if `entity` refers to a live slot with a matching version.
    #[inline]
    pub fn is_alive(&self, entity: Entity) -> bool {
        let index = entity.index() as usize;
        index < self.versions.len() && self.alive[index] && self.versions[index] == entity.version()
    }

    /// Returns the live handle currently occupying `index`, if any.
    #[inline]
    pub fn entity_at(&self, index: IndexID) -> Option<Entity> {
        let i = index as usize;
        if i < self.alive.len() && self.alive[i] {
            Some(Entity::from_parts(index, self.versions[i]))
        } else {
            None
        }
    }

    /// Liveness of slots `64 * word_index .. 64 * word_index + 64` as a bitmask.
    pub fn alive_word(&self, word_index: usize) -> u64 {
        let start = word_index * 64;
        let end = (start + 64).min(self.alive.len());
        let mut word = 0u64;
        for index in start..end {
            if self.alive[index] {
                word |= 1u64 << (index - start);
            }
        }
        word
    }

    /// Number of allocated slots, live or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.versions.len()
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Returns `true` if no entity is live.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }
}
