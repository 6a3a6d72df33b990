//! # Component Storage
//!
//! Slot-indexed columns with per-slot presence and enabled bits.
//!
//! ## Storage model
//!
//! Every registered component type owns one [`ComponentTable`]:
//!
//! ```text
//! presence: [AtomicU64]          one bit per entity slot
//! enabled:  [AtomicU64]          one bit per entity slot
//! column:   RwLock<Column<T>>    Vec<Option<T>> indexed by slot
//! ```
//!
//! Entity slots never move, so a column index is simply the entity index.
//! Queries scan the bit words without touching the column lock; systems then
//! borrow the columns they declared.
//!
//! ## Invariants
//! - `presence[i]` is set iff `column[i]` is `Some`.
//! - `enabled[i]` implies `presence[i]`.
//! - Presence only changes under `&mut World` (attach, remove, destroy).
//! - The enabled bit may flip under `&World`; systems that do so declare
//!   write access to the component.

use std::any::{type_name, Any};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::engine::types::ComponentID;

/// Atomic per-slot bitset.
#[derive(Default, Debug)]
pub struct FlagBits {
    words: Vec<AtomicU64>,
}

impl FlagBits {
    /// Grows the bitset so it covers at least `slots` entries.
    pub fn grow_to(&mut self, slots: usize) {
        let words = (slots + 63) / 64;
        while self.words.len() < words {
            self.words.push(AtomicU64::new(0));
        }
    }

    /// Returns the bit at `index`. Out-of-range slots read as unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        (self.word(index / 64) >> (index % 64)) & 1 == 1
    }

    /// Sets or clears the bit at `index`. Returns `false` if out of range.
    #[inline]
    pub fn set(&self, index: usize, value: bool) -> bool {
        let Some(word) = self.words.get(index / 64) else {
            return false;
        };
        let mask = 1u64 << (index % 64);
        if value {
            word.fetch_or(mask, Ordering::AcqRel);
        } else {
            word.fetch_and(!mask, Ordering::AcqRel);
        }
        true
    }

    /// Returns the word at `word_index`, or zero past the end.
    #[inline]
    pub fn word(&self, word_index: usize) -> u64 {
        self.words
            .get(word_index)
            .map_or(0, |word| word.load(Ordering::Acquire))
    }

    /// Number of words currently allocated.
    #[inline]
    pub fn word_len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if any bit is set.
    pub fn any(&self) -> bool {
        self.words.iter().any(|word| word.load(Ordering::Acquire) != 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words
            .iter()
            .map(|word| word.load(Ordering::Acquire).count_ones() as usize)
            .sum()
    }
}

/// Dense-by-slot column for one component type.
#[derive(Debug)]
pub struct Column<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<T> Column<T> {
    /// Resizes the column so that `len` slots are addressable.
    pub fn ensure_len(&mut self, len: usize) {
        if self.slots.len() < len {
            self.slots.resize_with(len, || None);
        }
    }

    /// Returns the value in `index`, if any.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Returns the value in `index` mutably, if any.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Stores `value` in `index`, returning the previous value.
    pub fn insert(&mut self, index: usize, value: T) -> Option<T> {
        self.ensure_len(index + 1);
        self.slots[index].replace(value)
    }

    /// Removes and returns the value in `index`.
    pub fn take(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// All slots, including empty ones.
    #[inline]
    pub fn slots(&self) -> &[Option<T>] {
        &self.slots
    }

    /// All slots mutably, including empty ones.
    #[inline]
    pub fn slots_mut(&mut self) -> &mut [Option<T>] {
        &mut self.slots
    }
}

/// Type-erased view of a [`Column`].
pub trait ErasedColumn: Any + Send + Sync {
    /// Upcasts for typed downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Upcasts for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Drops the value in `index`. Returns `true` if one was present.
    fn remove(&mut self, index: usize) -> bool;
    /// Element type name.
    fn element_name(&self) -> &'static str;
}

impl<T: Send + Sync + 'static> ErasedColumn for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn remove(&mut self, index: usize) -> bool {
        self.take(index).is_some()
    }

    fn element_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Column plus flag bits for one component type.
pub struct ComponentTable {
    pub(crate) component_id: ComponentID,
    pub(crate) name: &'static str,
    pub(crate) presence: FlagBits,
    pub(crate) enabled: FlagBits,
    pub(crate) column: RwLock<Box<dyn ErasedColumn>>,
}

impl ComponentTable {
    /// Creates an empty table for `T`.
    pub fn new<T: Send + Sync + 'static>(component_id: ComponentID) -> Self {
        Self {
            component_id,
            name: type_name::<T>(),
            presence: FlagBits::default(),
            enabled: FlagBits::default(),
            column: RwLock::new(Box::new(Column::<T>::default())),
        }
    }

    /// Component ID of this table.
    #[inline]
    pub fn component_id(&self) -> ComponentID {
        self.component_id
    }

    /// Element type name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Grows the flag bitsets to cover `slots`.
    pub(crate) fn grow_to(&mut self, slots: usize) {
        self.presence.grow_to(slots);
        self.enabled.grow_to(slots);
    }

    /// Number of entities holding this component.
    pub fn len(&self) -> usize {
        self.presence.count()
    }

    /// Returns `true` if no entity holds this component.
    pub fn is_empty(&self) -> bool {
        !self.presence.any()
    }

    /// Drops the value in `index` and clears both flag bits.
    pub(crate) fn remove_slot(&mut self, index: usize) -> bool {
        self.presence.set(index, false);
        self.enabled.set(index, false);
        self.column.get_mut().remove(index)
    }
}

impl std::fmt::Debug for ComponentTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentTable")
            .field("component_id", &self.component_id)
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}

/// Singleton value stored alongside the component tables.
pub struct ResourceCell {
    pub(crate) name: &'static str,
    pub(crate) value: RwLock<Box<dyn Any + Send + Sync>>,
}

impl ResourceCell {
    /// Wraps `value`.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            name: type_name::<T>(),
            value: RwLock::new(Box::new(value)),
        }
    }
}

impl std::fmt::Debug for ResourceCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCell").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_bits_out_of_range_reads_unset() {
        let mut bits = FlagBits::default();
        assert!(!bits.get(500));
        assert!(!bits.set(500, true));

        bits.grow_to(501);
        assert!(bits.set(500, true));
        assert!(bits.get(500));
        assert_eq!(bits.count(), 1);
        bits.set(500, false);
        assert!(!bits.any());
    }

    #[test]
    fn column_insert_replaces_and_take_empties() {
        let mut column = Column::<u32>::default();
        assert_eq!(column.insert(3, 7), None);
        assert_eq!(column.insert(3, 9), Some(7));
        assert_eq!(column.get(3), Some(&9));
        assert_eq!(column.get(2), None);
        assert_eq!(column.take(3), Some(9));
        assert_eq!(column.get(3), None);
        assert_eq!(column.slots().len(), 4);
    }

    #[test]
    fn table_remove_slot_clears_flags() {
        let mut table = ComponentTable::new::<u32>(0);
        table.grow_to(8);
        table
            .column
            .get_mut()
            .as_any_mut()
            .downcast_mut::<Column<u32>>()
            .unwrap()
            .insert(2, 5);
        table.presence.set(2, true);
        table.enabled.set(2, true);

        assert!(table.remove_slot(2));
        assert!(!table.presence.get(2));
        assert!(!table.enabled.get(2));
        assert!(table.is_empty());
    }
}
