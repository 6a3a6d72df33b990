//! Identifiers and bit layouts shared by the engine.
//!
//! ## Entity handles
//!
//! An [`Entity`] is one packed 64-bit value:
//!
//! ```text
//! | version (32) | index (32) |
//! ```
//!
//! - **Index** is the entity's slot. It is stable for the entity's whole life
//!   and addresses every component column directly.
//! - **Version** is bumped when the slot is released, so handles to destroyed
//!   entities become detectably stale.
//!
//! ## Access sets
//!
//! Components and resources share the [`ComponentID`] space. A system's
//! [`AccessSets`] are two [`Signature`]s (read and write) that the scheduler
//! compares to decide which systems may share a stage.

/// Raw packed form of an [`Entity`].
pub type EntityID = u64;
/// Slot index of an entity.
pub type IndexID = u32;
/// Bumped each time a slot is released.
pub type VersionID = u32;

/// Registration position of a system.
pub type SystemID = u16;
/// Number of ticks run; the first tick is 1.
pub type Tick = u64;

/// Number of bits reserved for the slot index.
pub const INDEX_BITS: u32 = 32;
/// Mask selecting the index portion of an [`EntityID`].
pub const INDEX_MASK: EntityID = (1 << INDEX_BITS) - 1;
/// Largest slot index that may be handed out.
pub const INDEX_CAP: IndexID = IndexID::MAX - 1;

/// Unique identifier for a component or resource type.
pub type ComponentID = u16;

/// Maximum number of registered component and resource types per world.
pub const COMPONENT_CAP: usize = 256;
/// Words in a [`Signature`].
pub const SIGNATURE_SIZE: usize = (COMPONENT_CAP + 63) / 64;

/// Number of consecutive slots handed to one worker in partitioned passes.
pub const PARTITION_ROWS: usize = 1024;

/// An opaque entity handle.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity(pub EntityID);

impl Entity {
    #[inline]
    pub(crate) const fn from_parts(index: IndexID, version: VersionID) -> Self {
        Entity(((version as EntityID) << INDEX_BITS) | index as EntityID)
    }

    /// Slot index of this entity.
    #[inline]
    pub const fn index(self) -> IndexID {
        (self.0 & INDEX_MASK) as IndexID
    }

    /// Generation of this handle.
    #[inline]
    pub const fn version(self) -> VersionID {
        (self.0 >> INDEX_BITS) as VersionID
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}v{})", self.index(), self.version())
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.index(), self.version())
    }
}

/// Fixed-size bitset over [`ComponentID`]s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature([u64; SIGNATURE_SIZE]);

impl Signature {
    #[inline]
    fn locate(id: ComponentID) -> (usize, u64) {
        (usize::from(id) >> 6, 1u64 << (id & 63))
    }

    /// Adds `id`; returns `false` if it was already present.
    #[inline]
    pub fn insert(&mut self, id: ComponentID) -> bool {
        let (word, bit) = Self::locate(id);
        let fresh = self.0[word] & bit == 0;
        self.0[word] |= bit;
        fresh
    }

    /// Returns `true` if `id` is in the set.
    #[inline]
    pub fn contains(&self, id: ComponentID) -> bool {
        let (word, bit) = Self::locate(id);
        self.0[word] & bit != 0
    }

    /// Number of ids in the set.
    pub fn len(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Returns `true` if the set holds no ids.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&word| word == 0)
    }

    /// Returns `true` if no id is in both sets.
    #[inline]
    pub fn is_disjoint(&self, other: &Signature) -> bool {
        self.0.iter().zip(&other.0).all(|(a, b)| a & b == 0)
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ComponentID> + '_ {
        (0..COMPONENT_CAP as u16).filter(move |&id| self.contains(id))
    }
}

impl FromIterator<ComponentID> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentID>>(ids: I) -> Self {
        let mut signature = Signature::default();
        for id in ids {
            signature.insert(id);
        }
        signature
    }
}

/// Access mode for a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only access.
    Read,
    /// Exclusive write access (includes toggling the enabled bit).
    Write,
}

/// Declares the component and resource access set of a system.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSets {
    /// Types read by the system.
    pub read: Signature,
    /// Types written by the system.
    pub write: Signature,
}

impl AccessSets {
    /// Adds `component_id` with the given mode.
    #[inline]
    pub fn declare(&mut self, component_id: ComponentID, mode: AccessMode) -> &mut Self {
        match mode {
            AccessMode::Read => self.read.insert(component_id),
            AccessMode::Write => self.write.insert(component_id),
        };
        self
    }

    /// Two systems conflict when either one writes something the other touches.
    #[inline]
    pub fn conflicts_with(&self, other: &AccessSets) -> bool {
        !(self.write.is_disjoint(&other.write)
            && self.write.is_disjoint(&other.read)
            && self.read.is_disjoint(&other.write))
    }
}
