//! Entity handles and allocation.
//!
//! An [`EntityRef`] is a 64-bit handle packing a *generation* counter in the
//! high 32 bits and a slot *index* in the low 32 bits. Despawning a slot bumps
//! its generation, so any handle held from before the despawn goes stale and
//! is detected immediately instead of silently aliasing a recycled entity.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

// ---------------------------------------------------------------------------
// EntityRef
// ---------------------------------------------------------------------------

/// A generational entity handle.
///
/// Layout: `[generation: u32 | index: u32]`
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef(u64);

impl EntityRef {
    /// Build a handle from a slot index and generation.
    #[inline]
    pub fn new(index: u32, generation: u32) -> Self {
        Self((generation as u64) << 32 | index as u64)
    }

    /// The slot index (low 32 bits).
    #[inline]
    pub fn index(self) -> u32 {
        self.0 as u32
    }

    /// The generation (high 32 bits).
    #[inline]
    pub fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Raw `u64` form, for wire formats and logs.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its raw `u64` form.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityRef({}v{})", self.index(), self.generation())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index(), self.generation())
    }
}

// ---------------------------------------------------------------------------
// EntityAllocator
// ---------------------------------------------------------------------------

/// One allocator slot: the current generation and whether it is occupied.
#[derive(Debug, Clone, Copy)]
struct Slot {
    generation: u32,
    alive: bool,
}

/// Allocates and recycles [`EntityRef`]s with generational tracking.
///
/// Freed indices go into a FIFO queue so recycling is spread across slots
/// rather than hammering one hot index.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    slots: Vec<Slot>,
    free: VecDeque<u32>,
}

impl EntityAllocator {
    /// Create an empty allocator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh [`EntityRef`], recycling a freed slot if one exists.
    pub fn allocate(&mut self) -> EntityRef {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index as usize];
            slot.alive = true;
            EntityRef::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                alive: true,
            });
            EntityRef::new(index, 0)
        }
    }

    /// Free a handle, bumping the slot generation so outstanding copies of it
    /// become stale.
    ///
    /// Returns `false` if the handle was already stale or dead.
    pub fn free(&mut self, entity: EntityRef) -> bool {
        let Some(slot) = self.slots.get_mut(entity.index() as usize) else {
            return false;
        };
        if !slot.alive || slot.generation != entity.generation() {
            return false;
        }
        slot.alive = false;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push_back(entity.index());
        true
    }

    /// Whether the handle refers to a currently alive entity.
    pub fn is_alive(&self, entity: EntityRef) -> bool {
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|slot| slot.alive && slot.generation == entity.generation())
    }

    /// Number of alive entities.
    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|s| s.alive).count()
    }

    /// Iterate the handles of all alive entities, in slot order.
    pub fn alive(&self) -> impl Iterator<Item = EntityRef> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.alive
                .then(|| EntityRef::new(i as u32, slot.generation))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
