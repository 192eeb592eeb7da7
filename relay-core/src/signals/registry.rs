//! Subscription Registry
//!
//! The ordered slot list owned by one signal. Mutations take the write side
//! of the lock; emission takes the read side just long enough to copy the
//! list. Nothing ever runs a callback while holding this lock.

use parking_lot::RwLock;
use smallvec::SmallVec;

use super::slot::Slot;

/// Slots kept inline before the list spills to the heap.
const INLINE_SLOTS: usize = 3;

/// A point-in-time copy of a registry's slots.
pub(crate) type Snapshot<A> = SmallVec<[Slot<A>; INLINE_SLOTS]>;

pub(crate) struct Registry<A> {
    slots: RwLock<Snapshot<A>>,
}

impl<A> Registry<A> {
    pub(crate) fn new() -> Self {
        Self {
            slots: RwLock::new(SmallVec::new()),
        }
    }

    /// Append a slot. Returns the new slot count.
    pub(crate) fn append(&self, slot: Slot<A>) -> usize {
        let mut slots = self.slots.write();
        slots.push(slot);
        slots.len()
    }

    /// Remove every slot. Returns how many were removed.
    pub(crate) fn clear(&self) -> usize {
        // Swap out under the lock, drop the old slots after releasing it:
        // dropping a callback may run arbitrary destructors.
        let removed = std::mem::take(&mut *self.slots.write());
        removed.len()
    }

    pub(crate) fn snapshot(&self) -> Snapshot<A> {
        self.slots.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.read().len()
    }
}
