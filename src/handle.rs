//! Generational slotmap: stable indices, O(1) alloc/free/lookup.
//!
//! A [`Pool<T>`] hands out [`Handle`]s — `(index, generation)` pairs a
//! shader can index directly. A handle obtained before a slot is freed
//! compares as invalid against every later state of that slot, because
//! freeing bumps the slot's generation.

use slotmap::{Key, KeyData, new_key_type};

new_key_type! {
    /// A stable, self-invalidating reference to a `Pool` slot.
    ///
    /// `generation == 0` denotes the null handle (`Handle::null()`).
    pub struct Handle;
}

impl Handle {
    /// Raw `(index, generation)` pair. `generation` is never 0 for a
    /// handle returned by `Pool::alloc`.
    #[must_use]
    pub fn raw_parts(self) -> (u32, u32) {
        let data = self.data();
        (data.as_ffi() as u32, (data.as_ffi() >> 32) as u32)
    }
}

/// Generational slotmap with a hard capacity bound.
///
/// Wraps `slotmap::SlotMap`, which already implements "index + generation
/// + LIFO free list" — the exact shape the spec's Pool invariants
/// describe — and layers a capacity check on top, since `SlotMap` itself
/// grows without bound.
pub struct Pool<T> {
    slots: slotmap::SlotMap<Handle, T>,
    capacity: Option<u32>,
}

/// Result of `Pool::alloc` when the pool is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Full;

impl<T> Pool<T> {
    /// Create an unbounded pool.
    #[must_use]
    pub fn new() -> Self {
        Self { slots: slotmap::SlotMap::with_key(), capacity: None }
    }

    /// Create a pool that fails `alloc` once `capacity` live slots exist.
    #[must_use]
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            slots: slotmap::SlotMap::with_capacity_and_key(capacity as usize),
            capacity: Some(capacity),
        }
    }

    /// Allocate a slot holding `value`, returning its handle.
    ///
    /// Reuses the most recently freed slot when one is available
    /// (`SlotMap`'s internal free list is LIFO); otherwise appends. Fails
    /// only when a capacity was set and is already reached.
    pub fn alloc(&mut self, value: T) -> Result<Handle, Full> {
        if let Some(cap) = self.capacity
            && self.slots.len() as u32 >= cap
        {
            return Err(Full);
        }
        Ok(self.slots.insert(value))
    }

    /// Free the slot referenced by `handle`, returning the item that was
    /// stored there so the caller can perform GPU-side cleanup.
    ///
    /// The slot is considered released as soon as this call returns,
    /// regardless of what the caller does with the returned item: every
    /// handle to this slot — including `handle` itself — compares as
    /// invalid on the very next `get`.
    pub fn free(&mut self, handle: Handle) -> Option<T> {
        self.slots.remove(handle)
    }

    /// Look up the item at `handle`, or `None` if the handle is stale or
    /// null.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.slots.get(handle)
    }

    /// Mutable lookup; see [`Pool::get`].
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.slots.get_mut(handle)
    }

    /// Number of currently live slots.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.slots.len()
    }

    /// Iterate over all live `(handle, item)` pairs.
    pub fn iter(&self) -> slotmap::basic::Iter<'_, Handle, T> {
        self.slots.iter()
    }

    /// Iterate mutably over all live `(handle, item)` pairs.
    pub fn iter_mut(&mut self) -> slotmap::basic::IterMut<'_, Handle, T> {
        self.slots.iter_mut()
    }

    /// Retain only slots for which `f` returns `true`, dropping the rest
    /// (their handles become invalid, exactly as `free` would do).
    pub fn retain(&mut self, f: impl FnMut(Handle, &mut T) -> bool) {
        self.slots.retain(f);
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_reuses_freed_slot_with_bumped_generation() {
        // S1 — Pool reuse.
        let mut pool = Pool::with_capacity(4);
        let h0 = pool.alloc(10).unwrap();
        let h1 = pool.alloc(20).unwrap();
        assert_ne!(h0, h1);

        pool.free(h0);
        assert!(pool.get(h0).is_none());

        let h0b = pool.alloc(30).unwrap();
        let (idx0, gen0) = h0.raw_parts();
        let (idx0b, gen0b) = h0b.raw_parts();
        assert_eq!(idx0, idx0b, "freed index should be reused");
        assert!(gen0b > gen0, "reused slot must carry a higher generation");
        assert!(pool.get(h0).is_none(), "stale handle must stay invalid");
        assert_eq!(pool.get(h0b), Some(&30));
        assert_eq!(pool.get(h1), Some(&20));
    }

    #[test]
    fn alloc_fails_when_capacity_reached() {
        let mut pool: Pool<u32> = Pool::with_capacity(2);
        pool.alloc(1).unwrap();
        pool.alloc(2).unwrap();
        assert_eq!(pool.alloc(3), Err(Full));
    }

    #[test]
    fn free_returns_the_stored_item() {
        let mut pool = Pool::with_capacity(1);
        let h = pool.alloc(42).unwrap();
        assert_eq!(pool.free(h), Some(42));
        assert_eq!(pool.free(h), None, "double free yields nothing");
    }

    #[test]
    fn active_count_tracks_live_slots() {
        let mut pool: Pool<u32> = Pool::with_capacity(4);
        assert_eq!(pool.active_count(), 0);
        let h0 = pool.alloc(1).unwrap();
        let _h1 = pool.alloc(2).unwrap();
        assert_eq!(pool.active_count(), 2);
        pool.free(h0);
        assert_eq!(pool.active_count(), 1);
    }
}
