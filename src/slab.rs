//! Size-class free lists over a single linear region.
//!
//! A [`SlabAllocator`] subdivides one logical buffer (vertex, index,
//! skinning, or bone data) into fixed size classes. An allocation for
//! `n` elements is served by the smallest class whose block size is
//! `>= n`; classes never promote into each other.

use crate::errors::{MjolnirError, Result};

/// One size class: fixed block size, fixed block count, and the
/// half-open offset range it owns within the backing buffer.
struct Class {
    block_size: u32,
    block_count: u32,
    range_start: u32,
    /// Free block offsets, LIFO.
    free_list: Vec<u32>,
    /// Offsets never yet handed out, bumped upward from `range_start`.
    bump: u32,
}

impl Class {
    fn range_end(&self) -> u32 {
        self.range_start + self.block_size * self.block_count
    }

    fn contains(&self, offset: u32) -> bool {
        offset >= self.range_start && offset < self.range_end()
    }
}

/// Fixed-size-class sub-allocator over a single backing buffer.
pub struct SlabAllocator {
    classes: Vec<Class>,
    label: &'static str,
}

impl SlabAllocator {
    /// Build an allocator whose classes are laid out contiguously and
    /// non-overlapping, in the order given. `classes` is `(block_size,
    /// block_count)` pairs.
    ///
    /// `label` is used only in capacity-exhaustion error messages.
    #[must_use]
    pub fn new(label: &'static str, classes: &[(u32, u32)]) -> Self {
        let mut built = Vec::with_capacity(classes.len());
        let mut cursor = 0u32;
        for &(block_size, block_count) in classes {
            built.push(Class {
                block_size,
                block_count,
                range_start: cursor,
                free_list: Vec::new(),
                bump: cursor,
            });
            cursor += block_size * block_count;
        }
        Self { classes: built, label }
    }

    /// Total element count spanned by every class. Callers should assert
    /// this equals the backing buffer's declared capacity.
    #[must_use]
    pub fn total_capacity(&self) -> u32 {
        self.classes.iter().map(|c| c.block_size * c.block_count).sum()
    }

    /// Allocate `n` elements, returning the starting offset.
    ///
    /// `n == 0` always succeeds and reserves nothing. Otherwise the
    /// smallest class with `block_size >= n` is selected; if that
    /// specific class is exhausted the allocation fails even if a larger
    /// class has free blocks (no class promotion).
    pub fn alloc(&mut self, n: u32) -> Result<u32> {
        if n == 0 {
            return Ok(0);
        }

        let class = self
            .classes
            .iter_mut()
            .find(|c| c.block_size >= n)
            .ok_or(MjolnirError::CapacityExhausted { resource: self.label })?;

        if let Some(offset) = class.free_list.pop() {
            return Ok(offset);
        }

        if class.bump < class.range_end() {
            let offset = class.bump;
            class.bump += class.block_size;
            return Ok(offset);
        }

        log::error!("slab '{}' size class (block_size={}) exhausted", self.label, class.block_size);
        Err(MjolnirError::CapacityExhausted { resource: self.label })
    }

    /// Free a previously allocated offset. The owning class is recovered
    /// by comparing `offset` against each class's range.
    ///
    /// Double-free is undefined; callers must own at most one
    /// outstanding allocation per offset. `offset == 0` allocations from
    /// an `alloc(0)` call reserve nothing and must not be freed.
    pub fn free(&mut self, offset: u32) {
        if let Some(class) = self.classes.iter_mut().find(|c| c.contains(offset)) {
            class.free_list.push(offset);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_zero_reserves_nothing() {
        let mut slab = SlabAllocator::new("test", &[(256, 2)]);
        assert_eq!(slab.alloc(0).unwrap(), 0);
        // Still able to allocate the full class afterward.
        assert_eq!(slab.alloc(200).unwrap(), 0);
        assert_eq!(slab.alloc(200).unwrap(), 256);
    }

    #[test]
    fn class_boundary_and_reuse() {
        // S2 — Slab class boundary.
        let mut slab = SlabAllocator::new("test", &[(256, 2), (1024, 2)]);
        assert_eq!(slab.alloc(200).unwrap(), 0);
        assert_eq!(slab.alloc(256).unwrap(), 256);
        assert_eq!(slab.alloc(257).unwrap(), 512); // class 1 start
        slab.free(0);
        assert_eq!(slab.alloc(1).unwrap(), 0);
    }

    #[test]
    fn no_class_promotion_on_exhaustion() {
        let mut slab = SlabAllocator::new("test", &[(64, 1), (256, 1)]);
        assert_eq!(slab.alloc(64).unwrap(), 0);
        // Class for size 64 is exhausted; even though the 256 class has
        // room, a second request for <=64 must fail, not promote.
        assert!(slab.alloc(32).is_err());
        assert_eq!(slab.alloc(200).unwrap(), 64);
    }

    #[test]
    fn request_larger_than_every_class_fails() {
        let mut slab = SlabAllocator::new("test", &[(64, 4)]);
        assert!(slab.alloc(65).is_err());
    }

    #[test]
    fn total_capacity_matches_class_sum() {
        let slab = SlabAllocator::new(
            "vertex",
            &[(1, 262_144), (2, 131_072), (4, 65_536), (8, 32_768), (16, 16_384), (32, 8_192), (64, 4_096), (128, 2_048)],
        );
        assert_eq!(slab.total_capacity(), 2_097_152);
    }
}
