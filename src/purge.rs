//! Reference-count bookkeeping and cascading purge for meshes,
//! materials, and 2D/cube textures.
//!
//! `*_ref`/`*_unref` are plain counter operations; `purge_unused_*` scans
//! a pool and frees slots where `auto_purge && ref_count == 0`. Purge is
//! monotone: it never raises a ref count and never frees a resource with
//! `ref_count > 0` (core spec §8, property 7).

use crate::handle::{Handle, Pool};

/// Implemented by every ref-counted resource (`Mesh`, `Material`,
/// `Texture`, `CubeTexture`).
pub trait RefCounted {
    fn ref_count(&self) -> u32;
    fn auto_purge(&self) -> bool;
    fn inc_ref(&mut self) -> u32;
    /// Saturates at zero; never panics or wraps on a double-unref (the
    /// core spec treats double-unref as idempotent, logged at warn).
    fn dec_ref(&mut self) -> u32;
}

/// Increment `handle`'s ref count, returning the new value, or `None` if
/// the handle is stale.
pub fn inc_ref<T: RefCounted>(pool: &mut Pool<T>, handle: Handle) -> Option<u32> {
    pool.get_mut(handle).map(RefCounted::inc_ref)
}

/// Decrement `handle`'s ref count (saturating at zero), returning the
/// new value, or `None` if the handle is stale. A decrement past zero is
/// idempotent and logged, not an error.
pub fn dec_ref<T: RefCounted>(pool: &mut Pool<T>, handle: Handle) -> Option<u32> {
    let count = pool.get_mut(handle).map(RefCounted::dec_ref);
    if count == Some(0) {
        log::debug!("ref count reached zero for a resource eligible for auto-purge");
    }
    count
}

/// Free every slot where `auto_purge && ref_count == 0`, invoking
/// `on_free` with each freed item before it is dropped so the caller can
/// release GPU resources or cascade an unref into owned handles (e.g. a
/// material unrefing its textures).
///
/// Returns the handles that were freed.
pub fn purge_unused<T: RefCounted>(pool: &mut Pool<T>, mut on_free: impl FnMut(&T)) -> Vec<Handle> {
    let to_free: Vec<Handle> = pool
        .iter()
        .filter_map(|(handle, item)| (item.auto_purge() && item.ref_count() == 0).then_some(handle))
        .collect();

    for &handle in &to_free {
        if let Some(item) = pool.get(handle) {
            on_free(item);
        }
        pool.free(handle);
    }
    to_free
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stub {
        ref_count: u32,
        auto_purge: bool,
    }

    impl RefCounted for Stub {
        fn ref_count(&self) -> u32 {
            self.ref_count
        }
        fn auto_purge(&self) -> bool {
            self.auto_purge
        }
        fn inc_ref(&mut self) -> u32 {
            self.ref_count += 1;
            self.ref_count
        }
        fn dec_ref(&mut self) -> u32 {
            self.ref_count = self.ref_count.saturating_sub(1);
            self.ref_count
        }
    }

    #[test]
    fn unref_saturates_at_zero() {
        let mut pool = Pool::new();
        let h = pool.alloc(Stub { ref_count: 0, auto_purge: true }).unwrap();
        assert_eq!(dec_ref(&mut pool, h), Some(0));
        assert_eq!(dec_ref(&mut pool, h), Some(0));
    }

    #[test]
    fn purge_frees_only_zero_ref_auto_purge_slots() {
        let mut pool = Pool::new();
        let keep_refd = pool.alloc(Stub { ref_count: 1, auto_purge: true }).unwrap();
        let keep_manual = pool.alloc(Stub { ref_count: 0, auto_purge: false }).unwrap();
        let freed = pool.alloc(Stub { ref_count: 0, auto_purge: true }).unwrap();

        let freed_handles = purge_unused(&mut pool, |_| {});

        assert_eq!(freed_handles, vec![freed]);
        assert!(pool.get(keep_refd).is_some());
        assert!(pool.get(keep_manual).is_some());
        assert!(pool.get(freed).is_none());
    }

    #[test]
    fn purge_is_monotone_and_never_frees_live_refs() {
        // S5 — material purge cascade (texture half): ref 1 survives a
        // purge pass untouched.
        let mut pool = Pool::new();
        let h = pool.alloc(Stub { ref_count: 1, auto_purge: true }).unwrap();
        assert!(purge_unused(&mut pool, |_| {}).is_empty());
        assert_eq!(pool.get(h).unwrap().ref_count(), 1);
    }

    #[test]
    fn purge_cascades_via_on_free_callback() {
        let mut textures = Pool::new();
        let tex = textures.alloc(Stub { ref_count: 1, auto_purge: true }).unwrap();

        let mut materials = Pool::new();
        struct Material {
            ref_count: u32,
            auto_purge: bool,
            texture: Handle,
        }
        impl RefCounted for Material {
            fn ref_count(&self) -> u32 {
                self.ref_count
            }
            fn auto_purge(&self) -> bool {
                self.auto_purge
            }
            fn inc_ref(&mut self) -> u32 {
                self.ref_count += 1;
                self.ref_count
            }
            fn dec_ref(&mut self) -> u32 {
                self.ref_count = self.ref_count.saturating_sub(1);
                self.ref_count
            }
        }
        let material = materials.alloc(Material { ref_count: 0, auto_purge: true, texture: tex }).unwrap();

        purge_unused(&mut materials, |m| {
            dec_ref(&mut textures, m.texture);
        });

        assert!(materials.get(material).is_none());
        assert_eq!(textures.get(tex).unwrap().ref_count(), 0);
        assert!(purge_unused(&mut textures, |_| {}).contains(&tex));
    }
}
