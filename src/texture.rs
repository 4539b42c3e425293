//! 2D and cube texture resources. Both wrap a `Handle` into the
//! corresponding image pool rather than owning GPU state directly, so
//! the image pool remains the single source of truth for device image
//! lifetime (core spec's composition-over-aggregation design note).

use crate::handle::Handle;
use crate::purge::RefCounted;

pub struct Texture {
    pub image: Handle,
    pub ref_count: u32,
    pub auto_purge: bool,
}

impl Texture {
    #[must_use]
    pub fn new(image: Handle) -> Self {
        Self { image, ref_count: 0, auto_purge: true }
    }
}

impl RefCounted for Texture {
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

pub struct CubeTexture {
    pub image: Handle,
    pub ref_count: u32,
    pub auto_purge: bool,
}

impl CubeTexture {
    #[must_use]
    pub fn new(image: Handle) -> Self {
        Self { image, ref_count: 0, auto_purge: true }
    }
}

impl RefCounted for CubeTexture {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Pool;

    #[test]
    fn new_texture_starts_at_zero_ref_with_auto_purge_on() {
        let mut images: Pool<()> = Pool::new();
        let handle = images.alloc(()).unwrap();
        let texture = Texture::new(handle);
        assert_eq!(texture.ref_count(), 0);
        assert!(texture.auto_purge());
    }
}
