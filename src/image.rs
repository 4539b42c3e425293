//! Device image + view(s) + format + extent, with lifecycle.
//!
//! `Image` is a single 2D image slot (attachments, depth-pyramid mips,
//! regular 2D textures); `CubeImage` is a 6-layer cube image (shadow
//! cube maps, environment maps). Both are owned indirectly through
//! `Pool<Image>` / `Pool<CubeImage>` so the pool remains the single
//! source of truth for GPU image lifetime — a `Camera` or `Light` only
//! ever stores a `Handle` into that pool.

use crate::errors::{MjolnirError, Result};

/// A single 2D device image with one or more mip views.
pub struct Image {
    pub texture: wgpu::Texture,
    /// One view per mip level, in level order.
    pub mip_views: Vec<wgpu::TextureView>,
    /// A view spanning every mip (used for the depth-pyramid's
    /// "previous frame, all mips" binding).
    pub full_view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
}

impl Image {
    /// Create a single-mip 2D image (attachments, plain 2D textures).
    pub fn new_2d(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Result<Self> {
        Self::new_mipped(device, width, height, 1, format, usage, label)
    }

    /// Create a mipped 2D image (the depth pyramid), one view per mip
    /// plus a full-pyramid view spanning every mip.
    pub fn new_mipped(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        mip_level_count: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Result<Self> {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let mip_views = (0..mip_level_count)
            .map(|level| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some(label),
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let full_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            ..Default::default()
        });

        Ok(Self { texture, mip_views, full_view, format, width, height })
    }

    /// Mip count of a `max(w, h)` pyramid: `floor(log2(max(w,h))) + 1`.
    /// A 1x1 input yields exactly 1 mip.
    #[must_use]
    pub fn pyramid_mip_count(width: u32, height: u32) -> u32 {
        let largest = width.max(height).max(1);
        largest.ilog2() + 1
    }
}

/// A 6-layer cube device image (one cube face per array layer), used
/// for point-light shadow maps and environment cube maps.
pub struct CubeImage {
    pub texture: wgpu::Texture,
    pub cube_view: wgpu::TextureView,
    pub face_views: [wgpu::TextureView; 6],
    pub format: wgpu::TextureFormat,
    pub face_size: u32,
}

impl CubeImage {
    pub fn new(
        device: &wgpu::Device,
        face_size: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Result<Self> {
        if face_size == 0 {
            return Err(MjolnirError::DeviceAllocationFailed(
                "cube image face size must be non-zero".to_string(),
            ));
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width: face_size, height: face_size, depth_or_array_layers: 6 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });

        let cube_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let face_views = std::array::from_fn(|face| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(label),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: face as u32,
                array_layer_count: Some(1),
                ..Default::default()
            })
        });

        Ok(Self { texture, cube_view, face_views, format, face_size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pyramid_mip_count_matches_spec_example() {
        // S4 — 1920x1080 camera, half-res base 960x540.
        assert_eq!(Image::pyramid_mip_count(960, 540), 10);
    }

    #[test]
    fn pyramid_mip_count_for_1x1_is_one() {
        assert_eq!(Image::pyramid_mip_count(1, 1), 1);
    }
}
