//! Depth-pyramid (HZB) construction: the mipped R32 image, its per-mip
//! views, and the per-mip descriptor sets the reduction pass binds.
//!
//! Building the actual reduction compute pipeline is out of scope (the
//! core spec treats shader programs as an external collaborator); this
//! module only owns the GPU-visible surface a render graph needs to
//! drive that pass: images, views and descriptor sets.

use crate::errors::Result;
use crate::handle::{Handle, Pool};
use crate::image::Image;

/// One frame's depth pyramid: a half-resolution, mipped R32Float image
/// plus one bind group per mip for the reduction pass.
pub struct DepthPyramid {
    pub image: Handle,
    pub mip_levels: u32,
    /// `reduce_sets[m]` binds: binding 0 = source (current depth for
    /// `m == 0`, else mip `m-1`), binding 1 = destination (mip `m`,
    /// storage-write).
    pub reduce_sets: Vec<wgpu::BindGroup>,
    pub width: u32,
    pub height: u32,
}

impl DepthPyramid {
    /// Allocate the pyramid image in `images` and build its per-mip
    /// descriptor sets.
    ///
    /// `depth_view` is the current frame's depth attachment (bound as
    /// mip 0's source); `reduce_layout` is the two-binding
    /// (sampled-texture, storage-texture) layout shared by every mip;
    /// `sampler` must use `SamplerReductionMode::Max` (see
    /// [`crate::samplers::depth_reduce_sampler`]).
    pub fn new(
        device: &wgpu::Device,
        images: &mut Pool<Image>,
        width: u32,
        height: u32,
        depth_view: &wgpu::TextureView,
        reduce_layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
    ) -> Result<Self> {
        let w = width.max(1);
        let h = height.max(1);
        let mip_levels = Image::pyramid_mip_count(w, h);

        let pyramid_image = Image::new_mipped(
            device,
            w,
            h,
            mip_levels,
            wgpu::TextureFormat::R32Float,
            wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            label,
        )?;

        // `wgpu::TextureView` is a cheap ref-counted handle, so cloning
        // the views here (before the image moves into the pool) does
        // not duplicate GPU state.
        let mip_views: Vec<_> = pyramid_image.mip_views.clone();
        let image = images
            .alloc(pyramid_image)
            .map_err(|_| crate::errors::MjolnirError::CapacityExhausted { resource: "Image pool" })?;

        let reduce_sets = (0..mip_levels)
            .map(|mip| {
                let source = if mip == 0 { depth_view } else { &mip_views[(mip - 1) as usize] };
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(label),
                    layout: reduce_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(source),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&mip_views[mip as usize]),
                        },
                        wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(sampler) },
                    ],
                })
            })
            .collect();

        Ok(Self { image, mip_levels, reduce_sets, width: w, height: h })
    }
}
