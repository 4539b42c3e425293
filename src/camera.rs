//! Perspective/orthographic camera: per-frame render attachments, depth
//! pyramid, draw-list buffers and culling descriptor sets.

use glam::{Affine3A, Mat4, Vec3};

use crate::bindless::{Bindless, PerFrameBindless};
use crate::depth_pyramid::DepthPyramid;
use crate::errors::{MjolnirError, Result};
use crate::frustum::{viewport_to_world_ray, Frustum, Ray};
use crate::handle::{Handle, Pool};
use crate::image::Image;
use crate::limits::FRAMES_IN_FLIGHT;
use crate::records::{CameraData, LightData, MeshData, NodeData};

bitflags::bitflags! {
    /// Which render passes a camera participates in; determines which
    /// attachments it allocates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Passes: u32 {
        const GEOMETRY     = 1 << 0;
        const LIGHTING      = 1 << 1;
        const TRANSPARENCY  = 1 << 2;
        const PARTICLES     = 1 << 3;
        const POST_PROCESS  = 1 << 4;
        const SHADOW        = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Position,
    Normal,
    Albedo,
    MetallicRoughness,
    Emissive,
    Final,
    Depth,
}

impl AttachmentKind {
    #[must_use]
    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            AttachmentKind::Position | AttachmentKind::Normal => wgpu::TextureFormat::Rgba16Float,
            AttachmentKind::Albedo | AttachmentKind::Final => wgpu::TextureFormat::Rgba8UnormSrgb,
            AttachmentKind::MetallicRoughness => wgpu::TextureFormat::Rg8Unorm,
            AttachmentKind::Emissive => wgpu::TextureFormat::Rgba16Float,
            AttachmentKind::Depth => wgpu::TextureFormat::Depth32Float,
        }
    }

    /// Attachments implied by a pass set, per the core spec's §4.4 table.
    #[must_use]
    fn implied_by(passes: Passes) -> smallvec::SmallVec<[AttachmentKind; 6]> {
        let mut out = smallvec::SmallVec::new();
        if passes.intersects(Passes::GEOMETRY | Passes::LIGHTING) {
            out.extend([
                AttachmentKind::Position,
                AttachmentKind::Normal,
                AttachmentKind::Albedo,
                AttachmentKind::MetallicRoughness,
                AttachmentKind::Emissive,
            ]);
        }
        if passes
            .intersects(Passes::LIGHTING | Passes::TRANSPARENCY | Passes::PARTICLES | Passes::POST_PROCESS)
        {
            out.push(AttachmentKind::Final);
        }
        out.push(AttachmentKind::Depth);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// The indirect-draw command buffers GPU culling writes into and draws
/// indirect-dispatch from, replicated per frame.
struct DrawList {
    count_buffer: wgpu::Buffer,
    command_buffer: wgpu::Buffer,
    /// Host-visible mirror of `count_buffer`, filled by an external copy
    /// command issued after the culling pass. `MAP_READ` can only be
    /// combined with `COPY_DST` (wgpu's usage validation rejects it
    /// alongside `STORAGE`), so this is a separate buffer rather than a
    /// second usage flag on `count_buffer` itself.
    visible_count_readback: wgpu::Buffer,
    max_draws: u32,
}

impl DrawList {
    fn new(device: &wgpu::Device, max_draws: u32, label: &str) -> Self {
        let usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::INDIRECT
            | wgpu::BufferUsages::COPY_DST;
        let count_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<u32>() as u64,
            usage,
            mapped_at_creation: false,
        });
        // Each indirect draw command is 5 u32 words (wgpu::util::DrawIndexedIndirectArgs).
        let command_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (max_draws.max(1) as u64) * 20,
            usage,
            mapped_at_creation: false,
        });
        let visible_count_readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_draw_list_visible_count_readback"),
            size: std::mem::size_of::<u32>() as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { count_buffer, command_buffer, visible_count_readback, max_draws }
    }
}

/// Per-frame GPU state a `Camera` owns.
struct FrameResources {
    attachments: rustc_hash::FxHashMap<AttachmentKind, Handle>,
    depth_pyramid: DepthPyramid,
    draw_list: DrawList,
    late_cull_set: wgpu::BindGroup,
    secondary_command_buffers: smallvec::SmallVec<[wgpu::CommandBuffer; 3]>,
}

/// Shared, manager-owned bind-group layouts and buffers every `Camera`
/// binds into its per-frame descriptor sets.
pub struct CameraSharedLayouts<'a> {
    pub late_cull_layout: &'a wgpu::BindGroupLayout,
    pub depth_reduce_layout: &'a wgpu::BindGroupLayout,
    pub depth_reduce_sampler: &'a wgpu::Sampler,
    pub node_buffer: &'a Bindless<NodeData>,
    pub mesh_buffer: &'a Bindless<MeshData>,
    pub world_matrix_buffer: &'a Bindless<Mat4>,
    pub camera_buffer: &'a PerFrameBindless<CameraData, FRAMES_IN_FLIGHT>,
    pub light_buffer: &'a Bindless<LightData>,
}

/// Perspective or orthographic view with per-frame render attachments, a
/// depth pyramid for occlusion culling, draw-list buffers, and the
/// descriptor sets the culling/lighting passes bind.
pub struct Camera {
    pub node_index: Option<u32>,
    pub transform: Affine3A,

    pub projection_type: ProjectionType,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub ortho_size: f32,

    pub passes: Passes,
    pub width: u32,
    pub height: u32,
    max_draws: u32,

    view: Mat4,
    projection: Mat4,
    frustum: Frustum,

    frames: Vec<FrameResources>,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            node_index: None,
            transform: Affine3A::IDENTITY,
            projection_type: ProjectionType::Perspective,
            fov: fov_degrees.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,
            passes: Passes::GEOMETRY | Passes::LIGHTING,
            width: 0,
            height: 0,
            max_draws: 0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            frustum: Frustum::from_view_projection(Mat4::IDENTITY, Mat4::IDENTITY),
            frames: Vec::new(),
        };
        cam.update_projection();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            node_index: None,
            transform: Affine3A::IDENTITY,
            projection_type: ProjectionType::Orthographic,
            fov: 0.0,
            aspect,
            near,
            far,
            ortho_size,
            passes: Passes::GEOMETRY | Passes::LIGHTING,
            width: 0,
            height: 0,
            max_draws: 0,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            frustum: Frustum::from_view_projection(Mat4::IDENTITY, Mat4::IDENTITY),
            frames: Vec::new(),
        };
        cam.update_projection();
        cam
    }

    fn update_projection(&mut self) {
        self.projection = match self.projection_type {
            ProjectionType::Perspective => Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far),
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };
        self.frustum = Frustum::from_view_projection(self.view, self.projection);
    }

    /// Recompute view/projection/frustum from a fresh world transform
    /// (called once per frame by the Manager for node-attached cameras).
    pub fn update_view(&mut self, world_transform: Affine3A) {
        self.transform = world_transform;
        self.view = Mat4::from(world_transform).inverse();
        self.frustum = Frustum::from_view_projection(self.view, self.projection);
    }

    #[must_use]
    pub fn world_position(&self) -> Vec3 {
        self.transform.translation.into()
    }

    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[must_use]
    pub fn gpu_data(&self) -> CameraData {
        CameraData {
            view: self.view,
            projection: self.projection,
            viewport_params: glam::Vec4::new(
                self.width as f32,
                self.height as f32,
                1.0 / self.width.max(1) as f32,
                1.0 / self.height.max(1) as f32,
            ),
            position: self.world_position().extend(1.0),
            frustum_planes: self.frustum.planes,
        }
    }

    /// Allocate the per-frame attachments, depth pyramids, draw-list
    /// buffers and late-cull descriptor sets implied by `self.passes`.
    ///
    /// On any allocation failure, every resource acquired so far by this
    /// call is released before the error propagates (reverse-order
    /// rollback), per the core spec's constructor idiom.
    pub fn init_gpu(
        &mut self,
        device: &wgpu::Device,
        images: &mut Pool<Image>,
        width: u32,
        height: u32,
        max_draws: u32,
        layouts: &CameraSharedLayouts<'_>,
    ) -> Result<()> {
        self.width = width;
        self.height = height;
        self.max_draws = max_draws;
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
        self.update_projection();

        let kinds = AttachmentKind::implied_by(self.passes);
        let mut acquired_images: Vec<Handle> = Vec::new();

        // Phase 1: allocate attachments, depth pyramid and draw list for
        // every frame. This has to happen before any late-cull set is
        // built, because that set binds frame N's set to frame
        // `(N + F - 1) % F`'s pyramid — a pyramid that must already
        // exist.
        let built: Result<Vec<(rustc_hash::FxHashMap<AttachmentKind, Handle>, DepthPyramid, DrawList)>> = (0
            ..FRAMES_IN_FLIGHT)
            .map(|_| self.allocate_frame(device, images, &kinds, layouts, &mut acquired_images))
            .collect();

        let built = match built {
            Ok(built) => built,
            Err(err) => {
                for handle in acquired_images.drain(..) {
                    images.free(handle);
                }
                return Err(err);
            }
        };

        // Phase 2: now that every frame's pyramid exists, snapshot each
        // one's full-pyramid view (a cheap, ref-counted clone) so frame
        // N's late-cull set can bind frame `(N + F - 1) % F`'s pyramid
        // without holding a borrow into `built` while consuming it.
        let previous_pyramid_views: Vec<wgpu::TextureView> = (0..FRAMES_IN_FLIGHT)
            .map(|frame| {
                let previous = (frame + FRAMES_IN_FLIGHT - 1) % FRAMES_IN_FLIGHT;
                images.get(built[previous].1.image).expect("allocated above").full_view.clone()
            })
            .collect();

        let frames = built
            .into_iter()
            .enumerate()
            .map(|(frame, (attachments, depth_pyramid, draw_list))| {
                let late_cull_set = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("camera_late_cull"),
                    layout: layouts.late_cull_layout,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: layouts.node_buffer.buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 1, resource: layouts.mesh_buffer.buffer.as_entire_binding() },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: layouts.world_matrix_buffer.buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: layouts.camera_buffer.buffers[frame].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry { binding: 4, resource: draw_list.count_buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 5, resource: draw_list.command_buffer.as_entire_binding() },
                        wgpu::BindGroupEntry {
                            binding: 6,
                            resource: wgpu::BindingResource::TextureView(&previous_pyramid_views[frame]),
                        },
                        wgpu::BindGroupEntry {
                            binding: 7,
                            resource: wgpu::BindingResource::Sampler(layouts.depth_reduce_sampler),
                        },
                    ],
                });

                FrameResources {
                    attachments,
                    depth_pyramid,
                    draw_list,
                    late_cull_set,
                    secondary_command_buffers: smallvec::SmallVec::new(),
                }
            })
            .collect();

        self.frames = frames;
        Ok(())
    }

    fn allocate_frame(
        &self,
        device: &wgpu::Device,
        images: &mut Pool<Image>,
        kinds: &[AttachmentKind],
        layouts: &CameraSharedLayouts<'_>,
        acquired: &mut Vec<Handle>,
    ) -> Result<(rustc_hash::FxHashMap<AttachmentKind, Handle>, DepthPyramid, DrawList)> {
        let mut attachments = rustc_hash::FxHashMap::default();
        for &kind in kinds {
            let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
            let image = Image::new_2d(device, self.width.max(1), self.height.max(1), kind.format(), usage, "camera_attachment")?;
            let handle = images.alloc(image).map_err(|_| MjolnirError::CapacityExhausted { resource: "Image pool" })?;
            acquired.push(handle);
            attachments.insert(kind, handle);
        }

        let depth_handle = attachments[&AttachmentKind::Depth];
        let depth_view = images.get(depth_handle).expect("just allocated").full_view.clone();

        let depth_pyramid = DepthPyramid::new(
            device,
            images,
            (self.width.max(1) / 2).max(1),
            (self.height.max(1) / 2).max(1),
            &depth_view,
            layouts.depth_reduce_layout,
            layouts.depth_reduce_sampler,
            "depth_pyramid",
        )?;
        acquired.push(depth_pyramid.image);

        let draw_list = DrawList::new(device, self.max_draws, "camera_draw_list");

        Ok((attachments, depth_pyramid, draw_list))
    }

    /// Convert a top-left pixel coordinate into a world-space ray.
    #[must_use]
    pub fn viewport_to_world_ray(&self, mx: f32, my: f32) -> Ray {
        viewport_to_world_ray(mx, my, self.width.max(1) as f32, self.height.max(1) as f32, self.view, self.projection)
    }

    /// Wait for device idle, release every per-frame resource, and
    /// rebuild at the new extent. A resize to the current extent is a
    /// no-op that returns immediately.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        images: &mut Pool<Image>,
        width: u32,
        height: u32,
        layouts: &CameraSharedLayouts<'_>,
    ) -> Result<()> {
        if width == self.width && height == self.height {
            return Ok(());
        }
        device.poll(wgpu::MaintainBase::Wait).panic_on_timeout();

        for frame in self.frames.drain(..) {
            for handle in frame.attachments.values() {
                images.free(*handle);
            }
            images.free(frame.depth_pyramid.image);
        }

        self.init_gpu(device, images, width, height, self.max_draws, layouts)
    }

    #[must_use]
    pub fn attachment(&self, frame: usize, kind: AttachmentKind) -> Option<Handle> {
        self.frames.get(frame % FRAMES_IN_FLIGHT.max(1)).and_then(|f| f.attachments.get(&kind).copied())
    }

    #[must_use]
    pub fn mip_levels(&self, frame: usize) -> u32 {
        self.frames.get(frame % FRAMES_IN_FLIGHT.max(1)).map_or(0, |f| f.depth_pyramid.mip_levels)
    }

    /// Copy this frame's draw count into its host-visible readback
    /// buffer. The external render graph issues this after the late
    /// culling pass has finished writing `count_buffer`, before
    /// `visible_count` is called.
    pub fn stage_visible_count_readback(&self, encoder: &mut wgpu::CommandEncoder, frame: usize) {
        let Some(frame) = self.frames.get(frame % FRAMES_IN_FLIGHT.max(1)) else { return };
        encoder.copy_buffer_to_buffer(
            &frame.draw_list.count_buffer,
            0,
            &frame.draw_list.visible_count_readback,
            0,
            std::mem::size_of::<u32>() as u64,
        );
    }

    /// `camera_get_visible_count` (core spec §9): the last draw count
    /// written by the GPU, read through a mapped host-visible buffer.
    /// Returns `None` until `stage_visible_count_readback` has been
    /// issued and its copy has landed, or the camera has no frame
    /// resources (`init_gpu` not yet called).
    #[must_use]
    pub fn visible_count(&self, device: &wgpu::Device, frame: usize) -> Option<u32> {
        let frame = self.frames.get(frame % FRAMES_IN_FLIGHT.max(1))?;
        let buffer = &frame.draw_list.visible_count_readback;
        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device.poll(wgpu::MaintainBase::Wait).panic_on_timeout();
        receiver.recv().ok()?.ok()?;
        let data = slice.get_mapped_range();
        let count = u32::from_ne_bytes(data[..4].try_into().ok()?);
        drop(data);
        buffer.unmap();
        Some(count)
    }

    /// Release every GPU resource this camera owns, in reverse
    /// acquisition order (depth pyramid and attachments before the
    /// struct itself is dropped).
    pub fn destroy(&mut self, images: &mut Pool<Image>) {
        for frame in self.frames.drain(..) {
            images.free(frame.depth_pyramid.image);
            for handle in frame.attachments.values() {
                images.free(*handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perspective_projection_updates_frustum() {
        let cam = Camera::new_perspective(60.0, 16.0 / 9.0, 0.1, 100.0);
        assert!(cam.frustum().planes.iter().any(|p| *p != glam::Vec4::ZERO));
    }

    #[test]
    fn attachments_implied_by_geometry_include_gbuffer_and_depth() {
        let kinds = AttachmentKind::implied_by(Passes::GEOMETRY);
        assert!(kinds.contains(&AttachmentKind::Albedo));
        assert!(kinds.contains(&AttachmentKind::Depth));
        assert!(!kinds.contains(&AttachmentKind::Final));
    }

    #[test]
    fn attachments_implied_by_post_process_include_final() {
        let kinds = AttachmentKind::implied_by(Passes::POST_PROCESS);
        assert!(kinds.contains(&AttachmentKind::Final));
        assert!(!kinds.contains(&AttachmentKind::Albedo));
    }
}
