//! Omnidirectional (cube) shadow camera: a single virtual camera whose
//! geometry-shader layer selection (an external renderer concern)
//! produces a full cube depth map in one pass.

use glam::{Mat4, Vec3, Vec4};

use crate::bindless::Bindless;
use crate::errors::{MjolnirError, Result};
use crate::handle::{Handle, Pool};
use crate::image::CubeImage;
use crate::limits::FRAMES_IN_FLIGHT;
use crate::records::{MeshData, NodeData};

/// Shared, manager-owned layouts/buffers a `SphericalCamera` binds into
/// its per-frame descriptor set. No depth-pyramid binding: point-light
/// shadows skip HZB culling entirely.
pub struct SphericalCameraSharedLayouts<'a> {
    pub descriptor_layout: &'a wgpu::BindGroupLayout,
    pub node_buffer: &'a Bindless<NodeData>,
    pub mesh_buffer: &'a Bindless<MeshData>,
    pub world_matrix_buffer: &'a Bindless<Mat4>,
}

/// One frame's cube-depth image; the draw-count/command buffer is
/// shared across every frame (point-light shadow passes are not
/// double-buffered the way the forward/geometry camera is, since the
/// geometry-shader single-pass cube render has no cross-frame culling
/// dependency to pipeline).
struct FrameResources {
    cube_depth: Handle,
    descriptor_set: wgpu::BindGroup,
}

/// A 90-degree-FOV, aspect-1.0 perspective whose geometry shader derives
/// per-face view matrices from `center`/`radius` at draw time.
pub struct SphericalCamera {
    pub center: Vec3,
    pub radius: f32,
    pub near: f32,
    pub far: f32,
    pub face_size: u32,

    count_buffer: Option<wgpu::Buffer>,
    command_buffer: Option<wgpu::Buffer>,
    frames: Vec<FrameResources>,
}

impl SphericalCamera {
    #[must_use]
    pub fn new(center: Vec3, radius: f32, near: f32, far: f32, face_size: u32) -> Self {
        Self { center, radius, near, far, face_size, count_buffer: None, command_buffer: None, frames: Vec::new() }
    }

    /// `position.xyzw` packs `center` + `radius`; `near_far` is packed
    /// separately since the record layout only reserves one `vec4` for
    /// position-like data (see the core spec's §4.5 GPU record note).
    #[must_use]
    pub fn packed_position(&self) -> Vec4 {
        self.center.extend(self.radius)
    }

    #[must_use]
    pub fn packed_near_far(&self) -> Vec4 {
        Vec4::new(self.near, self.far, 0.0, 0.0)
    }

    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(90f32.to_radians(), 1.0, self.near, self.far)
    }

    pub fn init_gpu(
        &mut self,
        device: &wgpu::Device,
        images: &mut Pool<CubeImage>,
        max_draws: u32,
        layouts: &SphericalCameraSharedLayouts<'_>,
    ) -> Result<()> {
        let usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST;
        let count_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("spherical_camera_draw_count"),
            size: std::mem::size_of::<u32>() as u64,
            usage,
            mapped_at_creation: false,
        });
        let command_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("spherical_camera_draw_commands"),
            size: (max_draws.max(1) as u64) * 20,
            usage,
            mapped_at_creation: false,
        });

        let mut acquired: Vec<Handle> = Vec::new();
        let result: Result<Vec<FrameResources>> = (0..FRAMES_IN_FLIGHT)
            .map(|_| {
                let cube = CubeImage::new(
                    device,
                    self.face_size,
                    wgpu::TextureFormat::Depth32Float,
                    wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                    "spherical_camera_cube_depth",
                )?;
                let cube_depth =
                    images.alloc(cube).map_err(|_| MjolnirError::CapacityExhausted { resource: "CubeImage pool" })?;
                acquired.push(cube_depth);

                let cube_view = &images.get(cube_depth).expect("just allocated").cube_view;
                let descriptor_set = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("spherical_camera_set"),
                    layout: layouts.descriptor_layout,
                    entries: &[
                        wgpu::BindGroupEntry { binding: 0, resource: layouts.node_buffer.buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 1, resource: layouts.mesh_buffer.buffer.as_entire_binding() },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: layouts.world_matrix_buffer.buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry { binding: 3, resource: count_buffer.as_entire_binding() },
                        wgpu::BindGroupEntry { binding: 4, resource: command_buffer.as_entire_binding() },
                        wgpu::BindGroupEntry {
                            binding: 5,
                            resource: wgpu::BindingResource::TextureView(cube_view),
                        },
                    ],
                });

                Ok(FrameResources { cube_depth, descriptor_set })
            })
            .collect();

        match result {
            Ok(frames) => {
                self.frames = frames;
                self.count_buffer = Some(count_buffer);
                self.command_buffer = Some(command_buffer);
                Ok(())
            }
            Err(err) => {
                for handle in acquired {
                    images.free(handle);
                }
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn cube_depth_handle(&self, frame: usize) -> Option<Handle> {
        self.frames.get(frame % FRAMES_IN_FLIGHT.max(1)).map(|f| f.cube_depth)
    }

    pub fn destroy(&mut self, images: &mut Pool<CubeImage>) {
        for frame in self.frames.drain(..) {
            images.free(frame.cube_depth);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_position_carries_center_and_radius() {
        let cam = SphericalCamera::new(Vec3::new(1.0, 2.0, 3.0), 5.0, 0.1, 10.0, 512);
        assert_eq!(cam.packed_position(), Vec4::new(1.0, 2.0, 3.0, 5.0));
    }

    #[test]
    fn projection_uses_90_degree_fov_and_unit_aspect() {
        let cam = SphericalCamera::new(Vec3::ZERO, 1.0, 0.01, 1.0, 512);
        let expected = Mat4::perspective_rh(90f32.to_radians(), 1.0, 0.01, 1.0);
        assert_eq!(cam.projection(), expected);
    }
}
