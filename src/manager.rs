//! `Manager`: the single aggregate that owns every pool, slab, bindless
//! buffer, sampler and descriptor-set/pipeline layout the renderer
//! consumes in a frame. Initializes in the fixed order the core spec's
//! §4.11 lays out and tears down strictly in reverse, with the
//! ownership-cascade exceptions that order describes (light pool before
//! camera pools, camera pools before image pools).

use std::num::NonZeroU32;
use std::sync::Arc;

use bytemuck::Zeroable;
use glam::{Affine3A, Mat4, Vec3};

use crate::bindless::{Bindless, Immutable, PerFrameBindless};
use crate::builtins::{self};
use crate::camera::{Camera, CameraSharedLayouts, Passes};
use crate::clip::Clip;
use crate::emitter::Emitter;
use crate::errors::{MjolnirError, Result};
use crate::forcefield::ForceField;
use crate::frustum::Ray;
use crate::handle::{Handle, Pool};
use crate::image::{CubeImage, Image};
use crate::light::{Light, LightType, ShadowCamera};
use crate::limits::{
    self, BONE_SLAB_CLASSES, FRAMES_IN_FLIGHT, INDEX_SLAB_CLASSES, SKINNING_SLAB_CLASSES, VERTEX_SLAB_CLASSES,
};
use crate::material::Material;
use crate::mesh::{Geometry, Mesh, Skinning};
use crate::purge;
use crate::records::{CameraData, EmitterData, ForceFieldData, LightData, MaterialData, MeshData, NodeData, SpriteData};
use crate::samplers::{depth_reduce_sampler, Samplers};
use crate::slab::SlabAllocator;
use crate::spherical_camera::{SphericalCamera, SphericalCameraSharedLayouts};
use crate::sprite::Sprite;
use crate::texture::{CubeTexture, Texture};

/// The small set of values a caller can still override at construction;
/// everything else is a fixed capacity from [`crate::limits`].
pub struct ManagerConfig {
    pub max_meshes: u32,
    pub max_materials: u32,
    pub max_textures: u32,
    pub max_cube_textures: u32,
    pub max_nodes: u32,
    pub max_cameras: u32,
    pub max_lights: u32,
    pub max_emitters: u32,
    pub max_force_fields: u32,
    pub max_sprites: u32,
    pub shadow_map_size: u32,
    pub max_draws_per_camera: u32,
    pub max_draws_per_shadow: u32,
    /// Bytes per vertex in the shared vertex slab. All meshes created
    /// against one `Manager` share a single interleaved vertex layout.
    pub vertex_stride_bytes: u32,
    pub vertex_slab_classes: Vec<(u32, u32)>,
    pub index_slab_classes: Vec<(u32, u32)>,
    pub skinning_slab_classes: Vec<(u32, u32)>,
    pub bone_slab_classes: Vec<(u32, u32)>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_meshes: limits::MAX_MESHES,
            max_materials: limits::MAX_MATERIALS,
            max_textures: limits::MAX_TEXTURES,
            max_cube_textures: limits::MAX_CUBE_TEXTURES,
            max_nodes: limits::MAX_NODES_IN_SCENE,
            max_cameras: limits::MAX_ACTIVE_CAMERAS,
            max_lights: limits::MAX_LIGHTS,
            max_emitters: limits::MAX_EMITTERS,
            max_force_fields: limits::MAX_FORCE_FIELDS,
            max_sprites: limits::MAX_SPRITES,
            shadow_map_size: limits::SHADOW_MAP_SIZE,
            max_draws_per_camera: 65_536,
            max_draws_per_shadow: 8_192,
            vertex_stride_bytes: 32,
            vertex_slab_classes: VERTEX_SLAB_CLASSES.to_vec(),
            index_slab_classes: INDEX_SLAB_CLASSES.to_vec(),
            skinning_slab_classes: SKINNING_SLAB_CLASSES.to_vec(),
            bone_slab_classes: BONE_SLAB_CLASSES.to_vec(),
        }
    }
}

/// A pool slot's shader-visible index is its handle's raw slot index —
/// the same small integer the generational scheme already guarantees is
/// stable and compact (core spec §3, "stable, compact indices").
fn slot(handle: Handle) -> u32 {
    handle.raw_parts().0
}

fn bgl_entry(binding: u32, ty: wgpu::BindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
        ty,
        count: None,
    }
}

fn storage_ty(read_only: bool) -> wgpu::BindingType {
    wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Storage { read_only },
        has_dynamic_offset: false,
        min_binding_size: None,
    }
}

/// A bind-group layout with a single storage-buffer binding, the shape
/// every `Bindless`/`PerFrameBindless`/`Immutable` record buffer needs.
fn storage_buffer_layout(device: &wgpu::Device, label: &str, read_only: bool) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[bgl_entry(0, storage_ty(read_only))],
    })
}

/// The late-cull descriptor set's layout (core spec §4.4): node, mesh,
/// world, camera, draw-count, draw-command buffers, plus the previous
/// frame's full depth-pyramid view and its MAX-reduction sampler.
fn late_cull_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("late_cull_layout"),
        entries: &[
            bgl_entry(0, storage_ty(true)),
            bgl_entry(1, storage_ty(true)),
            bgl_entry(2, storage_ty(true)),
            bgl_entry(3, storage_ty(true)),
            bgl_entry(4, storage_ty(false)),
            bgl_entry(5, storage_ty(false)),
            wgpu::BindGroupLayoutEntry {
                binding: 6,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 7,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

/// The per-mip depth-reduction descriptor set's layout (core spec
/// §4.10): source texture, destination storage texture, sampler.
fn depth_reduce_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("depth_reduce_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::UnfilterableFloat,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::R32Float,
                    view_dimension: wgpu::TextureViewDimension::D2,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                count: None,
            },
        ],
    })
}

/// The spherical-camera descriptor set's layout (core spec §4.5): node,
/// mesh, world, draw-count, draw-command buffers, plus the cube-depth
/// view the geometry shader renders into. No depth-pyramid binding.
fn spherical_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("spherical_descriptor_layout"),
        entries: &[
            bgl_entry(0, storage_ty(true)),
            bgl_entry(1, storage_ty(true)),
            bgl_entry(2, storage_ty(true)),
            bgl_entry(3, storage_ty(false)),
            bgl_entry(4, storage_ty(false)),
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
        ],
    })
}

/// The bindless textures descriptor set's layout: a sampled-2D-array
/// and a sampled-cube-array, each sized to its pool's capacity, plus
/// the 4 fixed sampler variants.
fn textures_descriptor_layout(device: &wgpu::Device, max_textures: u32, max_cube_textures: u32) -> wgpu::BindGroupLayout {
    let sampled = |dimension| wgpu::BindingType::Texture {
        sample_type: wgpu::TextureSampleType::Float { filterable: true },
        view_dimension: dimension,
        multisampled: false,
    };
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("textures_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                ty: sampled(wgpu::TextureViewDimension::D2),
                count: NonZeroU32::new(max_textures),
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                ty: sampled(wgpu::TextureViewDimension::Cube),
                count: NonZeroU32::new(max_cube_textures),
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 3,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 4,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 5,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn build_textures_descriptor_set(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture_views: &[&wgpu::TextureView],
    cube_views: &[&wgpu::TextureView],
    samplers: &Samplers,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("textures_descriptor_set"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureViewArray(texture_views) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureViewArray(cube_views) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&samplers.linear_clamp) },
            wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(&samplers.linear_repeat) },
            wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::Sampler(&samplers.nearest_clamp) },
            wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::Sampler(&samplers.nearest_repeat) },
        ],
    })
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> u32 {
    match format {
        wgpu::TextureFormat::R8Unorm => 1,
        wgpu::TextureFormat::Rg8Unorm => 2,
        wgpu::TextureFormat::Rgba16Float => 8,
        wgpu::TextureFormat::R32Float => 4,
        _ => 4,
    }
}

/// The shared vertex/index slabs and the single storage-buffer bind
/// group the general pipeline layout binds them through. Skinning and
/// bone data are sub-allocated from their own slabs/buffers since not
/// every mesh uses them.
struct GeometryBuffers {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    #[allow(dead_code)]
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl GeometryBuffers {
    fn new(device: &wgpu::Device, vertex_slab: &SlabAllocator, index_slab: &SlabAllocator, vertex_stride: u64) -> Self {
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vertex_buffer"),
            size: u64::from(vertex_slab.total_capacity()) * vertex_stride,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("index_buffer"),
            size: u64::from(index_slab.total_capacity()) * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("geometry_layout"),
            entries: &[bgl_entry(0, storage_ty(true)), bgl_entry(1, storage_ty(true))],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("geometry_bind_group"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: vertex_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: index_buffer.as_entire_binding() },
            ],
        });
        Self { vertex_buffer, index_buffer, layout, bind_group }
    }
}

/// The single authoritative catalog of every long-lived GPU object the
/// renderer consumes in a frame.
pub struct Manager {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: ManagerConfig,

    meshes: Pool<Mesh>,
    materials: Pool<Material>,
    textures: Pool<Texture>,
    cube_textures: Pool<CubeTexture>,
    cameras: Pool<Camera>,
    spherical_cameras: Pool<SphericalCamera>,
    lights: Pool<Light>,
    sprites: Pool<Sprite>,
    /// Frame bookkeeping: the animation tick list (core spec §2) — every
    /// sprite with animation state set, in no particular order. A
    /// sprite is registered by `create_sprite`/`sprite_set_animation`
    /// and unregistered by `sprite_clear_animation`/`destroy_sprite`.
    animating_sprites: rustc_hash::FxHashSet<Handle>,
    emitters: Pool<Emitter>,
    force_fields: Pool<ForceField>,
    clips: Pool<Clip>,
    images: Pool<Image>,
    cube_images: Pool<CubeImage>,

    samplers: Samplers,
    depth_reduce_sampler: wgpu::Sampler,

    vertex_slab: SlabAllocator,
    index_slab: SlabAllocator,
    skinning_slab: SlabAllocator,
    bone_slab: SlabAllocator,
    geometry: GeometryBuffers,

    #[allow(dead_code)]
    bone_layout: wgpu::BindGroupLayout,
    bone_buffer: wgpu::Buffer,
    #[allow(dead_code)]
    bone_bind_group: wgpu::BindGroup,

    node_layout: wgpu::BindGroupLayout,
    mesh_layout: wgpu::BindGroupLayout,
    world_matrix_layout: wgpu::BindGroupLayout,
    material_layout: wgpu::BindGroupLayout,
    light_layout: wgpu::BindGroupLayout,
    sprite_layout: wgpu::BindGroupLayout,
    emitter_layout: wgpu::BindGroupLayout,
    force_field_layout: wgpu::BindGroupLayout,
    camera_layout: wgpu::BindGroupLayout,
    #[allow(dead_code)]
    skinning_layout: wgpu::BindGroupLayout,

    node_buffer: Bindless<NodeData>,
    mesh_buffer: Bindless<MeshData>,
    material_buffer: Bindless<MaterialData>,
    world_matrix_buffer: Bindless<Mat4>,
    light_buffer: Bindless<LightData>,
    sprite_buffer: Bindless<SpriteData>,
    emitter_buffer: Bindless<EmitterData>,
    force_field_buffer: Bindless<ForceFieldData>,
    camera_buffer: PerFrameBindless<CameraData, FRAMES_IN_FLIGHT>,
    #[allow(dead_code)]
    skinning_buffer: Immutable<Skinning>,

    late_cull_layout: wgpu::BindGroupLayout,
    depth_reduce_layout: wgpu::BindGroupLayout,
    spherical_descriptor_layout: wgpu::BindGroupLayout,
    textures_layout: wgpu::BindGroupLayout,
    textures_descriptor_set: wgpu::BindGroup,
    #[allow(dead_code)]
    general_pipeline_layout: wgpu::PipelineLayout,
    #[allow(dead_code)]
    spherical_pipeline_layout: wgpu::PipelineLayout,

    default_image_handle: Handle,
    default_cube_handle: Handle,

    current_frame_index: usize,

    pub builtin_material: Handle,
    pub builtin_cube_mesh: Handle,
    pub builtin_quad_mesh: Handle,
}

impl Manager {
    /// Build every pool, sampler, slab, bindless buffer, descriptor-set
    /// layout and pipeline layout, in the order the core spec's §4.11
    /// fixes, finishing with the builtin material and meshes.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, config: ManagerConfig) -> Result<Self> {
        let meshes = Pool::with_capacity(config.max_meshes);
        let materials = Pool::with_capacity(config.max_materials);
        let textures = Pool::with_capacity(config.max_textures);
        let cube_textures = Pool::with_capacity(config.max_cube_textures);
        let cameras = Pool::with_capacity(config.max_cameras);
        let spherical_cameras = Pool::with_capacity(config.max_cameras);
        let lights = Pool::with_capacity(config.max_lights);
        let sprites = Pool::with_capacity(config.max_sprites);
        let emitters = Pool::with_capacity(config.max_emitters);
        let force_fields = Pool::with_capacity(config.max_force_fields);
        let clips = Pool::new();
        let mut images = Pool::new();
        let mut cube_images = Pool::new();

        let samplers = Samplers::new(&device);
        let reduce_sampler = depth_reduce_sampler(&device);

        let bone_slab = SlabAllocator::new("bone", &config.bone_slab_classes);
        let bone_layout = storage_buffer_layout(&device, "bone_layout", false);
        let bone_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bone_buffer"),
            size: u64::from(bone_slab.total_capacity()) * std::mem::size_of::<Mat4>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bone_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bone_bind_group"),
            layout: &bone_layout,
            entries: &[wgpu::BindGroupEntry { binding: 0, resource: bone_buffer.as_entire_binding() }],
        });

        let camera_layout = storage_buffer_layout(&device, "camera_layout", true);
        let camera_buffer = PerFrameBindless::<CameraData, FRAMES_IN_FLIGHT>::new(
            &device,
            &camera_layout,
            0,
            config.max_cameras,
            wgpu::BufferUsages::empty(),
            "camera_buffer",
        )?;

        let material_layout = storage_buffer_layout(&device, "material_layout", true);
        let material_buffer = Bindless::<MaterialData>::new(
            &device,
            &material_layout,
            0,
            config.max_materials,
            wgpu::BufferUsages::empty(),
            "material_buffer",
        )?;

        let world_matrix_layout = storage_buffer_layout(&device, "world_matrix_layout", true);
        let world_matrix_buffer = Bindless::<Mat4>::new(
            &device,
            &world_matrix_layout,
            0,
            config.max_nodes,
            wgpu::BufferUsages::empty(),
            "world_matrix_buffer",
        )?;

        let node_layout = storage_buffer_layout(&device, "node_layout", true);
        let node_buffer = Bindless::<NodeData>::new(
            &device,
            &node_layout,
            0,
            config.max_nodes,
            wgpu::BufferUsages::empty(),
            "node_buffer",
        )?;

        let mesh_layout = storage_buffer_layout(&device, "mesh_layout", true);
        let mesh_buffer = Bindless::<MeshData>::new(
            &device,
            &mesh_layout,
            0,
            config.max_meshes,
            wgpu::BufferUsages::empty(),
            "mesh_buffer",
        )?;

        let skinning_slab = SlabAllocator::new("skinning", &config.skinning_slab_classes);
        let skinning_layout = storage_buffer_layout(&device, "skinning_layout", true);
        let skinning_zeroed = vec![Skinning::zeroed(); skinning_slab.total_capacity().max(1) as usize];
        let skinning_buffer = Immutable::<Skinning>::new(
            &device,
            &skinning_layout,
            0,
            &skinning_zeroed,
            wgpu::BufferUsages::COPY_DST,
            "skinning_buffer",
        );

        let emitter_layout = storage_buffer_layout(&device, "emitter_layout", true);
        let emitter_buffer = Bindless::<EmitterData>::new(
            &device,
            &emitter_layout,
            0,
            config.max_emitters,
            wgpu::BufferUsages::empty(),
            "emitter_buffer",
        )?;

        let force_field_layout = storage_buffer_layout(&device, "force_field_layout", true);
        let force_field_buffer = Bindless::<ForceFieldData>::new(
            &device,
            &force_field_layout,
            0,
            config.max_force_fields,
            wgpu::BufferUsages::empty(),
            "force_field_buffer",
        )?;

        let light_layout = storage_buffer_layout(&device, "light_layout", true);
        let light_buffer = Bindless::<LightData>::new(
            &device,
            &light_layout,
            0,
            config.max_lights,
            wgpu::BufferUsages::empty(),
            "light_buffer",
        )?;

        let sprite_layout = storage_buffer_layout(&device, "sprite_layout", true);
        let sprite_buffer = Bindless::<SpriteData>::new(
            &device,
            &sprite_layout,
            0,
            config.max_sprites,
            wgpu::BufferUsages::empty(),
            "sprite_buffer",
        )?;

        let vertex_slab = SlabAllocator::new("vertex", &config.vertex_slab_classes);
        let index_slab = SlabAllocator::new("index", &config.index_slab_classes);
        let geometry = GeometryBuffers::new(&device, &vertex_slab, &index_slab, u64::from(config.vertex_stride_bytes));

        let default_image = Image::new_2d(
            &device,
            1,
            1,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            "default_texture",
        )?;
        let default_image_handle =
            images.alloc(default_image).map_err(|_| MjolnirError::CapacityExhausted { resource: "Image pool" })?;
        let default_cube = CubeImage::new(
            &device,
            1,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            wgpu::TextureUsages::TEXTURE_BINDING,
            "default_cube",
        )?;
        let default_cube_handle = cube_images
            .alloc(default_cube)
            .map_err(|_| MjolnirError::CapacityExhausted { resource: "CubeImage pool" })?;

        let textures_layout = textures_descriptor_layout(&device, config.max_textures, config.max_cube_textures);

        let default_view = images.get(default_image_handle).expect("just allocated").full_view.clone();
        let default_texture_views: Vec<wgpu::TextureView> =
            (0..config.max_textures).map(|_| default_view.clone()).collect();
        let default_cube_view = cube_images.get(default_cube_handle).expect("just allocated").cube_view.clone();
        let default_cube_views: Vec<wgpu::TextureView> =
            (0..config.max_cube_textures).map(|_| default_cube_view.clone()).collect();
        let texture_refs: Vec<&wgpu::TextureView> = default_texture_views.iter().collect();
        let cube_refs: Vec<&wgpu::TextureView> = default_cube_views.iter().collect();
        let textures_descriptor_set =
            build_textures_descriptor_set(&device, &textures_layout, &texture_refs, &cube_refs, &samplers);

        let late_cull_layout = late_cull_bind_group_layout(&device);
        let depth_reduce_layout = depth_reduce_bind_group_layout(&device);
        let general_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("general_pipeline_layout"),
            bind_group_layouts: &[
                &node_layout,
                &mesh_layout,
                &world_matrix_layout,
                &camera_layout,
                &material_layout,
                &light_layout,
                &sprite_layout,
                &emitter_layout,
                &force_field_layout,
                &textures_layout,
            ],
            push_constant_ranges: &[wgpu::PushConstantRange {
                stages: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT | wgpu::ShaderStages::COMPUTE,
                range: 0..4,
            }],
        });

        let spherical_descriptor_layout = spherical_bind_group_layout(&device);
        let spherical_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("spherical_pipeline_layout"),
            bind_group_layouts: &[&spherical_descriptor_layout, &textures_layout],
            push_constant_ranges: &[],
        });

        let mut manager = Self {
            device,
            queue,
            config,
            meshes,
            materials,
            textures,
            cube_textures,
            cameras,
            spherical_cameras,
            lights,
            sprites,
            animating_sprites: rustc_hash::FxHashSet::default(),
            emitters,
            force_fields,
            clips,
            images,
            cube_images,
            samplers,
            depth_reduce_sampler: reduce_sampler,
            vertex_slab,
            index_slab,
            skinning_slab,
            bone_slab,
            geometry,
            bone_layout,
            bone_buffer,
            bone_bind_group,
            node_layout,
            mesh_layout,
            world_matrix_layout,
            material_layout,
            light_layout,
            sprite_layout,
            emitter_layout,
            force_field_layout,
            camera_layout,
            skinning_layout,
            node_buffer,
            mesh_buffer,
            material_buffer,
            world_matrix_buffer,
            light_buffer,
            sprite_buffer,
            emitter_buffer,
            force_field_buffer,
            camera_buffer,
            skinning_buffer,
            late_cull_layout,
            depth_reduce_layout,
            spherical_descriptor_layout,
            textures_layout,
            textures_descriptor_set,
            general_pipeline_layout,
            spherical_pipeline_layout,
            default_image_handle,
            default_cube_handle,
            current_frame_index: 0,
            builtin_material: Handle::default(),
            builtin_cube_mesh: Handle::default(),
            builtin_quad_mesh: Handle::default(),
        };

        manager.builtin_cube_mesh = manager.create_mesh(&builtins::cube_geometry())?;
        manager.builtin_quad_mesh = manager.create_mesh(&builtins::quad_geometry())?;
        manager.builtin_material = manager.create_material(Material::new())?;

        Ok(manager)
    }

    // ------------------------------------------------------------------
    // Mesh
    // ------------------------------------------------------------------

    pub fn create_mesh(&mut self, geometry: &Geometry) -> Result<Handle> {
        let vertex_offset = self.vertex_slab.alloc(geometry.vertex_count)?;
        let index_offset = self.index_slab.alloc(geometry.indices.len() as u32)?;
        let skinning_offset = match &geometry.skinnings {
            Some(skinnings) => Some(self.skinning_slab.alloc(skinnings.len() as u32)?),
            None => None,
        };

        let vertex_byte_offset = u64::from(vertex_offset) * u64::from(self.config.vertex_stride_bytes);
        self.queue.write_buffer(&self.geometry.vertex_buffer, vertex_byte_offset, &geometry.vertices);

        let index_byte_offset = u64::from(index_offset) * 4;
        self.queue.write_buffer(&self.geometry.index_buffer, index_byte_offset, bytemuck::cast_slice(&geometry.indices));

        if let (Some(skinnings), Some(offset)) = (&geometry.skinnings, skinning_offset) {
            let byte_offset = u64::from(offset) * std::mem::size_of::<Skinning>() as u64;
            self.queue.write_buffer(&self.skinning_buffer.buffer, byte_offset, bytemuck::cast_slice(skinnings));
        }

        let mesh = Mesh {
            vertex_offset,
            vertex_count: geometry.vertex_count,
            index_offset,
            index_count: geometry.indices.len() as u32,
            skinning_offset,
            aabb_min: geometry.aabb_min,
            aabb_max: geometry.aabb_max,
            ref_count: 0,
            auto_purge: true,
        };

        let handle = self.meshes.alloc(mesh).map_err(|_| MjolnirError::CapacityExhausted { resource: "Mesh pool" })?;
        self.mesh_buffer.write(&self.queue, slot(handle), &self.meshes.get(handle).expect("just allocated").gpu_data())?;
        Ok(handle)
    }

    pub fn destroy_mesh(&mut self, handle: Handle) {
        if let Some(mesh) = self.meshes.free(handle) {
            self.vertex_slab.free(mesh.vertex_offset);
            self.index_slab.free(mesh.index_offset);
            if let Some(offset) = mesh.skinning_offset {
                self.skinning_slab.free(offset);
            }
        }
    }

    pub fn mesh(&self, handle: Handle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn mesh_ref(&mut self, handle: Handle) -> Option<u32> {
        purge::inc_ref(&mut self.meshes, handle)
    }

    pub fn mesh_unref(&mut self, handle: Handle) -> Option<u32> {
        purge::dec_ref(&mut self.meshes, handle)
    }

    pub fn purge_unused_meshes(&mut self) -> Vec<Handle> {
        let Self { meshes, vertex_slab, index_slab, skinning_slab, .. } = self;
        purge::purge_unused(meshes, |mesh| {
            vertex_slab.free(mesh.vertex_offset);
            index_slab.free(mesh.index_offset);
            if let Some(offset) = mesh.skinning_offset {
                skinning_slab.free(offset);
            }
        })
    }

    // ------------------------------------------------------------------
    // Material
    // ------------------------------------------------------------------

    pub fn create_material(&mut self, material: Material) -> Result<Handle> {
        let handle =
            self.materials.alloc(material).map_err(|_| MjolnirError::CapacityExhausted { resource: "Material pool" })?;
        let texture_handles: Vec<Handle> = self.materials.get(handle).expect("just allocated").textures.iter().collect();
        for texture in &texture_handles {
            purge::inc_ref(&mut self.textures, *texture);
        }
        self.rewrite_material(handle)?;
        Ok(handle)
    }

    pub fn destroy_material(&mut self, handle: Handle) {
        if let Some(material) = self.materials.free(handle) {
            for texture in material.textures.iter() {
                purge::dec_ref(&mut self.textures, texture);
            }
        }
    }

    pub fn material(&self, handle: Handle) -> Option<&Material> {
        self.materials.get(handle)
    }

    pub fn material_mut(&mut self, handle: Handle) -> Option<&mut Material> {
        self.materials.get_mut(handle)
    }

    /// Re-stage `handle`'s `MaterialData` record. Call after mutating a
    /// material returned by [`Manager::material_mut`].
    pub fn upload_material(&mut self, handle: Handle) -> Result<()> {
        self.rewrite_material(handle)
    }

    fn rewrite_material(&self, handle: Handle) -> Result<()> {
        let Some(material) = self.materials.get(handle) else { return Ok(()) };
        let data = material.gpu_data(|texture| self.textures.get(texture).map_or(crate::records::NONE_INDEX, |_| slot(texture)));
        self.material_buffer.write(&self.queue, slot(handle), &data)
    }

    pub fn material_ref(&mut self, handle: Handle) -> Option<u32> {
        purge::inc_ref(&mut self.materials, handle)
    }

    pub fn material_unref(&mut self, handle: Handle) -> Option<u32> {
        purge::dec_ref(&mut self.materials, handle)
    }

    pub fn purge_unused_materials(&mut self) -> Vec<Handle> {
        let Self { materials, textures, .. } = self;
        purge::purge_unused(materials, |material| {
            for texture in material.textures.iter() {
                purge::dec_ref(textures, texture);
            }
        })
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    pub fn create_texture_2d(&mut self, width: u32, height: u32, format: wgpu::TextureFormat, data: Option<&[u8]>) -> Result<Handle> {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let image = Image::new_2d(&self.device, width, height, format, usage, "texture_2d")?;
        if let Some(bytes) = data {
            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &image.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_pixel(format) * width),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            );
        }
        let image_handle =
            self.images.alloc(image).map_err(|_| MjolnirError::CapacityExhausted { resource: "Image pool" })?;
        let handle = self
            .textures
            .alloc(Texture::new(image_handle))
            .map_err(|_| MjolnirError::CapacityExhausted { resource: "Texture pool" })?;
        self.rebuild_textures_descriptor_set();
        Ok(handle)
    }

    pub fn destroy_texture_2d(&mut self, handle: Handle) {
        if let Some(texture) = self.textures.free(handle) {
            self.images.free(texture.image);
        }
        self.rebuild_textures_descriptor_set();
    }

    pub fn texture_ref(&mut self, handle: Handle) -> Option<u32> {
        purge::inc_ref(&mut self.textures, handle)
    }

    pub fn texture_unref(&mut self, handle: Handle) -> Option<u32> {
        purge::dec_ref(&mut self.textures, handle)
    }

    pub fn purge_unused_textures(&mut self) -> Vec<Handle> {
        let freed = {
            let Self { textures, images, .. } = self;
            purge::purge_unused(textures, |texture| {
                images.free(texture.image);
            })
        };
        self.rebuild_textures_descriptor_set();
        freed
    }

    pub fn create_texture_cube(&mut self, face_size: u32, format: wgpu::TextureFormat) -> Result<Handle> {
        let usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        let image = CubeImage::new(&self.device, face_size, format, usage, "texture_cube")?;
        let image_handle =
            self.cube_images.alloc(image).map_err(|_| MjolnirError::CapacityExhausted { resource: "CubeImage pool" })?;
        let handle = self
            .cube_textures
            .alloc(CubeTexture::new(image_handle))
            .map_err(|_| MjolnirError::CapacityExhausted { resource: "CubeTexture pool" })?;
        self.rebuild_textures_descriptor_set();
        Ok(handle)
    }

    pub fn destroy_texture_cube(&mut self, handle: Handle) {
        if let Some(texture) = self.cube_textures.free(handle) {
            self.cube_images.free(texture.image);
        }
        self.rebuild_textures_descriptor_set();
    }

    pub fn cube_texture_ref(&mut self, handle: Handle) -> Option<u32> {
        purge::inc_ref(&mut self.cube_textures, handle)
    }

    pub fn cube_texture_unref(&mut self, handle: Handle) -> Option<u32> {
        purge::dec_ref(&mut self.cube_textures, handle)
    }

    pub fn purge_unused_cube_textures(&mut self) -> Vec<Handle> {
        let freed = {
            let Self { cube_textures, cube_images, .. } = self;
            purge::purge_unused(cube_textures, |texture| {
                cube_images.free(texture.image);
            })
        };
        self.rebuild_textures_descriptor_set();
        freed
    }

    /// `purge_unused_meshes` → `purge_unused_materials` → `purge_unused_textures`
    /// → `purge_unused_cube_textures`, in that order, so texture unrefs
    /// cascading from a material purge are visible to the texture purge
    /// within the same call (core spec §4.9).
    pub fn purge_unused_resources(&mut self) {
        self.purge_unused_meshes();
        self.purge_unused_materials();
        self.purge_unused_textures();
        self.purge_unused_cube_textures();
    }

    fn rebuild_textures_descriptor_set(&mut self) {
        let default_view = self.images.get(self.default_image_handle).expect("default texture never freed").full_view.clone();
        let mut texture_views: Vec<wgpu::TextureView> =
            (0..self.config.max_textures).map(|_| default_view.clone()).collect();
        for (handle, texture) in self.textures.iter() {
            if let Some(image) = self.images.get(texture.image) {
                let index = slot(handle) as usize;
                if index < texture_views.len() {
                    texture_views[index] = image.full_view.clone();
                }
            }
        }

        let default_cube_view =
            self.cube_images.get(self.default_cube_handle).expect("default cube never freed").cube_view.clone();
        let mut cube_views: Vec<wgpu::TextureView> =
            (0..self.config.max_cube_textures).map(|_| default_cube_view.clone()).collect();
        for (handle, texture) in self.cube_textures.iter() {
            if let Some(image) = self.cube_images.get(texture.image) {
                let index = slot(handle) as usize;
                if index < cube_views.len() {
                    cube_views[index] = image.cube_view.clone();
                }
            }
        }

        let texture_refs: Vec<&wgpu::TextureView> = texture_views.iter().collect();
        let cube_refs: Vec<&wgpu::TextureView> = cube_views.iter().collect();
        self.textures_descriptor_set =
            build_textures_descriptor_set(&self.device, &self.textures_layout, &texture_refs, &cube_refs, &self.samplers);
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_light(
        &mut self,
        kind: LightType,
        node_index: u32,
        color: Vec3,
        intensity: f32,
        radius: f32,
        inner_cone: f32,
        outer_cone: f32,
        cast_shadow: bool,
    ) -> Result<Handle> {
        let mut light = match kind {
            LightType::Point => Light::new_point(node_index, color, intensity, radius),
            LightType::Directional => Light::new_directional(node_index, color, intensity),
            LightType::Spot => Light::new_spot(node_index, color, intensity, radius, inner_cone, outer_cone),
        };
        light.cast_shadow = cast_shadow;

        if cast_shadow {
            match kind {
                LightType::Point => {
                    let mut spherical =
                        SphericalCamera::new(Vec3::ZERO, radius, radius * 0.01, radius, self.config.shadow_map_size);
                    let max_draws = self.config.max_draws_per_shadow;
                    self.with_spherical_layouts(|device, cube_images, layouts| {
                        spherical.init_gpu(device, cube_images, max_draws, layouts)
                    })?;
                    let camera_handle = self
                        .spherical_cameras
                        .alloc(spherical)
                        .map_err(|_| MjolnirError::CapacityExhausted { resource: "SphericalCamera pool" })?;
                    light.shadow_camera = ShadowCamera::Spherical(camera_handle);
                }
                LightType::Directional | LightType::Spot => {
                    let (fov, near, far, passes) = light
                        .perspective_shadow_params()
                        .expect("cast_shadow on DIRECTIONAL/SPOT always yields perspective shadow params");
                    let mut camera = Camera::new_perspective(fov.to_degrees(), 1.0, near, far);
                    camera.passes = passes;
                    let size = self.config.shadow_map_size;
                    let max_draws = self.config.max_draws_per_shadow;
                    self.with_camera_layouts(|device, images, layouts| {
                        camera.init_gpu(device, images, size, size, max_draws, layouts)
                    })?;
                    let camera_handle = self
                        .cameras
                        .alloc(camera)
                        .map_err(|_| MjolnirError::CapacityExhausted { resource: "Camera pool" })?;
                    light.shadow_camera = ShadowCamera::Perspective(camera_handle);
                }
            }
        }

        let handle = self.lights.alloc(light).map_err(|_| MjolnirError::CapacityExhausted { resource: "Light pool" })?;
        self.rewrite_light(handle, self.current_frame_index)?;
        Ok(handle)
    }

    /// Destroying a light destroys its owned shadow camera (core spec
    /// §3): the spherical or perspective camera slot is freed, which in
    /// turn releases its cube-depth or 2D-attachment image slots.
    pub fn destroy_light(&mut self, handle: Handle) {
        if let Some(light) = self.lights.free(handle) {
            match light.shadow_camera {
                ShadowCamera::None => {}
                ShadowCamera::Spherical(camera_handle) => {
                    if let Some(mut spherical) = self.spherical_cameras.free(camera_handle) {
                        spherical.destroy(&mut self.cube_images);
                    }
                }
                ShadowCamera::Perspective(camera_handle) => {
                    if let Some(mut camera) = self.cameras.free(camera_handle) {
                        camera.destroy(&mut self.images);
                    }
                }
            }
        }
    }

    pub fn light(&self, handle: Handle) -> Option<&Light> {
        self.lights.get(handle)
    }

    /// For each active shadow-casting light: pull its world transform
    /// from the external world-matrix writer, update its owned shadow
    /// camera's transform, and rewrite `shadow_map` to this frame's
    /// depth slot (core spec §4.6).
    pub fn update_light_shadow_camera_transforms(&mut self, frame: usize, world_transform_of: impl Fn(u32) -> Affine3A) -> Result<()> {
        let handles: Vec<Handle> = self.lights.iter().filter(|(_, light)| light.cast_shadow).map(|(h, _)| h).collect();
        {
            let Self { lights, cameras, spherical_cameras, .. } = self;
            for handle in &handles {
                if let Some(light) = lights.get_mut(*handle) {
                    let world = world_transform_of(light.node_index);
                    light.update_shadow_transform(world, cameras, spherical_cameras);
                }
            }
        }
        for handle in handles {
            self.rewrite_light(handle, frame)?;
        }
        Ok(())
    }

    fn rewrite_light(&self, handle: Handle, frame: usize) -> Result<()> {
        let Some(light) = self.lights.get(handle) else { return Ok(()) };
        let (shadow_map, shadow_camera_slot) = match light.shadow_camera {
            ShadowCamera::None => (crate::records::NONE_INDEX, crate::records::NONE_INDEX),
            ShadowCamera::Spherical(camera_handle) => {
                let cube_handle = self.spherical_cameras.get(camera_handle).and_then(|c| c.cube_depth_handle(frame));
                (cube_handle.map_or(crate::records::NONE_INDEX, slot), slot(camera_handle))
            }
            ShadowCamera::Perspective(camera_handle) => {
                let depth_handle =
                    self.cameras.get(camera_handle).and_then(|c| c.attachment(frame, crate::camera::AttachmentKind::Depth));
                (depth_handle.map_or(crate::records::NONE_INDEX, slot), slot(camera_handle))
            }
        };
        let data = light.gpu_data(shadow_map, shadow_camera_slot);
        self.light_buffer.write(&self.queue, slot(handle), &data)
    }

    // ------------------------------------------------------------------
    // Sprites / emitters / force fields / clips — explicit create/destroy,
    // no ref counting (core spec §3).
    // ------------------------------------------------------------------

    pub fn create_sprite(&mut self, sprite: Sprite) -> Result<Handle> {
        let animating = sprite.animation.is_some();
        let handle = self.sprites.alloc(sprite).map_err(|_| MjolnirError::CapacityExhausted { resource: "Sprite pool" })?;
        if animating {
            self.animating_sprites.insert(handle);
        }
        self.rewrite_sprite(handle)?;
        Ok(handle)
    }

    pub fn destroy_sprite(&mut self, handle: Handle) {
        self.sprites.free(handle);
        self.animating_sprites.remove(&handle);
    }

    /// Set `handle`'s animation state and register it in the animation
    /// tick list (core spec §2/§3).
    pub fn sprite_set_animation(&mut self, handle: Handle, animation: crate::sprite::SpriteAnimation) -> Result<()> {
        let Some(sprite) = self.sprites.get_mut(handle) else { return Ok(()) };
        sprite.set_animation(animation);
        self.animating_sprites.insert(handle);
        self.rewrite_sprite(handle)
    }

    /// Clear `handle`'s animation state, unregistering it from the
    /// animation tick list (core spec §3: "clearing a sprite's animation
    /// state unregisters from the animation tick list").
    pub fn sprite_clear_animation(&mut self, handle: Handle) -> Result<()> {
        let Some(sprite) = self.sprites.get_mut(handle) else { return Ok(()) };
        if sprite.clear_animation() {
            self.animating_sprites.remove(&handle);
        }
        self.rewrite_sprite(handle)
    }

    #[must_use]
    pub fn animating_sprite_count(&self) -> usize {
        self.animating_sprites.len()
    }

    /// Advance every registered sprite's animation by `dt` seconds and
    /// re-stage its `SpriteData` record. Part of frame bookkeeping (core
    /// spec §2): the tick list is walked once per frame, independent of
    /// `rewrite_sprite`'s per-call path used by create/set/clear.
    pub fn tick_sprite_animations(&mut self, dt: f32) -> Result<()> {
        let handles: Vec<Handle> = self.animating_sprites.iter().copied().collect();
        for &handle in &handles {
            if let Some(sprite) = self.sprites.get_mut(handle) {
                if let Some(animation) = &mut sprite.animation {
                    animation.advance(dt);
                }
            }
        }
        for handle in handles {
            self.rewrite_sprite(handle)?;
        }
        Ok(())
    }

    fn rewrite_sprite(&self, handle: Handle) -> Result<()> {
        let Some(sprite) = self.sprites.get(handle) else { return Ok(()) };
        let data = sprite.gpu_data(|texture| self.textures.get(texture).map_or(crate::records::NONE_INDEX, |_| slot(texture)));
        self.sprite_buffer.write(&self.queue, slot(handle), &data)
    }

    pub fn create_emitter(&mut self, emitter: Emitter) -> Result<Handle> {
        let handle =
            self.emitters.alloc(emitter).map_err(|_| MjolnirError::CapacityExhausted { resource: "Emitter pool" })?;
        self.rewrite_emitter(handle)?;
        Ok(handle)
    }

    pub fn destroy_emitter(&mut self, handle: Handle) {
        self.emitters.free(handle);
    }

    fn rewrite_emitter(&self, handle: Handle) -> Result<()> {
        let Some(emitter) = self.emitters.get(handle) else { return Ok(()) };
        let data = emitter.gpu_data(|texture| self.textures.get(texture).map_or(crate::records::NONE_INDEX, |_| slot(texture)));
        self.emitter_buffer.write(&self.queue, slot(handle), &data)
    }

    pub fn create_force_field(&mut self, force_field: ForceField) -> Result<Handle> {
        let handle = self
            .force_fields
            .alloc(force_field)
            .map_err(|_| MjolnirError::CapacityExhausted { resource: "ForceField pool" })?;
        let data = self.force_fields.get(handle).expect("just allocated").gpu_data();
        self.force_field_buffer.write(&self.queue, slot(handle), &data)?;
        Ok(handle)
    }

    pub fn destroy_force_field(&mut self, handle: Handle) {
        self.force_fields.free(handle);
    }

    pub fn create_clip(&mut self, bone_count: u32, duration: f32) -> Result<Handle> {
        let bone_offset = self.bone_slab.alloc(bone_count)?;
        let clip = Clip::new(bone_offset, bone_count, duration);
        self.clips.alloc(clip).map_err(|_| MjolnirError::CapacityExhausted { resource: "Clip pool" })
    }

    pub fn destroy_clip(&mut self, handle: Handle) {
        if let Some(clip) = self.clips.free(handle) {
            self.bone_slab.free(clip.bone_offset);
        }
    }

    // ------------------------------------------------------------------
    // Camera surface
    // ------------------------------------------------------------------

    pub fn camera_init_perspective(&mut self, fov_degrees: f32, near: f32, far: f32, passes: Passes, width: u32, height: u32) -> Result<Handle> {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let mut camera = Camera::new_perspective(fov_degrees, aspect, near, far);
        camera.passes = passes;
        let max_draws = self.config.max_draws_per_camera;
        self.with_camera_layouts(|device, images, layouts| camera.init_gpu(device, images, width, height, max_draws, layouts))?;
        self.cameras.alloc(camera).map_err(|_| MjolnirError::CapacityExhausted { resource: "Camera pool" })
    }

    pub fn camera_init_orthographic(&mut self, ortho_size: f32, near: f32, far: f32, passes: Passes, width: u32, height: u32) -> Result<Handle> {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let mut camera = Camera::new_orthographic(ortho_size, aspect, near, far);
        camera.passes = passes;
        let max_draws = self.config.max_draws_per_camera;
        self.with_camera_layouts(|device, images, layouts| camera.init_gpu(device, images, width, height, max_draws, layouts))?;
        self.cameras.alloc(camera).map_err(|_| MjolnirError::CapacityExhausted { resource: "Camera pool" })
    }

    pub fn camera_resize(&mut self, handle: Handle, width: u32, height: u32) -> Result<()> {
        let Self {
            cameras, device, images, late_cull_layout, depth_reduce_layout, depth_reduce_sampler,
            node_buffer, mesh_buffer, world_matrix_buffer, camera_buffer, light_buffer, ..
        } = self;
        let Some(camera) = cameras.get_mut(handle) else { return Ok(()) };
        let layouts = CameraSharedLayouts {
            late_cull_layout,
            depth_reduce_layout,
            depth_reduce_sampler,
            node_buffer,
            mesh_buffer,
            world_matrix_buffer,
            camera_buffer,
            light_buffer,
        };
        camera.resize(device, images, width, height, &layouts)
    }

    pub fn camera_upload_data(&mut self, frame: usize, handle: Handle) -> Result<()> {
        let Some(camera) = self.cameras.get(handle) else { return Ok(()) };
        let data = camera.gpu_data();
        self.camera_buffer.write(&self.queue, frame, slot(handle), &data)
    }

    /// Stage `frame`'s draw count into its host-visible readback buffer
    /// (core spec §9: `camera_get_visible_count`'s mapped-counter path).
    /// Call after the late culling pass has written this frame's
    /// `count_buffer`, before `camera_get_visible_count`.
    pub fn camera_stage_visible_count_readback(&self, encoder: &mut wgpu::CommandEncoder, frame: usize, handle: Handle) {
        if let Some(camera) = self.cameras.get(handle) {
            camera.stage_visible_count_readback(encoder, frame);
        }
    }

    /// `camera_get_visible_count`: the last draw count the GPU wrote for
    /// `frame`, observed through a mapped host-visible buffer. `None`
    /// until `camera_stage_visible_count_readback`'s copy has landed.
    #[must_use]
    pub fn camera_get_visible_count(&self, handle: Handle, frame: usize) -> Option<u32> {
        self.cameras.get(handle)?.visible_count(&self.device, frame)
    }

    pub fn camera_viewport_to_world_ray(&self, handle: Handle, mx: f32, my: f32) -> Option<Ray> {
        self.cameras.get(handle).map(|camera| camera.viewport_to_world_ray(mx, my))
    }

    /// Test `ray` against the world-space AABB of every `(mesh, world
    /// transform)` pair, returning the closest hit. Scene-graph transform
    /// lookup is the caller's responsibility (core spec §1 Non-goals: no
    /// CPU-side scene-graph transforms inside the Manager).
    pub fn camera_raycast_single(&self, ray: &Ray, nodes: &[(Handle, Affine3A)]) -> Option<(Handle, f32)> {
        self.camera_raycast_multi(ray, nodes).into_iter().next()
    }

    pub fn camera_raycast_multi(&self, ray: &Ray, nodes: &[(Handle, Affine3A)]) -> Vec<(Handle, f32)> {
        let mut hits: Vec<(Handle, f32)> = nodes
            .iter()
            .filter_map(|&(mesh_handle, world)| {
                let mesh = self.meshes.get(mesh_handle)?;
                let corners = aabb_corners(mesh.aabb_min, mesh.aabb_max).map(|corner| world.transform_point3(corner));
                let world_min = corners.into_iter().fold(Vec3::splat(f32::MAX), Vec3::min);
                let world_max = corners.into_iter().fold(Vec3::splat(f32::MIN), Vec3::max);
                ray.intersect_aabb(world_min, world_max).map(|t| (mesh_handle, t))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }

    fn with_camera_layouts<R>(&mut self, f: impl FnOnce(&wgpu::Device, &mut Pool<Image>, &CameraSharedLayouts<'_>) -> R) -> R {
        let Self {
            device, images, late_cull_layout, depth_reduce_layout, depth_reduce_sampler,
            node_buffer, mesh_buffer, world_matrix_buffer, camera_buffer, light_buffer, ..
        } = self;
        let layouts = CameraSharedLayouts {
            late_cull_layout,
            depth_reduce_layout,
            depth_reduce_sampler,
            node_buffer,
            mesh_buffer,
            world_matrix_buffer,
            camera_buffer,
            light_buffer,
        };
        f(device, images, &layouts)
    }

    fn with_spherical_layouts<R>(
        &mut self,
        f: impl FnOnce(&wgpu::Device, &mut Pool<CubeImage>, &SphericalCameraSharedLayouts<'_>) -> R,
    ) -> R {
        let Self { device, cube_images, spherical_descriptor_layout, node_buffer, mesh_buffer, world_matrix_buffer, .. } = self;
        let layouts = SphericalCameraSharedLayouts {
            descriptor_layout: spherical_descriptor_layout,
            node_buffer,
            mesh_buffer,
            world_matrix_buffer,
        };
        f(device, cube_images, &layouts)
    }

    // ------------------------------------------------------------------
    // Frame bookkeeping
    // ------------------------------------------------------------------

    pub fn begin_frame(&mut self, frame_index: usize) {
        self.current_frame_index = frame_index % FRAMES_IN_FLIGHT;
    }

    #[must_use]
    pub fn current_frame_index(&self) -> usize {
        self.current_frame_index
    }

    /// Release every resource with cross-pool ownership, in the strict
    /// order the core spec's §4.11 fixes: light pool before camera
    /// pools (releases owned shadow cameras), camera pools before image
    /// pools (releases owned attachments), then meshes (releases slab
    /// regions). Every remaining pool, buffer, sampler and layout has no
    /// owned cross-pool handle and releases its GPU resources via
    /// ordinary `Drop` once `self` goes out of scope after this call.
    pub fn shutdown(mut self) {
        let light_handles: Vec<Handle> = self.lights.iter().map(|(h, _)| h).collect();
        for handle in light_handles {
            self.destroy_light(handle);
        }

        let camera_handles: Vec<Handle> = self.cameras.iter().map(|(h, _)| h).collect();
        for handle in camera_handles {
            if let Some(mut camera) = self.cameras.free(handle) {
                camera.destroy(&mut self.images);
            }
        }

        let spherical_handles: Vec<Handle> = self.spherical_cameras.iter().map(|(h, _)| h).collect();
        for handle in spherical_handles {
            if let Some(mut spherical) = self.spherical_cameras.free(handle) {
                spherical.destroy(&mut self.cube_images);
            }
        }

        let mesh_handles: Vec<Handle> = self.meshes.iter().map(|(h, _)| h).collect();
        for handle in mesh_handles {
            self.destroy_mesh(handle);
        }
    }
}

fn aabb_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(min.x, max.y, max.z),
        Vec3::new(max.x, max.y, max.z),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_fixed_capacities() {
        let config = ManagerConfig::default();
        assert_eq!(config.max_meshes, limits::MAX_MESHES);
        assert_eq!(config.max_lights, limits::MAX_LIGHTS);
        assert_eq!(config.shadow_map_size, limits::SHADOW_MAP_SIZE);
    }

    #[test]
    fn aabb_corners_span_the_box() {
        let corners = aabb_corners(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(corners.contains(&Vec3::splat(-1.0)));
        assert!(corners.contains(&Vec3::splat(1.0)));
        assert_eq!(corners.len(), 8);
    }
}
