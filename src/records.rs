//! GPU-side resource records: the fixed, bit-exact layouts written into
//! the bindless buffers and indexed by a `Pool` slot. Field order is
//! shader-visible ABI — never reorder an existing field, only append.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Sentinel for "no shadow map"/"no texture bound" slot indices.
pub const NONE_INDEX: u32 = 0xFFFF_FFFF;

/// `CameraData` — replicated per frame in [`crate::bindless::PerFrameBindless`].
///
/// Field order matches the core spec's §6 layout exactly:
/// `{view, projection, viewport_params, position, frustum_planes}`. The
/// spec's declared size (208 bytes) is 48 bytes short of the literal sum
/// of these fields (256 bytes, see [`CameraData`] size test); the field
/// order is the authoritative, shader-visible part of the contract, so
/// it is kept verbatim and the byte-count note is carried only in
/// documentation.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct CameraData {
    pub view: Mat4,
    pub projection: Mat4,
    /// xy = viewport size in pixels, zw = 1/viewport size.
    pub viewport_params: Vec4,
    /// xyz = world-space position, w unused.
    pub position: Vec4,
    pub frustum_planes: [Vec4; 6],
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            viewport_params: Vec4::ZERO,
            position: Vec4::ZERO,
            frustum_planes: [Vec4::ZERO; 6],
        }
    }
}

bitflags::bitflags! {
    /// Feature bits referenced by a shader to select which texture
    /// slots of [`MaterialData`] are meaningful.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct MaterialFeatures: u32 {
        const USE_ALBEDO_MAP             = 1 << 0;
        const USE_METALLIC_ROUGHNESS_MAP = 1 << 1;
        const USE_NORMAL_MAP             = 1 << 2;
        const USE_EMISSIVE_MAP           = 1 << 3;
    }
}

/// `MaterialData` — staged in a singleton [`crate::bindless::Bindless`] buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MaterialData {
    pub base_color_factor: Vec4,
    /// xyz = emissive factor, w unused.
    pub emissive_factor: Vec4,
    pub albedo_texture: u32,
    pub metallic_roughness_texture: u32,
    pub normal_texture: u32,
    pub emissive_texture: u32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub features: u32,
    pub _pad: u32,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            base_color_factor: Vec4::ONE,
            emissive_factor: Vec4::ZERO,
            albedo_texture: NONE_INDEX,
            metallic_roughness_texture: NONE_INDEX,
            normal_texture: NONE_INDEX,
            emissive_texture: NONE_INDEX,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            features: 0,
            _pad: 0,
        }
    }
}

bitflags::bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct MeshFlags: u32 {
        const SKINNED = 1 << 0;
    }
}

/// `MeshData` — staged in a singleton [`crate::bindless::Bindless`] buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MeshData {
    /// xyz = AABB min, w unused.
    pub aabb_min: Vec4,
    /// xyz = AABB max, w unused.
    pub aabb_max: Vec4,
    pub index_offset: u32,
    pub index_count: u32,
    pub vertex_offset: u32,
    pub skinning_offset: u32,
    pub flags: u32,
    pub _pad: [u32; 3],
}

impl MeshData {
    #[must_use]
    pub fn aabb(&self) -> (Vec3, Vec3) {
        (self.aabb_min.truncate(), self.aabb_max.truncate())
    }
}

impl Default for MeshData {
    fn default() -> Self {
        Self {
            aabb_min: Vec4::ZERO,
            aabb_max: Vec4::ZERO,
            index_offset: 0,
            index_count: 0,
            vertex_offset: 0,
            skinning_offset: NONE_INDEX,
            flags: 0,
            _pad: [0; 3],
        }
    }
}

/// Discriminant stored in [`LightData::light_type`]. Mirrors
/// [`crate::light::LightType`] but as the wire-format `u32` tag.
pub const LIGHT_TYPE_POINT: u32 = 0;
pub const LIGHT_TYPE_DIRECTIONAL: u32 = 1;
pub const LIGHT_TYPE_SPOT: u32 = 2;

/// `LightData` — staged in a singleton [`crate::bindless::Bindless`] buffer.
///
/// Per the core spec's Open Question #1, the shadow-map slot lives
/// inline here rather than in a separate per-frame buffer: the light
/// record always holds the *current frame's* shadow-map index, rewritten
/// each frame by [`crate::manager::Manager::update_light_shadow_camera_transforms`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct LightData {
    /// xyz = color, w = intensity.
    pub color: Vec4,
    pub radius: f32,
    pub inner_cone: f32,
    pub outer_cone: f32,
    pub light_type: u32,
    pub node_index: u32,
    /// Cube-image index for POINT, 2D-image index for DIRECTIONAL/SPOT,
    /// `NONE_INDEX` when `cast_shadow` is false.
    pub shadow_map: u32,
    pub shadow_camera: u32,
    pub cast_shadow: u32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            color: Vec4::ONE,
            radius: 1.0,
            inner_cone: 0.0,
            outer_cone: std::f32::consts::FRAC_PI_4,
            light_type: LIGHT_TYPE_POINT,
            node_index: 0,
            shadow_map: NONE_INDEX,
            shadow_camera: NONE_INDEX,
            cast_shadow: 0,
        }
    }
}

/// `NodeData` — per-scene-node GPU metadata the cull pass reads to
/// decide, for each node, which mesh/material to draw and where to find
/// its world matrix. Distinct from the world-matrix buffer itself (one
/// 4x4 per node, written by the external world-matrix writer) and from
/// `MeshData` (one per distinct mesh asset, not per node instance).
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct NodeData {
    pub mesh_index: u32,
    pub material_index: u32,
    pub world_matrix_index: u32,
    pub flags: u32,
}

impl Default for NodeData {
    fn default() -> Self {
        Self { mesh_index: NONE_INDEX, material_index: NONE_INDEX, world_matrix_index: 0, flags: 0 }
    }
}

/// `SpriteData` — billboard quad keyed by node index.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct SpriteData {
    pub node_index: u32,
    pub texture: u32,
    /// Quad half-extent in world units.
    pub size: [f32; 2],
    /// xy = UV offset, zw = UV scale.
    pub uv_rect: Vec4,
    pub tint: Vec4,
}

impl Default for SpriteData {
    fn default() -> Self {
        Self {
            node_index: 0,
            texture: NONE_INDEX,
            size: [1.0, 1.0],
            uv_rect: Vec4::new(0.0, 0.0, 1.0, 1.0),
            tint: Vec4::ONE,
        }
    }
}

/// `EmitterData` — CPU-authored particle emitter parameters.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct EmitterData {
    pub node_index: u32,
    pub texture: u32,
    pub rate: f32,
    pub lifetime: f32,
    pub start_size: f32,
    pub end_size: f32,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub speed: f32,
    pub spread: f32,
    pub _pad: [f32; 2],
}

impl Default for EmitterData {
    fn default() -> Self {
        Self {
            node_index: 0,
            texture: NONE_INDEX,
            rate: 10.0,
            lifetime: 1.0,
            start_size: 1.0,
            end_size: 0.0,
            start_color: Vec4::ONE,
            end_color: Vec4::ZERO,
            speed: 1.0,
            spread: 0.0,
            _pad: [0.0; 2],
        }
    }
}

/// Discriminant stored in [`ForceFieldData::field_type`].
pub const FORCE_FIELD_GRAVITY: u32 = 0;
pub const FORCE_FIELD_WIND: u32 = 1;
pub const FORCE_FIELD_VORTEX: u32 = 2;

/// `ForceFieldData` — CPU-authored particle force-field parameters.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ForceFieldData {
    pub node_index: u32,
    pub field_type: u32,
    pub strength: f32,
    pub radius: f32,
}

impl Default for ForceFieldData {
    fn default() -> Self {
        Self { node_index: 0, field_type: FORCE_FIELD_GRAVITY, strength: 1.0, radius: 10.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_data_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<CameraData>() % 16, 0);
        assert_eq!(std::mem::align_of::<CameraData>(), 16);
    }

    #[test]
    fn records_are_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<MaterialData>() % 16, 0);
        assert_eq!(std::mem::size_of::<MeshData>() % 16, 0);
        assert_eq!(std::mem::size_of::<LightData>() % 16, 0);
    }

    #[test]
    fn mesh_data_default_has_no_skinning() {
        let mesh = MeshData::default();
        assert_eq!(mesh.skinning_offset, NONE_INDEX);
        assert!(!MeshFlags::from_bits_truncate(mesh.flags).contains(MeshFlags::SKINNED));
    }

    #[test]
    fn light_data_default_has_no_shadow() {
        let light = LightData::default();
        assert_eq!(light.shadow_map, NONE_INDEX);
        assert_eq!(light.cast_shadow, 0);
    }
}
