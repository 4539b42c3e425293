//! CPU-side mesh geometry and the slab-backed `Mesh` resource the
//! manager streams it into.

use glam::Vec3;

use crate::purge::RefCounted;
use crate::records::{MeshData, MeshFlags};

/// One vertex's skinning data: up to 4 bone influences.
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Skinning {
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

/// A CPU-authored mesh, ready to be streamed into the vertex/index/
/// skinning slabs. Vertex format is left to the caller (opaque bytes);
/// the manager only needs counts and the AABB.
pub struct Geometry {
    pub vertices: Vec<u8>,
    pub vertex_count: u32,
    pub indices: Vec<u32>,
    pub skinnings: Option<Vec<Skinning>>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
}

impl Geometry {
    #[must_use]
    pub fn compute_aabb(positions: &[Vec3]) -> (Vec3, Vec3) {
        positions.iter().fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(min, max), &p| {
            (min.min(p), max.max(p))
        })
    }
}

/// Where a mesh's three CPU arrays landed in the vertex/index/skinning
/// slabs, plus the `MeshData` record written at its pool slot.
pub struct Mesh {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub skinning_offset: Option<u32>,
    pub aabb_min: Vec3,
    pub aabb_max: Vec3,
    pub ref_count: u32,
    pub auto_purge: bool,
}

impl Mesh {
    #[must_use]
    pub fn gpu_data(&self) -> MeshData {
        let mut flags = MeshFlags::empty();
        if self.skinning_offset.is_some() {
            flags |= MeshFlags::SKINNED;
        }
        MeshData {
            aabb_min: self.aabb_min.extend(0.0),
            aabb_max: self.aabb_max.extend(0.0),
            index_offset: self.index_offset,
            index_count: self.index_count,
            vertex_offset: self.vertex_offset,
            skinning_offset: self.skinning_offset.unwrap_or(crate::records::NONE_INDEX),
            flags: flags.bits(),
            _pad: [0; 3],
        }
    }
}

impl RefCounted for Mesh {
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

    #[test]
    fn compute_aabb_spans_all_positions() {
        let positions =
            [Vec3::new(-1.0, 0.0, 2.0), Vec3::new(3.0, -4.0, 1.0), Vec3::new(0.0, 5.0, -2.0)];
        let (min, max) = Geometry::compute_aabb(&positions);
        assert_eq!(min, Vec3::new(-1.0, -4.0, -2.0));
        assert_eq!(max, Vec3::new(3.0, 5.0, 2.0));
    }

    #[test]
    fn gpu_data_sets_skinned_flag_iff_skinning_present() {
        let skinned = Mesh {
            vertex_offset: 0,
            vertex_count: 3,
            index_offset: 0,
            index_count: 3,
            skinning_offset: Some(0),
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ONE,
            ref_count: 0,
            auto_purge: true,
        };
        assert!(MeshFlags::from_bits_truncate(skinned.gpu_data().flags).contains(MeshFlags::SKINNED));

        let rigid = Mesh { skinning_offset: None, ..skinned_stub() };
        assert!(!MeshFlags::from_bits_truncate(rigid.gpu_data().flags).contains(MeshFlags::SKINNED));
    }

    fn skinned_stub() -> Mesh {
        Mesh {
            vertex_offset: 0,
            vertex_count: 3,
            index_offset: 0,
            index_count: 3,
            skinning_offset: Some(0),
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ONE,
            ref_count: 0,
            auto_purge: true,
        }
    }
}
