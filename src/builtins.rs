//! Pre-populated primitive meshes and named colors, installed by
//! [`crate::manager::Manager::new`] as the last step of initialization
//! so scene code always has a unit cube/quad and a default material
//! available without a glTF import round-trip.

use glam::Vec3;

use crate::mesh::Geometry;

/// Named colors as linear `Vec3` factors, for default material/sprite
/// tints.
pub mod colors {
    use glam::Vec3;

    pub const WHITE: Vec3 = Vec3::new(1.0, 1.0, 1.0);
    pub const BLACK: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const RED: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const GREEN: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const BLUE: Vec3 = Vec3::new(0.0, 0.0, 1.0);
    pub const YELLOW: Vec3 = Vec3::new(1.0, 1.0, 0.0);
    pub const CYAN: Vec3 = Vec3::new(0.0, 1.0, 1.0);
    pub const MAGENTA: Vec3 = Vec3::new(1.0, 0.0, 1.0);
    pub const GRAY: Vec3 = Vec3::new(0.5, 0.5, 0.5);
}

fn positions_to_geometry(positions: &[Vec3], indices: Vec<u32>) -> Geometry {
    let vertices = bytemuck::cast_slice(positions).to_vec();
    let (aabb_min, aabb_max) = Geometry::compute_aabb(positions);
    Geometry {
        vertices,
        vertex_count: positions.len() as u32,
        indices,
        skinnings: None,
        aabb_min,
        aabb_max,
    }
}

/// A 2-unit axis-aligned cube centered on the origin, position-only
/// vertices (24 verts, one per face-corner, so each face keeps flat
/// shading seams rather than sharing normals across edges).
#[must_use]
pub fn cube_geometry() -> Geometry {
    const P: f32 = 1.0;
    let faces: [[Vec3; 4]; 6] = [
        // +X, -X, +Y, -Y, +Z, -Z
        [Vec3::new(P, -P, -P), Vec3::new(P, P, -P), Vec3::new(P, P, P), Vec3::new(P, -P, P)],
        [Vec3::new(-P, -P, P), Vec3::new(-P, P, P), Vec3::new(-P, P, -P), Vec3::new(-P, -P, -P)],
        [Vec3::new(-P, P, -P), Vec3::new(-P, P, P), Vec3::new(P, P, P), Vec3::new(P, P, -P)],
        [Vec3::new(-P, -P, P), Vec3::new(-P, -P, -P), Vec3::new(P, -P, -P), Vec3::new(P, -P, P)],
        [Vec3::new(P, -P, P), Vec3::new(P, P, P), Vec3::new(-P, P, P), Vec3::new(-P, -P, P)],
        [Vec3::new(-P, -P, -P), Vec3::new(-P, P, -P), Vec3::new(P, P, -P), Vec3::new(P, -P, -P)],
    ];

    let mut positions = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for face in &faces {
        let base = positions.len() as u32;
        positions.extend_from_slice(face);
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    positions_to_geometry(&positions, indices)
}

/// A single-sided unit quad in the XY plane, facing +Z.
#[must_use]
pub fn quad_geometry() -> Geometry {
    let positions = [
        Vec3::new(-0.5, -0.5, 0.0),
        Vec3::new(0.5, -0.5, 0.0),
        Vec3::new(0.5, 0.5, 0.0),
        Vec3::new(-0.5, 0.5, 0.0),
    ];
    positions_to_geometry(&positions, vec![0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_geometry_has_24_vertices_and_36_indices() {
        let cube = cube_geometry();
        assert_eq!(cube.vertex_count, 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.aabb_min, Vec3::splat(-1.0));
        assert_eq!(cube.aabb_max, Vec3::splat(1.0));
    }

    #[test]
    fn quad_geometry_has_4_vertices_and_6_indices() {
        let quad = quad_geometry();
        assert_eq!(quad.vertex_count, 4);
        assert_eq!(quad.indices.len(), 6);
    }
}
