//! Resource Lifecycle Tests
//!
//! Cross-module scenarios that exercise more than one module together,
//! the way `Manager` composes them internally, without requiring a real
//! `wgpu::Device`:
//! - Generational handle staleness across free/realloc
//! - Material -> texture ref-count cascade on purge
//! - Slab reuse tied to a mesh's destroy/recreate cycle
//! - Multi-mesh raycast against world-space AABBs

use glam::{Affine3A, Vec3};

use mjolnir::frustum::Ray;
use mjolnir::handle::Pool;
use mjolnir::material::Material;
use mjolnir::mesh::Mesh;
use mjolnir::purge;
use mjolnir::records::NONE_INDEX;
use mjolnir::slab::SlabAllocator;
use mjolnir::texture::Texture;

#[test]
fn freed_slot_invalidates_the_old_handle_on_realloc() {
    let mut meshes: Pool<Mesh> = Pool::new();
    let stub = |ref_count| Mesh {
        vertex_offset: 0,
        vertex_count: 3,
        index_offset: 0,
        index_count: 3,
        skinning_offset: None,
        aabb_min: Vec3::ZERO,
        aabb_max: Vec3::ONE,
        ref_count,
        auto_purge: true,
    };

    let first = meshes.alloc(stub(0)).unwrap();
    meshes.free(first);
    let second = meshes.alloc(stub(0)).unwrap();

    assert_ne!(first, second, "realloc of a freed slot must bump generation");
    assert!(meshes.get(first).is_none());
    assert!(meshes.get(second).is_some());
}

#[test]
fn destroying_a_material_cascades_an_unref_into_its_textures() {
    // Mirrors Manager::destroy_material -> purge_unused_materials ->
    // purge_unused_textures, using the real Material/Texture types
    // rather than purge.rs's internal stubs.
    let mut images: Pool<()> = Pool::new();
    let image = images.alloc(()).unwrap();

    let mut textures: Pool<Texture> = Pool::new();
    let texture = textures.alloc(Texture::new(image)).unwrap();
    purge::inc_ref(&mut textures, texture);
    assert_eq!(textures.get(texture).unwrap().ref_count, 1);

    let mut materials: Pool<Material> = Pool::new();
    let mut material = Material::new();
    material.textures.albedo = Some(texture);
    let material_handle = materials.alloc(material).unwrap();
    // No inc_ref on the material itself: ref_count stays 0, so it is
    // immediately eligible for purge.

    let freed_materials = purge::purge_unused(&mut materials, |m| {
        for texture_handle in m.textures.iter() {
            purge::dec_ref(&mut textures, texture_handle);
        }
    });
    assert_eq!(freed_materials, vec![material_handle]);
    assert_eq!(textures.get(texture).unwrap().ref_count, 0);

    let freed_textures = purge::purge_unused(&mut textures, |_| {});
    assert_eq!(freed_textures, vec![texture]);
}

#[test]
fn live_ref_survives_a_purge_pass_its_owner_does_not() {
    // A texture referenced by two materials keeps a ref_count of 1 after
    // only one of them is destroyed.
    let mut images: Pool<()> = Pool::new();
    let image = images.alloc(()).unwrap();

    let mut textures: Pool<Texture> = Pool::new();
    let texture = textures.alloc(Texture::new(image)).unwrap();
    purge::inc_ref(&mut textures, texture);
    purge::inc_ref(&mut textures, texture);

    let mut materials: Pool<Material> = Pool::new();
    let mut surviving = Material::new();
    surviving.textures.albedo = Some(texture);
    let surviving_handle = materials.alloc(surviving).unwrap();

    let mut doomed = Material::new();
    doomed.textures.albedo = Some(texture);
    materials.alloc(doomed).unwrap();
    purge::dec_ref(&mut textures, texture); // simulates destroy_material on `doomed`

    assert!(purge::purge_unused(&mut textures, |_| {}).is_empty());
    assert_eq!(textures.get(texture).unwrap().ref_count, 1);
    assert!(materials.get(surviving_handle).is_some());
}

#[test]
fn mesh_slab_offsets_are_reused_after_destroy() {
    let mut vertex_slab = SlabAllocator::new("vertex", &[(8, 4), (64, 2)]);
    let mut meshes: Pool<Mesh> = Pool::new();

    let offset_a = vertex_slab.alloc(4).unwrap();
    let a = meshes
        .alloc(Mesh {
            vertex_offset: offset_a,
            vertex_count: 4,
            index_offset: 0,
            index_count: 0,
            skinning_offset: None,
            aabb_min: Vec3::ZERO,
            aabb_max: Vec3::ONE,
            ref_count: 0,
            auto_purge: true,
        })
        .unwrap();

    let mesh = meshes.free(a).unwrap();
    vertex_slab.free(mesh.vertex_offset);

    let offset_b = vertex_slab.alloc(4).unwrap();
    assert_eq!(offset_a, offset_b, "freed vertex block must be reused by the next same-class alloc");
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

fn world_aabb(transform: Affine3A, min: Vec3, max: Vec3) -> (Vec3, Vec3) {
    aabb_corners(min, max)
        .into_iter()
        .map(|corner| transform.transform_point3(corner))
        .fold((Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)), |(lo, hi), p| (lo.min(p), hi.max(p)))
}

#[test]
fn raycast_picks_the_nearest_of_several_overlapping_meshes() {
    // Two unit cubes along the ray, a third mesh entirely off to the
    // side; the nearer on-axis cube must win.
    let ray = Ray { origin: Vec3::new(0.0, 0.0, 10.0), direction: Vec3::new(0.0, 0.0, -1.0) };

    let near = (Affine3A::from_translation(Vec3::new(0.0, 0.0, 2.0)), Vec3::splat(-1.0), Vec3::splat(1.0));
    let far = (Affine3A::from_translation(Vec3::new(0.0, 0.0, -5.0)), Vec3::splat(-1.0), Vec3::splat(1.0));
    let off_axis = (Affine3A::from_translation(Vec3::new(20.0, 0.0, 0.0)), Vec3::splat(-1.0), Vec3::splat(1.0));

    let candidates = [near, far, off_axis];
    let mut best: Option<(usize, f32)> = None;
    for (index, (transform, min, max)) in candidates.iter().enumerate() {
        let (world_min, world_max) = world_aabb(*transform, *min, *max);
        if let Some(t) = ray.intersect_aabb(world_min, world_max) {
            if best.is_none_or(|(_, best_t)| t < best_t) {
                best = Some((index, t));
            }
        }
    }

    assert_eq!(best.map(|(index, _)| index), Some(0));
}

#[test]
fn material_with_no_textures_reports_none_index_everywhere() {
    let material = Material::new();
    let data = material.gpu_data(|_| panic!("texture_slot must not be called with no bound textures"));
    assert_eq!(data.albedo_texture, NONE_INDEX);
    assert_eq!(data.metallic_roughness_texture, NONE_INDEX);
    assert_eq!(data.normal_texture, NONE_INDEX);
    assert_eq!(data.emissive_texture, NONE_INDEX);
}
