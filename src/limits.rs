//! Fixed capacities from the core spec's external-interfaces section.
//! These are build constants, not runtime configuration — see
//! `ManagerConfig` in [`crate::manager`] for the small set of values a
//! caller can still override (attachment/pass selection, slab class
//! tables), bounded by these ceilings.

pub const MAX_MESHES: u32 = 65_536;
pub const MAX_MATERIALS: u32 = 4_096;
pub const MAX_TEXTURES: u32 = 1_000;
pub const MAX_CUBE_TEXTURES: u32 = 200;
pub const MAX_NODES_IN_SCENE: u32 = 65_536;
pub const MAX_ACTIVE_CAMERAS: u32 = 128;
pub const MAX_LIGHTS: u32 = 256;
pub const MAX_EMITTERS: u32 = 64;
pub const MAX_FORCE_FIELDS: u32 = 32;
pub const MAX_SPRITES: u32 = 4_096;
pub const SHADOW_MAP_SIZE: u32 = 512;

/// Frames in flight (`F` in the core spec).
pub const FRAMES_IN_FLIGHT: usize = 2;

/// Size classes `(block_size, block_count)` for the vertex/index/skinning
/// slab allocators. Per the core spec's Open Question #2, either of the
/// source's two near-duplicate tables is acceptable as long as the total
/// matches the backing buffer's capacity; this crate uses 8 power-of-two
/// classes that each contribute an equal share of the 2,097,152-element
/// total, which keeps the table trivial to audit and to resize.
pub const VERTEX_SLAB_CLASSES: [(u32, u32); 8] = [
    (1, 262_144),
    (2, 131_072),
    (4, 65_536),
    (8, 32_768),
    (16, 16_384),
    (32, 8_192),
    (64, 4_096),
    (128, 2_048),
];

/// Index-buffer slab classes; same element total as
/// [`VERTEX_SLAB_CLASSES`] but indices are individually addressed more
/// often in small runs, so the smallest class carries more blocks.
pub const INDEX_SLAB_CLASSES: [(u32, u32); 8] = [
    (1, 524_288),
    (2, 262_144),
    (4, 131_072),
    (8, 65_536),
    (16, 32_768),
    (32, 16_384),
    (64, 8_192),
    (128, 4_096),
];

/// Skinning-buffer slab classes (bone-weight/index pairs per vertex),
/// a quarter the element count of [`VERTEX_SLAB_CLASSES`] since not
/// every mesh is skinned.
pub const SKINNING_SLAB_CLASSES: [(u32, u32); 6] = [
    (1, 65_536),
    (4, 32_768),
    (16, 16_384),
    (64, 8_192),
    (256, 2_048),
    (1024, 512),
];

/// Bone-matrix slab classes, sized for per-skeleton contiguous runs.
pub const BONE_SLAB_CLASSES: [(u32, u32); 4] = [(64, 512), (128, 256), (256, 128), (512, 32)];
