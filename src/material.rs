//! Material resource: scalar factors, a feature bitset, and up to 5
//! non-owning handles into the 2D-texture pool.

use glam::Vec3;

use crate::handle::Handle;
use crate::purge::RefCounted;
use crate::records::{MaterialData, MaterialFeatures};

/// Up to 5 texture slots a material may reference. Handles are
/// non-owning: the texture pool is the single source of truth for
/// texture lifetime, and a material only ever unrefs what it points at.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialTextures {
    pub albedo: Option<Handle>,
    pub metallic_roughness: Option<Handle>,
    pub normal: Option<Handle>,
    pub emissive: Option<Handle>,
    /// A fifth slot the core spec reserves ("up to 5 textures") without
    /// naming it; kept generic for ambient-occlusion or a project's own
    /// extra channel.
    pub extra: Option<Handle>,
}

impl MaterialTextures {
    pub fn iter(&self) -> impl Iterator<Item = Handle> + '_ {
        [self.albedo, self.metallic_roughness, self.normal, self.emissive, self.extra].into_iter().flatten()
    }
}

pub struct Material {
    pub base_color_factor: Vec3,
    pub alpha: f32,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: Vec3,
    pub textures: MaterialTextures,
    pub ref_count: u32,
    pub auto_purge: bool,
}

impl Material {
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_color_factor: Vec3::ONE,
            alpha: 1.0,
            metallic_factor: 1.0,
            roughness_factor: 1.0,
            emissive_factor: Vec3::ZERO,
            textures: MaterialTextures::default(),
            ref_count: 0,
            auto_purge: true,
        }
    }

    /// Build this material's `MaterialData` record. Texture handles are
    /// translated to bindless slot indices by the caller (the manager),
    /// which is the only component that can resolve a `Handle` against
    /// the texture pool.
    #[must_use]
    pub fn gpu_data(&self, texture_slot: impl Fn(Handle) -> u32) -> MaterialData {
        let mut features = MaterialFeatures::empty();
        let albedo_texture = self.textures.albedo.map_or(crate::records::NONE_INDEX, |h| {
            features |= MaterialFeatures::USE_ALBEDO_MAP;
            texture_slot(h)
        });
        let metallic_roughness_texture = self.textures.metallic_roughness.map_or(crate::records::NONE_INDEX, |h| {
            features |= MaterialFeatures::USE_METALLIC_ROUGHNESS_MAP;
            texture_slot(h)
        });
        let normal_texture = self.textures.normal.map_or(crate::records::NONE_INDEX, |h| {
            features |= MaterialFeatures::USE_NORMAL_MAP;
            texture_slot(h)
        });
        let emissive_texture = self.textures.emissive.map_or(crate::records::NONE_INDEX, |h| {
            features |= MaterialFeatures::USE_EMISSIVE_MAP;
            texture_slot(h)
        });

        MaterialData {
            base_color_factor: self.base_color_factor.extend(self.alpha),
            emissive_factor: self.emissive_factor.extend(0.0),
            albedo_texture,
            metallic_roughness_texture,
            normal_texture,
            emissive_texture,
            metallic_factor: self.metallic_factor,
            roughness_factor: self.roughness_factor,
            features: features.bits(),
            _pad: 0,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCounted for Material {
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
    use crate::handle::Pool;

    #[test]
    fn gpu_data_sets_feature_bit_only_for_bound_textures() {
        let mut textures: Pool<()> = Pool::new();
        let albedo = textures.alloc(()).unwrap();

        let mut material = Material::new();
        material.textures.albedo = Some(albedo);

        let data = material.gpu_data(|h| if h == albedo { 3 } else { crate::records::NONE_INDEX });
        assert_eq!(data.albedo_texture, 3);
        assert!(MaterialFeatures::from_bits_truncate(data.features).contains(MaterialFeatures::USE_ALBEDO_MAP));
        assert!(!MaterialFeatures::from_bits_truncate(data.features).contains(MaterialFeatures::USE_NORMAL_MAP));
        assert_eq!(data.normal_texture, crate::records::NONE_INDEX);
    }

    #[test]
    fn textures_iter_skips_unset_slots() {
        let mut textures: Pool<()> = Pool::new();
        let h0 = textures.alloc(()).unwrap();
        let h1 = textures.alloc(()).unwrap();

        let mut mat_textures = MaterialTextures::default();
        mat_textures.albedo = Some(h0);
        mat_textures.normal = Some(h1);

        let collected: Vec<_> = mat_textures.iter().collect();
        assert_eq!(collected, vec![h0, h1]);
    }
}
