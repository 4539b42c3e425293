//! Particle force-field resource: explicit create/destroy, no ref
//! counting (core spec §4.8).

use crate::records::{ForceFieldData, FORCE_FIELD_GRAVITY, FORCE_FIELD_VORTEX, FORCE_FIELD_WIND};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceFieldType {
    Gravity,
    Wind,
    Vortex,
}

impl ForceFieldType {
    #[must_use]
    pub fn wire_tag(self) -> u32 {
        match self {
            ForceFieldType::Gravity => FORCE_FIELD_GRAVITY,
            ForceFieldType::Wind => FORCE_FIELD_WIND,
            ForceFieldType::Vortex => FORCE_FIELD_VORTEX,
        }
    }
}

pub struct ForceField {
    pub node_index: u32,
    pub kind: ForceFieldType,
    pub strength: f32,
    pub radius: f32,
}

impl ForceField {
    #[must_use]
    pub fn new(node_index: u32, kind: ForceFieldType, strength: f32, radius: f32) -> Self {
        Self { node_index, kind, strength, radius }
    }

    #[must_use]
    pub fn gpu_data(&self) -> ForceFieldData {
        ForceFieldData {
            node_index: self.node_index,
            field_type: self.kind.wire_tag(),
            strength: self.strength,
            radius: self.radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_data_maps_kind_to_wire_tag() {
        let field = ForceField::new(2, ForceFieldType::Vortex, 3.0, 10.0);
        assert_eq!(field.gpu_data().field_type, FORCE_FIELD_VORTEX);
    }
}
