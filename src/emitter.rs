//! Particle emitter resource: explicit create/destroy, no ref counting
//! (core spec §4.8).

use glam::Vec4;

use crate::handle::Handle;
use crate::records::EmitterData;

pub struct Emitter {
    pub node_index: u32,
    pub texture: Option<Handle>,
    pub rate: f32,
    pub lifetime: f32,
    pub start_size: f32,
    pub end_size: f32,
    pub start_color: Vec4,
    pub end_color: Vec4,
    pub speed: f32,
    pub spread: f32,
}

impl Emitter {
    #[must_use]
    pub fn new(node_index: u32) -> Self {
        Self {
            node_index,
            texture: None,
            rate: 10.0,
            lifetime: 1.0,
            start_size: 1.0,
            end_size: 0.0,
            start_color: Vec4::ONE,
            end_color: Vec4::ZERO,
            speed: 1.0,
            spread: 0.0,
        }
    }

    #[must_use]
    pub fn gpu_data(&self, texture_slot: impl Fn(Handle) -> u32) -> EmitterData {
        EmitterData {
            node_index: self.node_index,
            texture: self.texture.map_or(crate::records::NONE_INDEX, texture_slot),
            rate: self.rate,
            lifetime: self.lifetime,
            start_size: self.start_size,
            end_size: self.end_size,
            start_color: self.start_color,
            end_color: self.end_color,
            speed: self.speed,
            spread: self.spread,
            _pad: [0.0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_data_carries_lifetime_and_rate() {
        let mut emitter = Emitter::new(1);
        emitter.rate = 25.0;
        emitter.lifetime = 2.5;
        let data = emitter.gpu_data(|_| 0);
        assert_eq!(data.rate, 25.0);
        assert_eq!(data.lifetime, 2.5);
        assert_eq!(data.texture, crate::records::NONE_INDEX);
    }
}
