//! Billboard sprite resource. Unlike meshes/materials/textures, sprites
//! are explicit create/destroy only — no ref counting, no auto-purge
//! (core spec §4.8: particle/sprite resources are owned outright by the
//! node that created them).

use glam::Vec4;

use crate::handle::Handle;
use crate::records::SpriteData;

/// A sprite's frame-strip animation state: which horizontal strip of
/// `uv_rect` is sampled this frame. Present only while the sprite is
/// animating — clearing it (`Sprite::clear_animation`) is what
/// unregisters the sprite from the Manager's animation tick list
/// (core spec §3).
#[derive(Debug, Clone, Copy)]
pub struct SpriteAnimation {
    pub frame_count: u32,
    pub frames_per_second: f32,
    pub looping: bool,
    elapsed: f32,
}

impl SpriteAnimation {
    #[must_use]
    pub fn new(frame_count: u32, frames_per_second: f32, looping: bool) -> Self {
        Self { frame_count, frames_per_second, looping, elapsed: 0.0 }
    }

    pub fn advance(&mut self, dt: f32) {
        self.elapsed += dt;
    }

    #[must_use]
    pub fn current_frame(&self) -> u32 {
        if self.frame_count == 0 {
            return 0;
        }
        let raw = (self.elapsed * self.frames_per_second) as u32;
        if self.looping { raw % self.frame_count } else { raw.min(self.frame_count - 1) }
    }
}

pub struct Sprite {
    pub node_index: u32,
    pub texture: Option<Handle>,
    pub size: [f32; 2],
    pub uv_rect: Vec4,
    pub tint: Vec4,
    pub animation: Option<SpriteAnimation>,
}

impl Sprite {
    #[must_use]
    pub fn new(node_index: u32) -> Self {
        Self {
            node_index,
            texture: None,
            size: [1.0, 1.0],
            uv_rect: Vec4::new(0.0, 0.0, 1.0, 1.0),
            tint: Vec4::ONE,
            animation: None,
        }
    }

    pub fn set_animation(&mut self, animation: SpriteAnimation) {
        self.animation = Some(animation);
    }

    /// Stop animating this sprite. Returns `true` if it had animation
    /// state (the caller's cue to unregister it from the tick list).
    pub fn clear_animation(&mut self) -> bool {
        self.animation.take().is_some()
    }

    #[must_use]
    pub fn gpu_data(&self, texture_slot: impl Fn(Handle) -> u32) -> SpriteData {
        let uv_rect = match &self.animation {
            Some(animation) if animation.frame_count > 0 => {
                let frame_width = 1.0 / animation.frame_count as f32;
                Vec4::new(animation.current_frame() as f32 * frame_width, self.uv_rect.y, frame_width, self.uv_rect.w)
            }
            _ => self.uv_rect,
        };
        SpriteData {
            node_index: self.node_index,
            texture: self.texture.map_or(crate::records::NONE_INDEX, texture_slot),
            size: self.size,
            uv_rect,
            tint: self.tint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_data_uses_none_index_without_a_texture() {
        let sprite = Sprite::new(4);
        let data = sprite.gpu_data(|_| 0);
        assert_eq!(data.texture, crate::records::NONE_INDEX);
        assert_eq!(data.node_index, 4);
    }

    #[test]
    fn clear_animation_reports_whether_it_was_set() {
        let mut sprite = Sprite::new(0);
        assert!(!sprite.clear_animation());
        sprite.set_animation(SpriteAnimation::new(4, 8.0, true));
        assert!(sprite.clear_animation());
        assert!(sprite.animation.is_none());
    }

    #[test]
    fn animation_advances_uv_rect_into_the_current_frame_strip() {
        let mut sprite = Sprite::new(0);
        sprite.set_animation(SpriteAnimation::new(4, 10.0, true));
        let before = sprite.gpu_data(|_| 0).uv_rect;
        sprite.animation.as_mut().unwrap().advance(0.15); // 1.5 frames in at 10 fps
        let after = sprite.gpu_data(|_| 0).uv_rect;
        assert_ne!(before.x, after.x);
        assert!((after.z - 0.25).abs() < 1e-6);
    }

    #[test]
    fn non_looping_animation_clamps_to_the_last_frame() {
        let mut animation = SpriteAnimation::new(4, 10.0, false);
        animation.advance(10.0); // far past the end
        assert_eq!(animation.current_frame(), 3);
    }
}
