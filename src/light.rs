//! Tagged light variants. A shadow-casting light owns exactly one
//! shadow camera, discriminated by its own type tag: a `Camera` for
//! DIRECTIONAL/SPOT, a `SphericalCamera` for POINT.

use glam::{Affine3A, Vec3};

use crate::camera::{Camera, Passes};
use crate::handle::Handle;
use crate::records::{LightData, LIGHT_TYPE_DIRECTIONAL, LIGHT_TYPE_POINT, LIGHT_TYPE_SPOT, NONE_INDEX};
use crate::spherical_camera::SphericalCamera;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Point,
    Directional,
    Spot,
}

impl LightType {
    #[must_use]
    pub fn wire_tag(self) -> u32 {
        match self {
            LightType::Point => LIGHT_TYPE_POINT,
            LightType::Directional => LIGHT_TYPE_DIRECTIONAL,
            LightType::Spot => LIGHT_TYPE_SPOT,
        }
    }
}

/// The shadow camera a light owns, discriminated by the light's own
/// type tag rather than stored as a separate enum discriminant — see
/// the core spec's design note on tagged variants over inheritance.
pub enum ShadowCamera {
    None,
    Spherical(Handle),
    Perspective(Handle),
}

pub struct Light {
    pub kind: LightType,
    pub node_index: u32,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub inner_cone: f32,
    pub outer_cone: f32,
    pub cast_shadow: bool,
    pub shadow_camera: ShadowCamera,
}

impl Light {
    #[must_use]
    pub fn new_point(node_index: u32, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            kind: LightType::Point,
            node_index,
            color,
            intensity,
            radius,
            inner_cone: 0.0,
            outer_cone: 0.0,
            cast_shadow: false,
            shadow_camera: ShadowCamera::None,
        }
    }

    #[must_use]
    pub fn new_directional(node_index: u32, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightType::Directional,
            node_index,
            color,
            intensity,
            radius: f32::INFINITY,
            inner_cone: 0.0,
            outer_cone: 0.0,
            cast_shadow: false,
            shadow_camera: ShadowCamera::None,
        }
    }

    #[must_use]
    pub fn new_spot(node_index: u32, color: Vec3, intensity: f32, radius: f32, inner_cone: f32, outer_cone: f32) -> Self {
        Self {
            kind: LightType::Spot,
            node_index,
            color,
            intensity,
            radius,
            inner_cone,
            outer_cone,
            cast_shadow: false,
            shadow_camera: ShadowCamera::None,
        }
    }

    /// Shadow-camera parameters implied by this light's type, per the
    /// core spec's §4.6 table: FOV, near/far and the pass set a
    /// DIRECTIONAL/SPOT shadow camera is created with.
    #[must_use]
    pub fn perspective_shadow_params(&self) -> Option<(f32, f32, f32, Passes)> {
        match self.kind {
            LightType::Point => None,
            LightType::Spot => {
                Some((self.outer_cone * 2.0, self.radius * 0.01, self.radius, Passes::SHADOW))
            }
            LightType::Directional => Some((90f32.to_radians(), self.radius * 0.01, self.radius, Passes::SHADOW)),
        }
    }

    /// Recompute the owned shadow camera's transform from this frame's
    /// world matrix, per the core spec's §4.6 per-frame update: `camera_look_at`
    /// for DIRECTIONAL/SPOT, `center` for POINT.
    pub fn update_shadow_transform(
        &mut self,
        world_transform: Affine3A,
        cameras: &mut crate::handle::Pool<Camera>,
        spherical_cameras: &mut crate::handle::Pool<SphericalCamera>,
    ) {
        let position = world_transform.translation.into();
        match (&self.shadow_camera, self.kind) {
            (ShadowCamera::Spherical(handle), LightType::Point) => {
                if let Some(cam) = spherical_cameras.get_mut(*handle) {
                    cam.center = position;
                    cam.radius = self.radius;
                }
            }
            (ShadowCamera::Perspective(handle), LightType::Directional | LightType::Spot) => {
                if let Some(cam) = cameras.get_mut(*handle) {
                    let forward = world_transform.matrix3 * Vec3::NEG_Z;
                    let look_at = camera_look_at(position, position + forward, Vec3::Y);
                    cam.update_view(look_at);
                }
            }
            _ => {}
        }
    }

    /// Build this frame's `LightData` record. `shadow_map` must be the
    /// current frame's cube-depth (POINT) or 2D-depth (DIRECTIONAL/SPOT)
    /// image index, or `NONE_INDEX` when not shadow-casting.
    #[must_use]
    pub fn gpu_data(&self, shadow_map: u32, shadow_camera_slot: u32) -> LightData {
        LightData {
            color: self.color.extend(self.intensity),
            radius: self.radius,
            inner_cone: self.inner_cone,
            outer_cone: self.outer_cone,
            light_type: self.kind.wire_tag(),
            node_index: self.node_index,
            shadow_map: if self.cast_shadow { shadow_map } else { NONE_INDEX },
            shadow_camera: if self.cast_shadow { shadow_camera_slot } else { NONE_INDEX },
            cast_shadow: u32::from(self.cast_shadow),
        }
    }
}

/// Build a right-handed look-at transform as an `Affine3A`, matching the
/// convention `Camera::update_view` expects (world transform, not view
/// matrix — it inverts internally).
#[must_use]
pub fn camera_look_at(eye: Vec3, target: Vec3, up: Vec3) -> Affine3A {
    let forward = (target - eye).normalize_or_zero();
    let forward = if forward == Vec3::ZERO { Vec3::NEG_Z } else { forward };
    let right = forward.cross(up).normalize_or_zero();
    let right = if right == Vec3::ZERO { Vec3::X } else { right };
    let true_up = right.cross(forward);
    // Camera looks down -Z in view space, so the world-space "forward"
    // basis vector is -forward.
    let rotation = glam::Mat3::from_cols(right, true_up, -forward);
    Affine3A::from_mat3_translation(rotation, eye)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_light_has_no_perspective_shadow_params() {
        let light = Light::new_point(0, Vec3::ONE, 1.0, 5.0);
        assert!(light.perspective_shadow_params().is_none());
    }

    #[test]
    fn spot_light_fov_is_twice_outer_cone() {
        let light = Light::new_spot(0, Vec3::ONE, 1.0, 10.0, 0.2, 0.5);
        let (fov, near, far, passes) = light.perspective_shadow_params().unwrap();
        assert!((fov - 1.0).abs() < 1e-6);
        assert!((near - 0.1).abs() < 1e-6);
        assert!((far - 10.0).abs() < 1e-6);
        assert_eq!(passes, Passes::SHADOW);
    }

    #[test]
    fn gpu_data_hides_shadow_map_when_not_casting() {
        let light = Light::new_point(3, Vec3::ONE, 2.0, 5.0);
        let data = light.gpu_data(7, 2);
        assert_eq!(data.shadow_map, NONE_INDEX);
        assert_eq!(data.shadow_camera, NONE_INDEX);
        assert_eq!(data.cast_shadow, 0);
        assert_eq!(data.node_index, 3);
    }

    #[test]
    fn gpu_data_exposes_shadow_map_when_casting() {
        let mut light = Light::new_point(3, Vec3::ONE, 2.0, 5.0);
        light.cast_shadow = true;
        let data = light.gpu_data(7, 2);
        assert_eq!(data.shadow_map, 7);
        assert_eq!(data.shadow_camera, 2);
        assert_eq!(data.cast_shadow, 1);
    }

    #[test]
    fn look_at_points_forward_axis_at_target() {
        let transform = camera_look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -5.0), Vec3::Y);
        let forward = transform.matrix3 * Vec3::NEG_Z;
        assert!(forward.dot(Vec3::NEG_Z) > 0.99);
    }
}
