//! Frustum-plane extraction and viewport-ray math shared by [`crate::camera::Camera`].

use glam::{Mat4, Vec3, Vec4};

/// Six view-frustum planes in world space, each stored as `(normal, d)`
/// packed into a `Vec4` such that a point `p` is on the inside
/// half-space iff `dot(normal, p) + d >= 0`.
///
/// Order: left, right, bottom, top, near, far — matching
/// `{m3+m0, m3-m0, m3+m1, m3-m1, m3+m2, m3-m2}` from the core spec.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract planes from a view and projection matrix.
    ///
    /// glam's `Mat4` multiplies column vectors (`clip = M * world`), so
    /// the rows of `M = projection * view` are exactly the spec's `m0..m3`
    /// — no separate transpose step is needed to reach that row form.
    /// Each plane is then normalized by its `xyz` length unless that
    /// length falls below `1e-6`, in which case the plane is zeroed so
    /// it never rejects anything (a degenerate projection must not cull
    /// everything).
    #[must_use]
    pub fn from_view_projection(view: Mat4, projection: Mat4) -> Self {
        let vp = projection * view;
        let m0 = vp.row(0);
        let m1 = vp.row(1);
        let m2 = vp.row(2);
        let m3 = vp.row(3);

        let mut planes = [m3 + m0, m3 - m0, m3 + m1, m3 - m1, m3 + m2, m3 - m2];
        for plane in &mut planes {
            let len = plane.truncate().length();
            *plane = if len > 1e-6 { *plane / len } else { Vec4::ZERO };
        }
        Self { planes }
    }

    /// True if the sphere `(center, radius)` is not entirely outside any
    /// plane's half-space.
    #[must_use]
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes.iter().all(|p| p.truncate().dot(center) + p.w >= -radius)
    }

    /// True if the AABB `[min, max]` is not entirely outside any plane's
    /// half-space (positive-vertex test).
    #[must_use]
    pub fn intersects_box(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|p| {
            let positive = Vec3::new(
                if p.x >= 0.0 { max.x } else { min.x },
                if p.y >= 0.0 { max.y } else { min.y },
                if p.z >= 0.0 { max.z } else { min.z },
            );
            p.truncate().dot(positive) + p.w >= 0.0
        })
    }
}

/// A world-space ray: `origin + t * direction`, `direction` normalized.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Slab-method ray/AABB intersection; returns the near `t` on hit.
    #[must_use]
    pub fn intersect_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let inv_dir = Vec3::new(
            1.0 / self.direction.x,
            1.0 / self.direction.y,
            1.0 / self.direction.z,
        );
        let t0 = (min - self.origin) * inv_dir;
        let t1 = (max - self.origin) * inv_dir;
        let tmin = t0.min(t1);
        let tmax = t0.max(t1);
        let t_enter = tmin.x.max(tmin.y).max(tmin.z);
        let t_exit = tmax.x.min(tmax.y).min(tmax.z);
        if t_exit >= t_enter.max(0.0) { Some(t_enter.max(0.0)) } else { None }
    }
}

/// Convert a top-left pixel coordinate `(mx, my)` against a `(width,
/// height)` viewport into a world-space ray from the camera's position,
/// by un-projecting through `inverse(projection)` then `inverse(view)`.
#[must_use]
pub fn viewport_to_world_ray(
    mx: f32,
    my: f32,
    width: f32,
    height: f32,
    view: Mat4,
    projection: Mat4,
) -> Ray {
    let ndc_x = (2.0 * mx) / width - 1.0;
    let ndc_y = 1.0 - (2.0 * my) / height;

    let inv_projection = projection.inverse();
    let inv_view = view.inverse();

    let near_clip = Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
    let far_clip = Vec4::new(ndc_x, ndc_y, 1.0, 1.0);

    let near_view = inv_projection * near_clip;
    let far_view = inv_projection * far_clip;
    let near_world = inv_view * (near_view / near_view.w);
    let far_world = inv_view * (far_view / far_view.w);

    // The camera's world position is the translation column of the
    // inverse view matrix; using it (rather than the near-plane hit) as
    // the ray origin keeps the ray's `t=0` at the camera, as the spec
    // requires ("a ray from camera position").
    let origin = inv_view.w_axis.truncate();
    let direction = (far_world.truncate() - near_world.truncate()).normalize();
    Ray { origin, direction }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn degenerate_plane_never_rejects() {
        // A zero-length normal must become Vec4::ZERO, which always
        // satisfies `dot(n, p) + d >= -radius` for any finite p/radius.
        let zeroed = Vec4::ZERO;
        assert!(zeroed.truncate().dot(Vec3::new(1e6, -1e6, 1e6)) + zeroed.w >= 0.0);
    }

    #[test]
    fn viewport_to_world_ray_round_trips_through_projection() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let projection = Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 100.0);
        let ray = viewport_to_world_ray(400.0, 300.0, 800.0, 600.0, view, projection);

        let point_on_ray = ray.origin + ray.direction * 3.0;
        let clip = projection * view * point_on_ray.extend(1.0);
        let ndc = clip.truncate() / clip.w;

        assert!((ndc.x).abs() < 1e-4, "ndc.x = {}", ndc.x);
        assert!((ndc.y).abs() < 1e-4, "ndc.y = {}", ndc.y);
    }

    #[test]
    fn ray_hits_centered_aabb() {
        let ray = Ray { origin: Vec3::new(0.0, 0.0, 5.0), direction: Vec3::new(0.0, 0.0, -1.0) };
        let hit = ray.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(hit, Some(4.0));
    }

    #[test]
    fn ray_misses_offset_aabb() {
        let ray = Ray { origin: Vec3::new(10.0, 0.0, 5.0), direction: Vec3::new(0.0, 0.0, -1.0) };
        assert!(ray.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)).is_none());
    }
}
