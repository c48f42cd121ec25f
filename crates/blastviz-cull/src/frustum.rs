//! Six-plane view frustum extracted from a view-projection matrix.

use glam::{Mat4, Vec3, Vec4};

use crate::bounds::{Aabb, Bounds, Sphere};

/// Plane indices into the frustum planes array.
const LEFT: usize = 0;
const RIGHT: usize = 1;
const BOTTOM: usize = 2;
const TOP: usize = 3;
const NEAR: usize = 4;
const FAR: usize = 5;

/// A view frustum defined by six inward-pointing planes.
#[derive(Clone, Debug, PartialEq)]
pub struct Frustum {
    /// Six planes: left, right, bottom, top, near, far.
    /// Each `Vec4(a, b, c, d)` where `(a,b,c)` is the normalized inward
    /// normal and `d` is the signed distance term.
    planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a combined view-projection matrix
    /// using the Griggs-Hartmann method.
    ///
    /// Expects glam's clip-space convention with depth in `0..=1`
    /// (`perspective_rh`, `orthographic_rh`).
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let rows = [vp.row(0), vp.row(1), vp.row(2), vp.row(3)];

        let mut planes = [Vec4::ZERO; 6];
        planes[LEFT] = rows[3] + rows[0];
        planes[RIGHT] = rows[3] - rows[0];
        planes[BOTTOM] = rows[3] + rows[1];
        planes[TOP] = rows[3] - rows[1];
        // 0..1 depth: near is z >= 0, far is z <= w.
        planes[NEAR] = rows[2];
        planes[FAR] = rows[3] - rows[2];

        // Normalize each plane so that (a,b,c) is a unit vector.
        for plane in &mut planes {
            let len = plane.truncate().length();
            if len > 0.0 {
                *plane /= len;
            }
        }

        Self { planes }
    }

    /// The six planes in left, right, bottom, top, near, far order.
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Whether a sphere is at least partially inside the frustum.
    pub fn test_sphere(&self, center: Vec3, radius: f32) -> bool {
        let radius = radius.max(0.0);
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }

    /// Whether the box `min..max` is at least partially inside the frustum.
    ///
    /// Uses the p-vertex (positive vertex) method: for each plane, find
    /// the corner of the box furthest along the plane normal. If that
    /// corner is behind the plane, the entire box is outside.
    ///
    /// Conservative: boxes near frustum corners may test visible while
    /// fully outside, but a visible box never tests invisible.
    pub fn test_box(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes {
            let normal = plane.truncate();
            let p = Vec3::select(normal.cmpge(Vec3::ZERO), max, min);
            if normal.dot(p) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }

    /// Whether `bounds` is at least partially inside the frustum.
    pub fn test(&self, bounds: &Bounds) -> bool {
        match bounds {
            Bounds::Sphere(Sphere { center, radius }) => self.test_sphere(*center, *radius),
            Bounds::Box(Aabb { min, max }) => self.test_box(*min, *max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_camera_vp() -> Mat4 {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 1000.0);
        proj * view
    }

    #[test]
    fn test_object_in_front_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(frustum.test_box(Vec3::new(-1.0, -1.0, -5.0), Vec3::new(1.0, 1.0, -3.0)));
        assert!(frustum.test_sphere(Vec3::new(0.0, 0.0, -10.0), 1.0));
    }

    #[test]
    fn test_object_behind_camera_not_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(!frustum.test_box(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 10.0)));
        assert!(!frustum.test_sphere(Vec3::new(0.0, 0.0, 10.0), 1.0));
    }

    #[test]
    fn test_object_partially_in_frustum_is_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        assert!(frustum.test_box(Vec3::new(-100.0, -1.0, -10.0), Vec3::new(1.0, 1.0, -5.0)));
        // Sphere straddling the near plane.
        assert!(frustum.test_sphere(Vec3::new(0.0, 0.0, 0.5), 1.0));
    }

    #[test]
    fn test_all_six_planes_tested() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        let outside = [
            (Vec3::splat(10.0), Vec3::splat(20.0)),
            (Vec3::new(-1000.0, 0.0, -5.0), Vec3::new(-999.0, 1.0, -4.0)),
            (Vec3::new(999.0, 0.0, -5.0), Vec3::new(1000.0, 1.0, -4.0)),
            (Vec3::new(0.0, 999.0, -5.0), Vec3::new(1.0, 1000.0, -4.0)),
            (Vec3::new(0.0, -1000.0, -5.0), Vec3::new(1.0, -999.0, -4.0)),
            (Vec3::new(0.0, 0.0, -2000.0), Vec3::new(1.0, 1.0, -1500.0)),
        ];
        for (min, max) in outside {
            assert!(!frustum.test_box(min, max), "{min} .. {max}");
            let sphere = Sphere::new((min + max) * 0.5, 0.5);
            assert!(!frustum.test(&Bounds::Sphere(sphere)), "{sphere:?}");
        }
    }

    #[test]
    fn test_sphere_touching_side_plane_is_visible() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        // At depth 10 the half-width is about 7.36; a sphere just beyond it
        // still reaches inside.
        assert!(frustum.test_sphere(Vec3::new(8.0, 0.0, -10.0), 1.5));
        assert!(!frustum.test_sphere(Vec3::new(20.0, 0.0, -10.0), 1.5));
    }

    #[test]
    fn test_orthographic_projection() {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::orthographic_rh(-50.0, 50.0, -50.0, 50.0, 0.1, 500.0);
        let frustum = Frustum::from_view_projection(&(proj * view));
        assert!(frustum.test_sphere(Vec3::new(45.0, -45.0, -100.0), 1.0));
        assert!(!frustum.test_sphere(Vec3::new(60.0, 0.0, -100.0), 1.0));
        assert!(!frustum.test_box(Vec3::new(0.0, 0.0, -700.0), Vec3::new(1.0, 1.0, -600.0)));
    }

    #[test]
    fn test_planes_are_normalized() {
        let frustum = Frustum::from_view_projection(&default_camera_vp());
        for plane in frustum.planes() {
            let normal_len = plane.truncate().length();
            assert!(
                (normal_len - 1.0).abs() < 1e-4,
                "plane normal not normalized: {normal_len}"
            );
        }
    }
}
