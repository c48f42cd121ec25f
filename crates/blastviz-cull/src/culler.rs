//! Per-frame visibility flags from cached bounds.

use std::hash::Hash;

use glam::Mat4;
use rustc_hash::FxHashMap;

use crate::bounds::{Bounds, BoundsCache};
use crate::frustum::Frustum;

/// Counts from one [`FrustumCuller::apply`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CullStats {
    /// Objects tested.
    pub tested: usize,
    /// Objects inside or straddling the frustum.
    pub visible: usize,
    /// Objects entirely outside.
    pub culled: usize,
    /// Objects whose flag differs from the previous pass.
    pub changed: usize,
}

/// Holds the current frustum, the bounds cache and one visibility flag per id.
///
/// Until the first [`update_frustum`](Self::update_frustum) every object is
/// visible.
#[derive(Debug)]
pub struct FrustumCuller<K> {
    frustum: Option<Frustum>,
    bounds: BoundsCache<K>,
    visible: FxHashMap<K, bool>,
}

impl<K> Default for FrustumCuller<K> {
    fn default() -> Self {
        Self {
            frustum: None,
            bounds: BoundsCache::default(),
            visible: FxHashMap::default(),
        }
    }
}

impl<K: Clone + Eq + Hash> FrustumCuller<K> {
    /// Create a culler with no frustum and no bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the frustum from the camera's view-projection matrix.
    pub fn update_frustum(&mut self, view_projection: &Mat4) {
        self.frustum = Some(Frustum::from_view_projection(view_projection));
    }

    /// Current frustum, if one was set.
    pub fn frustum(&self) -> Option<&Frustum> {
        self.frustum.as_ref()
    }

    /// Register or replace the bounds of `id`.
    pub fn set_bounds(&mut self, id: K, bounds: impl Into<Bounds>) {
        self.bounds.insert(id, bounds);
    }

    /// Drop the cached bounds of `id` after its geometry changed.
    ///
    /// The last visibility flag is kept until new bounds are set and the
    /// next `apply` runs.
    pub fn invalidate(&mut self, id: &K) -> bool {
        self.bounds.invalidate(id)
    }

    /// Forget `id` entirely.
    pub fn remove(&mut self, id: &K) {
        self.bounds.invalidate(id);
        self.visible.remove(id);
    }

    /// The bounds cache.
    pub fn bounds(&self) -> &BoundsCache<K> {
        &self.bounds
    }

    /// Test every cached volume against the current frustum and store the flags.
    pub fn apply(&mut self) -> CullStats {
        let mut stats = CullStats::default();
        for (id, bounds) in self.bounds.iter() {
            let inside = self.frustum.as_ref().is_none_or(|frustum| frustum.test(bounds));
            stats.tested += 1;
            if inside {
                stats.visible += 1;
            } else {
                stats.culled += 1;
            }
            match self.visible.get_mut(id) {
                Some(flag) => {
                    if *flag != inside {
                        *flag = inside;
                        stats.changed += 1;
                    }
                }
                None => {
                    self.visible.insert(id.clone(), inside);
                    stats.changed += usize::from(!inside);
                }
            }
        }
        tracing::trace!(
            "frustum cull: {} tested, {} visible, {} culled",
            stats.tested,
            stats.visible,
            stats.culled
        );
        stats
    }

    /// Visibility flag of `id` from the last `apply`, or `None` if never tested.
    pub fn is_visible(&self, id: &K) -> Option<bool> {
        self.visible.get(id).copied()
    }

    /// Ids flagged invisible by the last `apply`.
    pub fn culled_ids(&self) -> impl Iterator<Item = &K> {
        self.visible
            .iter()
            .filter_map(|(id, &visible)| (!visible).then_some(id))
    }

    /// Forget all bounds and flags; the frustum is kept.
    pub fn clear(&mut self) {
        self.bounds.clear();
        self.visible.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{Aabb, Sphere};
    use glam::Vec3;

    fn camera_vp() -> Mat4 {
        let view = Mat4::look_to_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 1000.0);
        proj * view
    }

    #[test]
    fn test_everything_visible_without_frustum() {
        let mut culler = FrustumCuller::new();
        culler.set_bounds(1u32, Sphere::new(Vec3::new(0.0, 0.0, 50.0), 1.0));
        let stats = culler.apply();
        assert_eq!(stats.visible, 1);
        assert_eq!(culler.is_visible(&1), Some(true));
    }

    #[test]
    fn test_apply_sets_flags() {
        let mut culler = FrustumCuller::new();
        culler.update_frustum(&camera_vp());
        culler.set_bounds("front", Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0));
        culler.set_bounds("behind", Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0));
        culler.set_bounds("box", Aabb::new(Vec3::new(-1.0, -1.0, -6.0), Vec3::new(1.0, 1.0, -4.0)));

        let stats = culler.apply();
        assert_eq!(stats.tested, 3);
        assert_eq!(stats.visible, 2);
        assert_eq!(stats.culled, 1);
        assert_eq!(culler.is_visible(&"front"), Some(true));
        assert_eq!(culler.is_visible(&"behind"), Some(false));
        assert_eq!(culler.culled_ids().collect::<Vec<_>>(), vec![&"behind"]);
        assert_eq!(culler.is_visible(&"unknown"), None);
    }

    #[test]
    fn test_camera_turn_changes_flags() {
        let mut culler = FrustumCuller::new();
        culler.update_frustum(&camera_vp());
        culler.set_bounds(1u32, Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0));
        culler.apply();

        let turned = Mat4::perspective_rh(std::f32::consts::FRAC_PI_4, 16.0 / 9.0, 0.1, 1000.0)
            * Mat4::look_to_rh(Vec3::ZERO, Vec3::Z, Vec3::Y);
        culler.update_frustum(&turned);
        let stats = culler.apply();
        assert_eq!(stats.changed, 1);
        assert_eq!(culler.is_visible(&1), Some(false));

        let again = culler.apply();
        assert_eq!(again.changed, 0);
    }

    #[test]
    fn test_invalidated_bounds_are_not_tested() {
        let mut culler = FrustumCuller::new();
        culler.update_frustum(&camera_vp());
        culler.set_bounds(1u32, Sphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0));
        assert!(culler.invalidate(&1));
        assert_eq!(culler.apply().tested, 0);

        culler.set_bounds(1u32, Sphere::new(Vec3::new(0.0, 0.0, 10.0), 1.0));
        culler.apply();
        assert_eq!(culler.is_visible(&1), Some(false));
    }

    #[test]
    fn test_remove_forgets_flag() {
        let mut culler = FrustumCuller::new();
        culler.set_bounds(1u32, Sphere::new(Vec3::ZERO, 1.0));
        culler.apply();
        culler.remove(&1);
        assert_eq!(culler.is_visible(&1), None);
        assert!(culler.bounds().is_empty());
    }
}
