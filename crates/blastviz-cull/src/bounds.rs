//! Bounding volumes and their per-object cache.

use std::hash::Hash;

use glam::Vec3;
use rustc_hash::FxHashMap;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Create a box from two opposite corners in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Smallest box containing every point, or `None` for an empty slice.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let (min, max) = rest
            .iter()
            .fold((*first, *first), |(min, max), &p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    /// Midpoint of the box.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-size along each axis.
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }
}

/// A bounding sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    /// Center in world space.
    pub center: Vec3,
    /// Radius in world units.
    pub radius: f32,
}

impl Sphere {
    /// Create a sphere from its center and radius.
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Sphere around a hole's collar-to-toe segment, padded by half the diameter.
    pub fn around_segment(start: Vec3, end: Vec3, diameter: f32) -> Self {
        Self {
            center: (start + end) * 0.5,
            radius: start.distance(end) * 0.5 + diameter.max(0.0) * 0.5,
        }
    }
}

/// Either kind of bounding volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bounds {
    Sphere(Sphere),
    Box(Aabb),
}

impl From<Sphere> for Bounds {
    fn from(sphere: Sphere) -> Self {
        Bounds::Sphere(sphere)
    }
}

impl From<Aabb> for Bounds {
    fn from(aabb: Aabb) -> Self {
        Bounds::Box(aabb)
    }
}

/// Bounding volumes keyed by caller id.
///
/// Entries are never expired automatically: the caller invalidates an entry
/// when the object's geometry changes.
#[derive(Debug)]
pub struct BoundsCache<K> {
    entries: FxHashMap<K, Bounds>,
}

impl<K> Default for BoundsCache<K> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }
}

impl<K: Eq + Hash> BoundsCache<K> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the bounds of `id`, returning the replaced ones.
    pub fn insert(&mut self, id: K, bounds: impl Into<Bounds>) -> Option<Bounds> {
        self.entries.insert(id, bounds.into())
    }

    /// Cached bounds of `id`.
    pub fn get(&self, id: &K) -> Option<&Bounds> {
        self.entries.get(id)
    }

    /// Cached bounds of `id`, computing and storing them on a miss.
    pub fn get_or_insert_with(&mut self, id: K, compute: impl FnOnce() -> Bounds) -> Bounds {
        *self.entries.entry(id).or_insert_with(compute)
    }

    /// Drop the entry for `id`. Returns whether one existed.
    pub fn invalidate(&mut self, id: &K) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Cached ids with their bounds.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Bounds)> {
        self.entries.iter()
    }

    /// Number of cached volumes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached volume.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aabb_center_and_extents() {
        let aabb = Aabb::new(Vec3::new(2.0, 3.0, 4.0), Vec3::new(-2.0, -3.0, -4.0));
        assert_eq!(aabb.min, Vec3::new(-2.0, -3.0, -4.0));
        assert_eq!(aabb.center(), Vec3::ZERO);
        assert_eq!(aabb.extents(), Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_aabb_from_points() {
        assert!(Aabb::from_points(&[]).is_none());
        let aabb = Aabb::from_points(&[Vec3::X, Vec3::NEG_Y, Vec3::Z * 3.0]).unwrap();
        assert_eq!(aabb.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 0.0, 3.0));
    }

    #[test]
    fn test_sphere_around_segment() {
        let sphere = Sphere::around_segment(Vec3::ZERO, Vec3::new(0.0, 0.0, -10.0), 0.2);
        assert_eq!(sphere.center, Vec3::new(0.0, 0.0, -5.0));
        assert!((sphere.radius - 5.1).abs() < 1e-5);
    }

    #[test]
    fn test_cache_is_explicitly_invalidated() {
        let mut cache = BoundsCache::new();
        cache.insert("A:::1", Sphere::new(Vec3::ZERO, 1.0));
        let replaced = cache.insert("A:::1", Sphere::new(Vec3::ZERO, 2.0));
        assert_eq!(replaced, Some(Bounds::Sphere(Sphere::new(Vec3::ZERO, 1.0))));
        assert!(cache.invalidate(&"A:::1"));
        assert!(!cache.invalidate(&"A:::1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_or_insert_computes_once() {
        let mut cache = BoundsCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            cache.get_or_insert_with(7u32, || {
                calls += 1;
                Bounds::Box(Aabb::new(Vec3::ZERO, Vec3::ONE))
            });
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }
}
