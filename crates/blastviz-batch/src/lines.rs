//! Line batching: thousands of KAD lines, polylines and circles collapse into
//! one line-segment primitive per (color, width).
//!
//! Calls append to an accumulator and mark it dirty; nothing reaches the scene
//! until [`LineBatcher::flush`]. A full redraw is `clear`, re-add, `flush`.

use std::collections::BTreeMap;
use std::f32::consts::TAU;

use blastviz_config::{BatchConfig, DisplayConfig};
use glam::Vec3;

use crate::accumulator::{Accumulator, BatchStats, FlushOutcome};
use crate::color::ColorValue;
use crate::key::{BatchKey, KeyPolicy};
use crate::scene::{LinePrimitive, PickMeta, Primitive, SceneContainer};

/// Segment count used when neither the caller nor the config gives one.
const FALLBACK_CIRCLE_SEGMENTS: u32 = 32;

/// Accumulates line segments keyed by canonical (color, width).
#[derive(Debug)]
pub struct LineBatcher {
    policy: KeyPolicy,
    circle_segments: u32,
    batches: BTreeMap<BatchKey, Accumulator<[Vec3; 2]>>,
}

impl Default for LineBatcher {
    fn default() -> Self {
        Self::new(KeyPolicy::default())
    }
}

impl LineBatcher {
    /// Create a batcher with an explicit key policy.
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            policy,
            circle_segments: FALLBACK_CIRCLE_SEGMENTS,
            batches: BTreeMap::new(),
        }
    }

    /// Create a batcher from configuration.
    pub fn from_config(batch: &BatchConfig, display: &DisplayConfig) -> Self {
        Self {
            policy: KeyPolicy::for_lines(batch, display),
            circle_segments: batch.circle_segments.max(3),
            batches: BTreeMap::new(),
        }
    }

    /// The key a (color, width) pair maps to.
    pub fn batch_key<'a>(&self, color: impl Into<ColorValue<'a>>, width: f32) -> BatchKey {
        BatchKey::new(color, width, &self.policy)
    }

    /// Append one segment. Returns `false` if an endpoint is not finite.
    pub fn add_line<'a>(
        &mut self,
        start: Vec3,
        end: Vec3,
        color: impl Into<ColorValue<'a>>,
        width: f32,
    ) -> bool {
        self.push_segment(start, end, color.into(), width, None)
    }

    /// Append one segment with picking metadata.
    pub fn add_line_with_meta<'a>(
        &mut self,
        start: Vec3,
        end: Vec3,
        color: impl Into<ColorValue<'a>>,
        width: f32,
        meta: PickMeta,
    ) -> bool {
        self.push_segment(start, end, color.into(), width, Some(meta))
    }

    /// Append consecutive segments through `points`.
    ///
    /// Fewer than two points is a no-op. `closed` adds the segment back to the
    /// first point, and is ignored for two points or fewer. Returns the number
    /// of segments added.
    pub fn add_polyline<'a>(
        &mut self,
        points: &[Vec3],
        color: impl Into<ColorValue<'a>>,
        width: f32,
        closed: bool,
    ) -> usize {
        if points.len() < 2 {
            return 0;
        }
        let color = color.into();
        let key = BatchKey::new(color, width, &self.policy);
        let batch = self.batches.entry(key).or_default();
        let mut added = 0;
        for pair in points.windows(2) {
            if push_finite(batch, pair[0], pair[1], None) {
                added += 1;
            }
        }
        if closed && points.len() > 2 && push_finite(batch, points[points.len() - 1], points[0], None) {
            added += 1;
        }
        added
    }

    /// Append a circle of `segments` chords in the horizontal plane through `center`.
    ///
    /// `segments == 0` uses the configured default; fewer than three is raised
    /// to three. A non-positive or non-finite radius adds nothing.
    pub fn add_circle<'a>(
        &mut self,
        center: Vec3,
        radius: f32,
        color: impl Into<ColorValue<'a>>,
        width: f32,
        segments: u32,
    ) -> usize {
        if !(radius.is_finite() && radius > 0.0) || !center.is_finite() {
            tracing::warn!("skipping circle with radius {radius} at {center}");
            return 0;
        }
        let segments = match segments {
            0 => self.circle_segments,
            n => n.max(3),
        };
        let key = BatchKey::new(color, width, &self.policy);
        let batch = self.batches.entry(key).or_default();

        let point = |i: u32| {
            let angle = TAU * i as f32 / segments as f32;
            center + Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
        };
        let mut previous = point(0);
        for i in 1..=segments {
            // Close exactly on the first vertex instead of cos(TAU) noise.
            let next = if i == segments { point(0) } else { point(i) };
            batch.push([previous, next], None);
            previous = next;
        }
        segments as usize
    }

    fn push_segment(
        &mut self,
        start: Vec3,
        end: Vec3,
        color: ColorValue<'_>,
        width: f32,
        meta: Option<PickMeta>,
    ) -> bool {
        let key = BatchKey::new(color, width, &self.policy);
        push_finite(self.batches.entry(key).or_default(), start, end, meta)
    }

    /// Materialize every dirty batch into `scene`.
    ///
    /// Each dirty key has its previous primitive detached before the
    /// replacement is attached; empty keys attach nothing. With no dirty keys
    /// this does nothing. Returns the number of primitives attached.
    pub fn flush(&mut self, scene: &mut dyn SceneContainer) -> usize {
        let mut rebuilt = 0;
        for (key, batch) in &mut self.batches {
            let key = *key;
            let outcome = batch.flush(scene, |acc| {
                Primitive::Lines(LinePrimitive {
                    key,
                    positions: acc.items().iter().flatten().copied().collect(),
                    segment_meta: acc.meta().to_vec(),
                })
            });
            if outcome == FlushOutcome::Rebuilt {
                rebuilt += 1;
            }
        }
        if rebuilt > 0 {
            tracing::debug!("line flush rebuilt {rebuilt} of {} batches", self.batches.len());
        }
        rebuilt
    }

    /// Empty every batch in place and mark all dirty.
    pub fn clear(&mut self) {
        for batch in self.batches.values_mut() {
            batch.clear();
        }
    }

    /// Detach every primitive this batcher attached and forget all batches.
    pub fn dispose(&mut self, scene: &mut dyn SceneContainer) {
        for batch in self.batches.values_mut() {
            batch.dispose(scene);
        }
        self.batches.clear();
    }

    /// Keys that currently exist.
    pub fn keys(&self) -> impl Iterator<Item = &BatchKey> {
        self.batches.keys()
    }

    /// Segments accumulated under `key`.
    pub fn segment_count(&self, key: &BatchKey) -> usize {
        self.batches.get(key).map_or(0, Accumulator::len)
    }

    /// Current counters.
    pub fn stats(&self) -> BatchStats {
        let mut stats = BatchStats {
            batches: self.batches.len(),
            ..BatchStats::default()
        };
        for batch in self.batches.values() {
            stats.elements += batch.len();
            stats.draw_calls += usize::from(batch.primitive().is_some());
            stats.dirty += usize::from(batch.is_dirty());
        }
        stats
    }
}

fn push_finite(
    batch: &mut Accumulator<[Vec3; 2]>,
    start: Vec3,
    end: Vec3,
    meta: Option<PickMeta>,
) -> bool {
    if !(start.is_finite() && end.is_finite()) {
        tracing::warn!("skipping non-finite segment {start} -> {end}");
        return false;
    }
    batch.push([start, end], meta);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MemoryScene;

    fn line_prims(scene: &MemoryScene) -> Vec<&LinePrimitive> {
        scene
            .iter()
            .filter_map(|(_, p)| match p {
                Primitive::Lines(l) => Some(l),
                Primitive::Points(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_five_colors_make_five_batches() {
        let colors = ["#ff0000", "#00ff00", "#0000ff", "#ffff00", "#00ffff"];
        let mut batcher = LineBatcher::default();
        for i in 0..1000 {
            let x = i as f32;
            batcher.add_line(Vec3::new(x, 0.0, 0.0), Vec3::new(x, 1.0, 0.0), colors[i % 5], 2.0);
        }

        let keys: Vec<_> = batcher.keys().copied().collect();
        assert_eq!(keys.len(), 5);
        for key in &keys {
            assert_eq!(batcher.segment_count(key), 200);
        }

        let mut scene = MemoryScene::new();
        assert_eq!(batcher.flush(&mut scene), 5);
        let prims = line_prims(&scene);
        assert_eq!(prims.len(), 5);
        assert!(prims.iter().all(|p| p.segment_count() == 200));
    }

    #[test]
    fn test_flush_twice_is_noop() {
        let mut batcher = LineBatcher::default();
        batcher.add_line(Vec3::ZERO, Vec3::X, "red", 1.0);
        let mut scene = MemoryScene::new();
        batcher.flush(&mut scene);
        let ids: Vec<_> = scene.iter().map(|(id, _)| id).collect();

        assert_eq!(batcher.flush(&mut scene), 0);
        let ids_after: Vec<_> = scene.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ids_after);
        assert_eq!(scene.attached_total(), 1);
        assert_eq!(scene.detached_total(), 0);
    }

    #[test]
    fn test_flush_disposes_previous_primitive() {
        let mut batcher = LineBatcher::default();
        let mut scene = MemoryScene::new();
        batcher.add_line(Vec3::ZERO, Vec3::X, "red", 1.0);
        batcher.flush(&mut scene);
        batcher.add_line(Vec3::ZERO, Vec3::Y, "red", 1.0);
        batcher.flush(&mut scene);

        assert_eq!(scene.len(), 1);
        assert_eq!(line_prims(&scene)[0].segment_count(), 2);
        assert_eq!(scene.detached_total(), 1);
    }

    #[test]
    fn test_clear_then_flush_removes_primitives() {
        let mut batcher = LineBatcher::default();
        let mut scene = MemoryScene::new();
        batcher.add_line(Vec3::ZERO, Vec3::X, "red", 1.0);
        batcher.flush(&mut scene);

        batcher.clear();
        assert_eq!(batcher.stats().dirty, 1);
        batcher.flush(&mut scene);
        assert!(scene.is_empty(), "empty batches must not produce primitives");
        assert_eq!(batcher.stats().draw_calls, 0);
    }

    #[test]
    fn test_flush_leaves_foreign_primitives_alone() {
        let mut scene = MemoryScene::new();
        let mut other = LineBatcher::default();
        other.add_line(Vec3::ZERO, Vec3::X, "blue", 1.0);
        other.flush(&mut scene);

        let mut batcher = LineBatcher::default();
        batcher.add_line(Vec3::ZERO, Vec3::X, "blue", 1.0);
        batcher.flush(&mut scene);
        batcher.clear();
        batcher.flush(&mut scene);

        assert_eq!(scene.len(), 1);
        assert_eq!(other.stats().draw_calls, 1);
    }

    #[test]
    fn test_polyline_edge_cases() {
        let mut batcher = LineBatcher::default();
        assert_eq!(batcher.add_polyline(&[Vec3::ZERO], "red", 1.0, true), 0);
        assert_eq!(batcher.add_polyline(&[Vec3::ZERO, Vec3::X], "red", 1.0, true), 1);
        let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
        assert_eq!(batcher.add_polyline(&tri, "red", 1.0, false), 2);
        assert_eq!(batcher.add_polyline(&tri, "red", 1.0, true), 3);
        let key = batcher.batch_key("red", 1.0);
        assert_eq!(batcher.segment_count(&key), 6);
    }

    #[test]
    fn test_circle_closes_on_first_vertex() {
        let mut batcher = LineBatcher::default();
        let center = Vec3::new(10.0, 20.0, 5.0);
        assert_eq!(batcher.add_circle(center, 2.0, "red", 1.0, 16), 16);

        let mut scene = MemoryScene::new();
        batcher.flush(&mut scene);
        let prim = line_prims(&scene)[0].clone();
        assert_eq!(prim.positions.first(), prim.positions.last());
        for p in &prim.positions {
            assert!(((*p - center).length() - 2.0).abs() < 1e-4);
            assert_eq!(p.z, 5.0);
        }
    }

    #[test]
    fn test_circle_degenerate_inputs() {
        let mut batcher = LineBatcher::default();
        assert_eq!(batcher.add_circle(Vec3::ZERO, 0.0, "red", 1.0, 8), 0);
        assert_eq!(batcher.add_circle(Vec3::ZERO, f32::NAN, "red", 1.0, 8), 0);
        assert_eq!(batcher.add_circle(Vec3::ZERO, 1.0, "red", 1.0, 1), 3);
        assert_eq!(batcher.add_circle(Vec3::ZERO, 1.0, "red", 1.0, 0), 32);
    }

    #[test]
    fn test_non_finite_segment_skipped() {
        let mut batcher = LineBatcher::default();
        assert!(!batcher.add_line(Vec3::ZERO, Vec3::splat(f32::INFINITY), "red", 1.0));
        assert_eq!(batcher.stats().elements, 0);
    }

    #[test]
    fn test_picking_metadata_travels_with_segments() {
        let mut batcher = LineBatcher::default();
        batcher.add_line(Vec3::ZERO, Vec3::X, "red", 1.0);
        batcher.add_line_with_meta(Vec3::X, Vec3::Y, "red", 1.0, PickMeta::new("Line1:::4", 1));

        let mut scene = MemoryScene::new();
        batcher.flush(&mut scene);
        let prim = line_prims(&scene)[0];
        assert!(prim.segment_at(0).is_none());
        assert_eq!(&*prim.segment_at(1).unwrap().owner, "Line1:::4");
    }

    #[test]
    fn test_dispose_detaches_everything() {
        let mut batcher = LineBatcher::default();
        let mut scene = MemoryScene::new();
        batcher.add_line(Vec3::ZERO, Vec3::X, "red", 1.0);
        batcher.add_line(Vec3::ZERO, Vec3::X, "blue", 1.0);
        batcher.flush(&mut scene);
        batcher.dispose(&mut scene);
        assert!(scene.is_empty());
        assert_eq!(batcher.stats(), BatchStats::default());
    }

    #[test]
    fn test_from_config_uses_circle_default() {
        let batch = BatchConfig {
            circle_segments: 12,
            ..BatchConfig::default()
        };
        let mut batcher = LineBatcher::from_config(&batch, &DisplayConfig::default());
        assert_eq!(batcher.add_circle(Vec3::ZERO, 1.0, "red", 1.0, 0), 12);
    }
}
