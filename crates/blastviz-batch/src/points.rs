//! Point batching: collar markers, KAD points and point-only LOD markers.
//!
//! Uniform points are keyed by canonical (color, size). Callers that already
//! hold per-point color and size arrays add them under a named group instead;
//! at flush time such a batch takes the per-point size path when its sizes
//! are not all equal.

use std::collections::BTreeMap;

use blastviz_config::{BatchConfig, DisplayConfig};
use glam::Vec3;

use crate::accumulator::{Accumulator, BatchStats, FlushOutcome};
use crate::color::{ColorValue, rgb_channels};
use crate::key::{BatchKey, KeyPolicy};
use crate::scene::{PickMeta, PointBatchKey, PointPrimitive, PointSizing, Primitive, SceneContainer};

/// Sizes closer than this count as equal when choosing the rendering path.
const SIZE_EPSILON: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
struct PointSample {
    position: Vec3,
    color: [f32; 3],
    size: f32,
}

/// Accumulates points keyed by canonical (color, size) or by group name.
#[derive(Debug, Default)]
pub struct PointBatcher {
    policy: KeyPolicy,
    batches: BTreeMap<PointBatchKey, Accumulator<PointSample>>,
}

impl PointBatcher {
    /// Create a batcher with an explicit key policy.
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            policy,
            batches: BTreeMap::new(),
        }
    }

    /// Create a batcher from configuration.
    pub fn from_config(batch: &BatchConfig, display: &DisplayConfig) -> Self {
        Self::new(KeyPolicy::for_points(batch, display))
    }

    /// The key a (color, size) pair maps to.
    pub fn batch_key<'a>(&self, color: impl Into<ColorValue<'a>>, size: f32) -> PointBatchKey {
        PointBatchKey::Uniform(BatchKey::new(color, size, &self.policy))
    }

    /// Append one point. Returns `false` if the position is not finite.
    pub fn add_point<'a>(&mut self, position: Vec3, color: impl Into<ColorValue<'a>>, size: f32) -> bool {
        self.push_uniform(position, color.into(), size, None)
    }

    /// Append one point with picking metadata.
    pub fn add_point_with_meta<'a>(
        &mut self,
        position: Vec3,
        color: impl Into<ColorValue<'a>>,
        size: f32,
        meta: PickMeta,
    ) -> bool {
        self.push_uniform(position, color.into(), size, Some(meta))
    }

    fn push_uniform(
        &mut self,
        position: Vec3,
        color: ColorValue<'_>,
        size: f32,
        meta: Option<PickMeta>,
    ) -> bool {
        if !position.is_finite() {
            tracing::warn!("skipping non-finite point {position}");
            return false;
        }
        let key = BatchKey::new(color, size, &self.policy);
        let sample = PointSample {
            position,
            color: rgb_channels(key.rgb()),
            size: key.width(),
        };
        self.batches
            .entry(PointBatchKey::Uniform(key))
            .or_default()
            .push(sample, meta);
        true
    }

    /// Append points with per-point colors (`0xRRGGBB`) and sizes under `group`.
    ///
    /// Mismatched array lengths are truncated to the shortest one. Sizes are
    /// clamped to the configured minimum but not bucketed. Returns the number
    /// of points added.
    pub fn add_points_varying(
        &mut self,
        group: &str,
        positions: &[Vec3],
        colors: &[u32],
        sizes: &[f32],
    ) -> usize {
        let n = positions.len().min(colors.len()).min(sizes.len());
        if n < positions.len() {
            tracing::warn!(
                "point group {group:?}: {} positions but {} colors and {} sizes, using {n}",
                positions.len(),
                colors.len(),
                sizes.len()
            );
        }
        let policy = &self.policy;
        let batch = self
            .batches
            .entry(PointBatchKey::Varying(group.to_string()))
            .or_default();
        let mut added = 0;
        for ((&position, &rgb), &size) in positions.iter().zip(colors).zip(sizes).take(n) {
            if !position.is_finite() {
                continue;
            }
            let size = if size.is_finite() {
                size.max(policy.min_value)
            } else {
                policy.min_value
            };
            batch.push(
                PointSample {
                    position,
                    color: rgb_channels(policy.resolve_color(rgb)),
                    size,
                },
                None,
            );
            added += 1;
        }
        added
    }

    /// Materialize every dirty batch into `scene`.
    ///
    /// Returns the number of primitives attached.
    pub fn flush(&mut self, scene: &mut dyn SceneContainer) -> usize {
        let mut rebuilt = 0;
        for (key, batch) in &mut self.batches {
            let outcome = batch.flush(scene, |acc| Primitive::Points(build_points(key, acc)));
            if outcome == FlushOutcome::Rebuilt {
                rebuilt += 1;
            }
        }
        if rebuilt > 0 {
            tracing::debug!("point flush rebuilt {rebuilt} of {} batches", self.batches.len());
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
    pub fn keys(&self) -> impl Iterator<Item = &PointBatchKey> {
        self.batches.keys()
    }

    /// Points accumulated under `key`.
    pub fn point_count(&self, key: &PointBatchKey) -> usize {
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

fn build_points(key: &PointBatchKey, acc: &Accumulator<PointSample>) -> PointPrimitive {
    let samples = acc.items();
    let first = samples.first().map_or(0.0, |s| s.size);
    let uniform = samples.iter().all(|s| (s.size - first).abs() <= SIZE_EPSILON);
    PointPrimitive {
        key: key.clone(),
        positions: samples.iter().map(|s| s.position).collect(),
        colors: samples.iter().map(|s| s.color).collect(),
        sizes: samples.iter().map(|s| s.size).collect(),
        sizing: if uniform {
            PointSizing::Uniform(first)
        } else {
            PointSizing::PerPoint
        },
        point_meta: acc.meta().to_vec(),
    }
}
