//! Materialized primitives and the container that receives them.
//!
//! The batch builders never talk to a graphics API. `flush` turns an
//! accumulator into a [`Primitive`] and hands it to a [`SceneContainer`],
//! which is whatever the rendering layer uses to own drawables. Disposal is
//! `detach`: the container gives the primitive back and it is dropped.

use std::sync::Arc;

use glam::Vec3;
use rustc_hash::FxHashMap;

use crate::key::BatchKey;

/// Opaque handle of a primitive attached to a [`SceneContainer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimitiveId(pub u64);

/// Picking metadata carried per line segment or per point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PickMeta {
    /// Logical owner, e.g. `"Pattern1:::17"`.
    pub owner: Arc<str>,
    /// Element index within the owner (vertex or segment number).
    pub element: u32,
}

impl PickMeta {
    /// Metadata for element `element` of `owner`.
    pub fn new(owner: impl Into<Arc<str>>, element: u32) -> Self {
        Self {
            owner: owner.into(),
            element,
        }
    }
}

/// One batched line-segment primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct LinePrimitive {
    /// Batch key this primitive was built from.
    pub key: BatchKey,
    /// Segment endpoints, two per segment.
    pub positions: Vec<Vec3>,
    /// Per-segment picking metadata; empty when no segment carried any.
    pub segment_meta: Vec<Option<PickMeta>>,
}

impl LinePrimitive {
    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.positions.len() / 2
    }

    /// Picking metadata of segment `index`, if any was recorded.
    pub fn segment_at(&self, index: usize) -> Option<&PickMeta> {
        self.segment_meta.get(index).and_then(Option::as_ref)
    }
}

/// Identifies a point batch.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointBatchKey {
    /// All points share one canonical color and size.
    Uniform(BatchKey),
    /// Points with per-point colors and sizes, grouped by a caller name.
    Varying(String),
}

/// How point sizes are fed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointSizing {
    /// One size for the whole batch (cheap material path).
    Uniform(f32),
    /// Sizes differ within the batch; use the per-vertex size attribute.
    PerPoint,
}

/// One batched point primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct PointPrimitive {
    /// Batch key this primitive was built from.
    pub key: PointBatchKey,
    /// Point positions.
    pub positions: Vec<Vec3>,
    /// Per-point normalized RGB.
    pub colors: Vec<[f32; 3]>,
    /// Per-point sizes; meaningful when `sizing` is [`PointSizing::PerPoint`].
    pub sizes: Vec<f32>,
    /// Rendering path chosen at flush time.
    pub sizing: PointSizing,
    /// Per-point picking metadata; empty when no point carried any.
    pub point_meta: Vec<Option<PickMeta>>,
}

/// A drawable produced by a batch builder.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// Batched line segments.
    Lines(LinePrimitive),
    /// Batched points.
    Points(PointPrimitive),
}

/// Receives primitives on flush and gives them back on disposal.
pub trait SceneContainer {
    /// Take ownership of a primitive and return its handle.
    fn attach(&mut self, primitive: Primitive) -> PrimitiveId;

    /// Remove a primitive. Returns `None` if the id is not attached.
    fn detach(&mut self, id: PrimitiveId) -> Option<Primitive>;
}

/// In-memory [`SceneContainer`], used headless and by tests.
#[derive(Debug, Default)]
pub struct MemoryScene {
    next_id: u64,
    primitives: FxHashMap<PrimitiveId, Primitive>,
    attached_total: u64,
    detached_total: u64,
}

impl MemoryScene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attached primitives.
    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    /// Whether nothing is attached.
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    /// Look up an attached primitive.
    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.primitives.get(&id)
    }

    /// Iterate over attached primitives in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (PrimitiveId, &Primitive)> {
        self.primitives.iter().map(|(id, p)| (*id, p))
    }

    /// Total `attach` calls since creation.
    pub fn attached_total(&self) -> u64 {
        self.attached_total
    }

    /// Total successful `detach` calls since creation.
    pub fn detached_total(&self) -> u64 {
        self.detached_total
    }
}

impl SceneContainer for MemoryScene {
    fn attach(&mut self, primitive: Primitive) -> PrimitiveId {
        let id = PrimitiveId(self.next_id);
        self.next_id += 1;
        self.attached_total += 1;
        self.primitives.insert(id, primitive);
        id
    }

    fn detach(&mut self, id: PrimitiveId) -> Option<Primitive> {
        let removed = self.primitives.remove(&id);
        if removed.is_some() {
            self.detached_total += 1;
        }
        removed
    }
}
