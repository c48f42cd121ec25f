//! Per-key vertex accumulation shared by the line and point builders.

use crate::scene::{PickMeta, Primitive, PrimitiveId, SceneContainer};

/// Counters reported by the line and point builders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Accumulators that exist (including empty ones).
    pub batches: usize,
    /// Segments (lines) or points accumulated across all batches.
    pub elements: usize,
    /// Primitives currently attached to a scene, i.e. draw calls.
    pub draw_calls: usize,
    /// Accumulators waiting for the next flush.
    pub dirty: usize,
}

/// What one accumulator did during a flush.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FlushOutcome {
    /// Not dirty; nothing happened.
    Clean,
    /// Empty; the previous primitive (if any) was detached and nothing replaced it.
    Emptied,
    /// A new primitive was attached.
    Rebuilt,
}

/// An append-only element list for one batch key.
///
/// Metadata is stored in a parallel vector that stays empty until the first
/// element with metadata arrives, then is backfilled with `None`.
#[derive(Debug)]
pub(crate) struct Accumulator<T> {
    items: Vec<T>,
    meta: Vec<Option<PickMeta>>,
    dirty: bool,
    primitive: Option<PrimitiveId>,
}

impl<T> Default for Accumulator<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            meta: Vec::new(),
            dirty: true,
            primitive: None,
        }
    }
}

impl<T> Accumulator<T> {
    pub(crate) fn push(&mut self, item: T, meta: Option<PickMeta>) {
        if meta.is_some() && self.meta.len() < self.items.len() {
            self.meta.resize(self.items.len(), None);
        }
        if meta.is_some() || !self.meta.is_empty() {
            self.meta.push(meta);
        }
        self.items.push(item);
        self.dirty = true;
    }

    pub(crate) fn items(&self) -> &[T] {
        &self.items
    }

    pub(crate) fn meta(&self) -> &[Option<PickMeta>] {
        &self.meta
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn primitive(&self) -> Option<PrimitiveId> {
        self.primitive
    }

    /// Truncate in place, keeping allocated capacity.
    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.meta.clear();
        self.dirty = true;
    }

    /// Replace this accumulator's primitive if dirty.
    ///
    /// Only the id this accumulator attached itself is ever detached.
    pub(crate) fn flush(
        &mut self,
        scene: &mut dyn SceneContainer,
        build: impl FnOnce(&Self) -> Primitive,
    ) -> FlushOutcome {
        if !self.dirty {
            return FlushOutcome::Clean;
        }
        if let Some(previous) = self.primitive.take()
            && scene.detach(previous).is_none()
        {
            tracing::warn!("batch primitive {previous:?} was already detached by someone else");
        }
        self.dirty = false;
        if self.items.is_empty() {
            return FlushOutcome::Emptied;
        }
        let primitive = build(self);
        self.primitive = Some(scene.attach(primitive));
        FlushOutcome::Rebuilt
    }

    /// Detach the current primitive and mark dirty so the next flush rebuilds.
    pub(crate) fn dispose(&mut self, scene: &mut dyn SceneContainer) {
        if let Some(previous) = self.primitive.take() {
            scene.detach(previous);
        }
        self.dirty = true;
    }
}
