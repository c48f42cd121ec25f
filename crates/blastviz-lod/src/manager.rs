//! Incremental reclassification of many objects under a per-frame time budget.
//!
//! Objects are stored densely and swept from a cursor. A sweep that runs out
//! of budget resumes where it stopped on the next `update`; a change of scale
//! restarts it from the beginning. Band changes go to a change list that is
//! reused across frames.

use std::hash::Hash;
use std::time::{Duration, Instant};

use blastviz_config::LodConfig;
use rustc_hash::FxHashMap;

use crate::band::LodBand;
use crate::classifier::LodClassifier;

/// Outcome of one [`LodManager::update`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LodUpdate {
    /// Objects classified during this call.
    pub classified: usize,
    /// Objects whose band changed during this call.
    pub changed: usize,
    /// The sweep for the current scale has reached the end.
    pub complete: bool,
    /// The scale changed and the sweep started over.
    pub restarted: bool,
}

/// Per-frame reclassification budget configured in `config`.
pub fn frame_budget(config: &LodConfig) -> Duration {
    let ms = config.frame_budget_ms;
    if ms.is_finite() && ms > 0.0 {
        Duration::from_secs_f32(ms / 1000.0)
    } else {
        Duration::ZERO
    }
}

/// Scale used for sweeping; non-finite or negative input becomes 0.
fn sanitize_scale(pixels_per_unit: f32) -> f32 {
    if pixels_per_unit.is_finite() && pixels_per_unit > 0.0 {
        pixels_per_unit
    } else {
        0.0
    }
}

#[derive(Clone, Debug)]
struct LodEntry<K> {
    id: K,
    extent: f32,
    band: LodBand,
}

/// Tracks the band of every registered object.
#[derive(Debug)]
pub struct LodManager<K> {
    classifier: LodClassifier,
    check_interval: usize,
    entries: Vec<LodEntry<K>>,
    index: FxHashMap<K, usize>,
    /// Entries before the cursor are classified at `sweep_ppu`.
    cursor: usize,
    sweep_ppu: Option<f32>,
    changes: Vec<(K, LodBand)>,
}

impl<K: Clone + Eq + Hash> LodManager<K> {
    /// Create a manager that reads the clock every `check_interval` objects.
    pub fn new(classifier: LodClassifier, check_interval: u32) -> Self {
        Self {
            classifier,
            check_interval: check_interval.max(1) as usize,
            entries: Vec::new(),
            index: FxHashMap::default(),
            cursor: 0,
            sweep_ppu: None,
            changes: Vec::new(),
        }
    }

    /// Create a manager from configuration.
    pub fn from_config(config: &LodConfig) -> Self {
        Self::new(LodClassifier::from_config(config), config.budget_check_interval)
    }

    /// The classifier in use.
    pub fn classifier(&self) -> &LodClassifier {
        &self.classifier
    }

    /// Register `id` with world `extent`, or change the extent of a known id.
    ///
    /// The object is classified immediately at the current scale.
    pub fn insert(&mut self, id: K, extent: f32) -> LodBand {
        let band = self.classifier.classify(extent, self.sweep_ppu.unwrap_or(0.0));
        if let Some(&slot) = self.index.get(&id) {
            let entry = &mut self.entries[slot];
            entry.extent = extent;
            entry.band = band;
        } else {
            self.index.insert(id.clone(), self.entries.len());
            self.entries.push(LodEntry { id, extent, band });
        }
        band
    }

    /// Forget `id`. Returns `false` if it was not registered.
    pub fn remove(&mut self, id: &K) -> bool {
        let Some(slot) = self.index.remove(id) else {
            return false;
        };
        self.entries.swap_remove(slot);
        // Keep every entry before the cursor classified: the former last entry
        // now at `slot` may not have been swept yet.
        if slot < self.cursor {
            self.cursor -= 1;
            if slot < self.cursor && self.cursor < self.entries.len() {
                self.entries.swap(slot, self.cursor);
                self.reindex(self.cursor);
            }
        }
        if slot < self.entries.len() {
            self.reindex(slot);
        }
        true
    }

    fn reindex(&mut self, slot: usize) {
        if let Some(entry) = self.entries.get(slot)
            && let Some(index) = self.index.get_mut(&entry.id)
        {
            *index = slot;
        }
    }

    /// Current band of `id`.
    pub fn band(&self, id: &K) -> Option<LodBand> {
        self.index.get(id).map(|&slot| self.entries[slot].band)
    }

    /// Registered extent of `id`.
    pub fn extent(&self, id: &K) -> Option<f32> {
        self.index.get(id).map(|&slot| self.entries[slot].extent)
    }

    /// Continue the sweep at `pixels_per_unit` until done or `budget` is spent.
    ///
    /// The clock is read every `check_interval` objects, so one call may
    /// overrun the budget by up to that many classifications.
    pub fn update(&mut self, pixels_per_unit: f32, budget: Duration) -> LodUpdate {
        let pixels_per_unit = sanitize_scale(pixels_per_unit);
        self.changes.clear();
        let restarted = self.sweep_ppu != Some(pixels_per_unit);
        if restarted {
            self.sweep_ppu = Some(pixels_per_unit);
            self.cursor = 0;
        }

        let start = Instant::now();
        let mut classified = 0;
        while self.cursor < self.entries.len() {
            self.classify_at_cursor(pixels_per_unit);
            classified += 1;
            if classified % self.check_interval == 0 && start.elapsed() >= budget {
                break;
            }
        }

        let update = LodUpdate {
            classified,
            changed: self.changes.len(),
            complete: self.cursor == self.entries.len(),
            restarted,
        };
        if !update.complete {
            tracing::trace!(
                "LOD sweep paused at {}/{} after {:?}",
                self.cursor,
                self.entries.len(),
                start.elapsed()
            );
        }
        update
    }

    /// Reclassify every object at `pixels_per_unit`, ignoring the budget.
    pub fn force_full_update(&mut self, pixels_per_unit: f32) -> LodUpdate {
        let pixels_per_unit = sanitize_scale(pixels_per_unit);
        self.changes.clear();
        self.sweep_ppu = Some(pixels_per_unit);
        self.cursor = 0;
        while self.cursor < self.entries.len() {
            self.classify_at_cursor(pixels_per_unit);
        }
        LodUpdate {
            classified: self.entries.len(),
            changed: self.changes.len(),
            complete: true,
            restarted: true,
        }
    }

    fn classify_at_cursor(&mut self, pixels_per_unit: f32) {
        let entry = &mut self.entries[self.cursor];
        let band = self.classifier.classify(entry.extent, pixels_per_unit);
        if band != entry.band {
            entry.band = band;
            self.changes.push((entry.id.clone(), band));
        }
        self.cursor += 1;
    }

    /// Band changes made by the last `update` or `force_full_update`.
    pub fn changes(&self) -> &[(K, LodBand)] {
        &self.changes
    }

    /// Whether the sweep for the current scale has finished.
    pub fn is_sweep_complete(&self) -> bool {
        self.cursor == self.entries.len()
    }

    /// Number of objects per band, indexed by [`LodBand::index`].
    pub fn band_counts(&self) -> [usize; 4] {
        let mut counts = [0; 4];
        for entry in &self.entries {
            counts[entry.band.index()] += 1;
        }
        counts
    }

    /// Registered ids with their current bands.
    pub fn iter(&self) -> impl Iterator<Item = (&K, LodBand)> {
        self.entries.iter().map(|entry| (&entry.id, entry.band))
    }

    /// Number of registered objects.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no object is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every object; the current scale is kept.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.changes.clear();
        self.cursor = 0;
    }
}
