//! Screen-size band selection with configurable pixel thresholds.

use blastviz_config::LodConfig;
use glam::Vec3;

use crate::band::LodBand;

/// World extent used when an object reports zero, negative or non-finite size.
pub const DEFAULT_MIN_EXTENT: f32 = 0.1;

/// Three ascending screen-pixel band edges.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodThresholds {
    edges: [f32; 3],
}

impl Default for LodThresholds {
    /// 10 / 20 / 50 pixels.
    fn default() -> Self {
        Self {
            edges: [10.0, 20.0, 50.0],
        }
    }
}

impl LodThresholds {
    /// Thresholds from ascending edges, or `None` if they are not positive
    /// and strictly increasing.
    pub fn new(edges: [f32; 3]) -> Option<Self> {
        let [t1, t2, t3] = edges;
        (t1.is_finite() && t3.is_finite() && t1 > 0.0 && t1 < t2 && t2 < t3)
            .then_some(Self { edges })
    }

    /// Thresholds from edges known to be valid.
    ///
    /// # Panics
    ///
    /// Panics if the edges are not positive and strictly increasing.
    pub fn custom(edges: [f32; 3]) -> Self {
        match Self::new(edges) {
            Some(thresholds) => thresholds,
            None => panic!("thresholds must be positive and strictly increasing, got {edges:?}"),
        }
    }

    /// The band edges in pixels.
    pub fn edges(&self) -> [f32; 3] {
        self.edges
    }
}

/// Maps (world extent, pixels per world unit) to a [`LodBand`].
///
/// Classification is a constant number of comparisons and never allocates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodClassifier {
    thresholds: LodThresholds,
    min_extent: f32,
}

impl Default for LodClassifier {
    fn default() -> Self {
        Self::new(LodThresholds::default(), DEFAULT_MIN_EXTENT)
    }
}

impl LodClassifier {
    /// Create a classifier. A non-positive `min_extent` is replaced by
    /// [`DEFAULT_MIN_EXTENT`].
    pub fn new(thresholds: LodThresholds, min_extent: f32) -> Self {
        let min_extent = if min_extent.is_finite() && min_extent > 0.0 {
            min_extent
        } else {
            DEFAULT_MIN_EXTENT
        };
        Self {
            thresholds,
            min_extent,
        }
    }

    /// Create a classifier from configuration, falling back to the default
    /// thresholds when the configured ones are unusable.
    pub fn from_config(config: &LodConfig) -> Self {
        let thresholds = LodThresholds::new(config.thresholds_px).unwrap_or_else(|| {
            tracing::warn!(
                "invalid LOD thresholds {:?}, using defaults",
                config.thresholds_px
            );
            LodThresholds::default()
        });
        Self::new(thresholds, config.min_extent)
    }

    /// Band thresholds in use.
    pub fn thresholds(&self) -> &LodThresholds {
        &self.thresholds
    }

    /// Extent substituted for degenerate sizes.
    pub fn min_extent(&self) -> f32 {
        self.min_extent
    }

    /// Projected size in pixels of an object `extent` world units across.
    pub fn screen_pixels(&self, extent: f32, pixels_per_unit: f32) -> f32 {
        let extent = if extent.is_finite() && extent > 0.0 {
            extent
        } else {
            self.min_extent
        };
        let ppu = if pixels_per_unit.is_finite() && pixels_per_unit > 0.0 {
            pixels_per_unit
        } else {
            0.0
        };
        extent * ppu
    }

    /// Band for an object `extent` world units across at `pixels_per_unit`.
    pub fn classify(&self, extent: f32, pixels_per_unit: f32) -> LodBand {
        self.classify_pixels(self.screen_pixels(extent, pixels_per_unit))
    }

    /// Band for an already projected size.
    pub fn classify_pixels(&self, screen_pixels: f32) -> LodBand {
        let [t1, t2, t3] = self.thresholds.edges;
        if screen_pixels < t1 {
            LodBand::PointOnly
        } else if screen_pixels < t2 {
            LodBand::PointTrack
        } else if screen_pixels < t3 {
            LodBand::Simple
        } else {
            LodBand::Full
        }
    }
}

/// Extent of a hole: the larger of its diameter and its collar-to-toe length.
///
/// Long thin holes stay visible as their diameter shrinks on screen.
pub fn hole_extent(collar: Vec3, toe: Vec3, diameter: f32) -> f32 {
    let length = collar.distance(toe);
    let length = if length.is_finite() { length } else { 0.0 };
    let diameter = if diameter.is_finite() { diameter } else { 0.0 };
    diameter.max(length)
}
