//! Detail bands and the feature bundle each one enables.

use std::fmt;

/// Ordered detail band; higher bands draw more.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LodBand {
    /// A constant-screen-size point marker only.
    PointOnly,
    /// Point marker plus the collar-to-toe track line.
    PointTrack,
    /// Filled primary shape, track line and label.
    Simple,
    /// Full multi-part geometry with label.
    Full,
}

impl LodBand {
    /// All bands in ascending order.
    pub const ALL: [LodBand; 4] = [
        LodBand::PointOnly,
        LodBand::PointTrack,
        LodBand::Simple,
        LodBand::Full,
    ];

    /// Position in [`LodBand::ALL`].
    pub const fn index(self) -> usize {
        match self {
            LodBand::PointOnly => 0,
            LodBand::PointTrack => 1,
            LodBand::Simple => 2,
            LodBand::Full => 3,
        }
    }

    /// Feature bundle of this band.
    pub const fn features(self) -> LodFeatures {
        LodFeatures::for_band(self)
    }

    /// Text labels (hole id, depth) are drawn.
    pub const fn show_labels(self) -> bool {
        matches!(self, LodBand::Simple | LodBand::Full)
    }

    /// The collar-to-toe track line is drawn.
    pub const fn show_track_line(self) -> bool {
        !matches!(self, LodBand::PointOnly)
    }

    /// The filled primary shape (collar disc) is drawn.
    pub const fn show_primary_shape(self) -> bool {
        matches!(self, LodBand::Simple | LodBand::Full)
    }

    /// Grade and toe markers are drawn in addition to the collar.
    pub const fn show_full_geometry(self) -> bool {
        matches!(self, LodBand::Full)
    }

    /// A screen-space point marker stands in for the primary shape.
    pub const fn show_point_marker(self) -> bool {
        !self.show_primary_shape()
    }
}

impl fmt::Display for LodBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LodBand::PointOnly => "point-only",
            LodBand::PointTrack => "point-track",
            LodBand::Simple => "simple",
            LodBand::Full => "full",
        })
    }
}

/// What a band draws, as plain flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LodFeatures {
    /// Hole name labels.
    pub labels: bool,
    /// Collar-to-toe track line.
    pub track_line: bool,
    /// Collar shape sized by diameter.
    pub primary_shape: bool,
    /// Grade and toe shapes.
    pub full_geometry: bool,
    /// Fixed-size point at the collar.
    pub point_marker: bool,
}

impl LodFeatures {
    /// Flags for `band`.
    pub const fn for_band(band: LodBand) -> Self {
        Self {
            labels: band.show_labels(),
            track_line: band.show_track_line(),
            primary_shape: band.show_primary_shape(),
            full_geometry: band.show_full_geometry(),
            point_marker: band.show_point_marker(),
        }
    }
}
