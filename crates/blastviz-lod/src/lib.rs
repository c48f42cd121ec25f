//! Pixel-size level of detail: classify objects into detail bands from their
//! projected screen size, and reclassify large object sets under a frame budget.

mod band;
mod classifier;
mod manager;
mod screen;

pub use band::{LodBand, LodFeatures};
pub use classifier::{DEFAULT_MIN_EXTENT, LodClassifier, LodThresholds, hole_extent};
pub use manager::{LodManager, LodUpdate, frame_budget};
pub use screen::ScreenScale;
