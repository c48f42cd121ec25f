//! Canonical batch keys for line and point accumulators.
//!
//! A key is the pair (normalized color, quantized width-or-size). Widths are
//! bucketed to a fixed precision and clamped to a floor so that the many
//! slightly different widths coming out of domain data collapse onto a small
//! number of batches.

use std::fmt;

use blastviz_config::{BatchConfig, DisplayConfig};

use crate::color::{ColorValue, hex_string};

/// Absorbs float noise so `1.5 / 0.5` lands in bucket 3, not 2.
const BUCKET_EPSILON: f32 = 1e-4;

/// Rules for turning a (color, width) pair into a [`BatchKey`].
#[derive(Clone, Debug, PartialEq)]
pub struct KeyPolicy {
    /// Bucket size for widths or sizes.
    pub precision: f32,
    /// Smallest width or size a key can carry.
    pub min_value: f32,
    /// Color used when the caller's color does not parse.
    pub fallback_rgb: u32,
    /// Draw pure black as white.
    pub dark_mode: bool,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            precision: 0.5,
            min_value: 1.0,
            fallback_rgb: 0xffffff,
            dark_mode: false,
        }
    }
}

impl KeyPolicy {
    /// Policy for line widths.
    pub fn for_lines(batch: &BatchConfig, display: &DisplayConfig) -> Self {
        Self::build(batch.width_precision, batch.min_width, batch, display)
    }

    /// Policy for point sizes.
    pub fn for_points(batch: &BatchConfig, display: &DisplayConfig) -> Self {
        Self::build(batch.size_precision, batch.min_size, batch, display)
    }

    fn build(precision: f32, min_value: f32, batch: &BatchConfig, display: &DisplayConfig) -> Self {
        let fallback_rgb = match ColorValue::from(&batch.fallback_color).to_rgb() {
            Ok(rgb) => rgb,
            Err(err) => {
                tracing::warn!("fallback color {:?} unusable ({err}), using white", batch.fallback_color);
                0xffffff
            }
        };
        Self {
            precision: if precision > 0.0 { precision } else { 0.5 },
            min_value,
            fallback_rgb,
            dark_mode: display.dark_mode,
        }
    }

    /// Resolve a color under this policy; never fails.
    pub fn resolve_color<'a>(&self, color: impl Into<ColorValue<'a>>) -> u32 {
        let color = color.into();
        let rgb = match color.to_rgb() {
            Ok(rgb) => rgb,
            Err(err) => {
                tracing::warn!("unparseable color {color:?} ({err}), using fallback");
                self.fallback_rgb
            }
        };
        if self.dark_mode && rgb == 0x000000 {
            0xffffff
        } else {
            rgb
        }
    }

    /// Quantize a width or size: bucket to `precision`, then clamp to `min_value`.
    ///
    /// Non-finite input collapses to `min_value`.
    pub fn quantize(&self, value: f32) -> f32 {
        if !value.is_finite() {
            return self.min_value;
        }
        let bucket = (value / self.precision + BUCKET_EPSILON).floor();
        (bucket * self.precision).max(self.min_value)
    }
}

/// Canonical key of one line or point batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    rgb: u32,
    /// Quantized width in thousandths, so the key stays `Eq + Hash`.
    width_milli: u32,
}

impl BatchKey {
    /// Build the canonical key for a color and width under `policy`.
    pub fn new<'a>(color: impl Into<ColorValue<'a>>, width: f32, policy: &KeyPolicy) -> Self {
        let rgb = policy.resolve_color(color);
        let width = policy.quantize(width);
        Self {
            rgb,
            width_milli: (width * 1000.0).round() as u32,
        }
    }

    /// Packed `0xRRGGBB` color.
    pub fn rgb(&self) -> u32 {
        self.rgb
    }

    /// Lowercase `#rrggbb` color.
    pub fn color_hex(&self) -> String {
        hex_string(self.rgb)
    }

    /// Quantized width (or point size).
    pub fn width(&self) -> f32 {
        self.width_milli as f32 / 1000.0
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", hex_string(self.rgb), self.width())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_forms_share_one_key() {
        let policy = KeyPolicy::default();
        let a = BatchKey::new("#FF0000", 2.0, &policy);
        let b = BatchKey::new(0xff0000u32, 2.0, &policy);
        let c = BatchKey::new("ff0000", 2.0, &policy);
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(a.to_string(), "#ff0000_2");
    }

    #[test]
    fn test_width_bucketing_at_half_precision() {
        let policy = KeyPolicy::default();
        let narrow = BatchKey::new("#ff0000", 1.24, &policy);
        let slightly_wider = BatchKey::new("#ff0000", 1.26, &policy);
        let wider = BatchKey::new("#ff0000", 1.74, &policy);
        assert_eq!(narrow, slightly_wider);
        assert_ne!(narrow, wider);
        assert_eq!(wider.width(), 1.5);
    }

    #[test]
    fn test_exact_bucket_edge_is_not_lost_to_float_noise() {
        let policy = KeyPolicy::default();
        assert_eq!(policy.quantize(1.5), 1.5);
        assert_eq!(policy.quantize(3.0), 3.0);
    }

    #[test]
    fn test_width_floor() {
        let policy = KeyPolicy::default();
        assert_eq!(BatchKey::new("red", 0.2, &policy).width(), 1.0);
        assert_eq!(BatchKey::new("red", -3.0, &policy).width(), 1.0);
        assert_eq!(BatchKey::new("red", f32::NAN, &policy).width(), 1.0);
    }

    #[test]
    fn test_bad_color_uses_fallback() {
        let policy = KeyPolicy {
            fallback_rgb: 0x00ff00,
            ..KeyPolicy::default()
        };
        assert_eq!(BatchKey::new("not-a-color", 1.0, &policy).rgb(), 0x00ff00);
    }

    #[test]
    fn test_dark_mode_swaps_black_only() {
        let policy = KeyPolicy {
            dark_mode: true,
            ..KeyPolicy::default()
        };
        assert_eq!(BatchKey::new("#000000", 1.0, &policy).rgb(), 0xffffff);
        assert_eq!(BatchKey::new("#ff0000", 1.0, &policy).rgb(), 0xff0000);
        let light = KeyPolicy::default();
        assert_eq!(BatchKey::new("#000000", 1.0, &light).rgb(), 0x000000);
    }

    #[test]
    fn test_policy_from_config() {
        let batch = BatchConfig {
            width_precision: 0.25,
            fallback_color: "#123456".to_string(),
            ..BatchConfig::default()
        };
        let display = DisplayConfig {
            dark_mode: true,
            ..DisplayConfig::default()
        };
        let policy = KeyPolicy::for_lines(&batch, &display);
        assert_eq!(policy.precision, 0.25);
        assert_eq!(policy.fallback_rgb, 0x123456);
        assert!(policy.dark_mode);
        assert_eq!(policy.quantize(1.3), 1.25);
    }
}
