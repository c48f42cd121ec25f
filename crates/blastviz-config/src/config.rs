//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Instance allocator and line/point batching settings.
    pub batching: BatchConfig,
    /// Pixel-size level-of-detail settings.
    pub lod: LodConfig,
    /// Display mode flags.
    pub display: DisplayConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Instance allocator and line/point batch settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchConfig {
    /// Initial slot capacity of a newly created instance group.
    pub default_capacity: u32,
    /// Line widths are rounded to a multiple of this value when building batch keys.
    pub width_precision: f32,
    /// Smallest line width a batch key can carry.
    pub min_width: f32,
    /// Point sizes are rounded to a multiple of this value when building batch keys.
    pub size_precision: f32,
    /// Smallest point size a batch key can carry.
    pub min_size: f32,
    /// Segment count used for circles when the caller passes zero.
    pub circle_segments: u32,
    /// Color used when a caller-supplied color cannot be parsed.
    pub fallback_color: String,
}

/// Pixel-size LOD settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LodConfig {
    /// Ascending screen-pixel band edges: point-only / point-track / simple / full.
    pub thresholds_px: [f32; 3],
    /// World extent substituted for zero, negative or non-finite extents.
    pub min_extent: f32,
    /// Time budget in milliseconds for one incremental reclassification pass.
    pub frame_budget_ms: f32,
    /// How many objects are classified between two clock reads.
    pub budget_check_interval: u32,
}

/// Display mode flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    /// Dark background; pure black line and point colors are drawn white.
    pub dark_mode: bool,
    /// Developer mode: per-frame batching and culling statistics are logged.
    pub developer_mode: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Write a JSON log file next to the config in debug builds.
    pub log_to_file: bool,
}

// --- Default implementations ---

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_capacity: 1000,
            width_precision: 0.5,
            min_width: 1.0,
            size_precision: 0.5,
            min_size: 1.0,
            circle_segments: 32,
            fallback_color: "#ffffff".to_string(),
        }
    }
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            thresholds_px: [10.0, 20.0, 50.0],
            min_extent: 0.1,
            frame_budget_ms: 4.0,
            budget_check_interval: 256,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
        }
    }
}

/// Platform config directory for the viewer, e.g. `~/.config/blastviz`.
///
/// Falls back to the current directory when the platform has none.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("blastviz"))
        .unwrap_or_else(|| PathBuf::from("."))
}

// --- Validation ---

impl Config {
    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.batching;
        if b.default_capacity == 0 {
            return Err(ConfigError::Invalid(
                "batching.default_capacity must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("batching.width_precision", b.width_precision),
            ("batching.size_precision", b.size_precision),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }

        let t = self.lod.thresholds_px;
        if !(t[0] > 0.0 && t[0] < t[1] && t[1] < t[2]) {
            return Err(ConfigError::Invalid(format!(
                "lod.thresholds_px must be positive and strictly increasing, got {t:?}"
            )));
        }
        if !(self.lod.min_extent.is_finite() && self.lod.min_extent > 0.0) {
            return Err(ConfigError::Invalid(
                "lod.min_extent must be a positive number".to_string(),
            ));
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

/// Read, parse and validate one config file.
fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}
