//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Blast viewer command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "blastviz", about = "Blast-hole instancing and LOD core")]
pub struct CliArgs {
    /// Draw on a dark background.
    #[arg(long)]
    pub dark_mode: Option<bool>,

    /// Log batching and culling statistics every frame.
    #[arg(long)]
    pub developer_mode: Option<bool>,

    /// Initial slot capacity of instance groups.
    #[arg(long)]
    pub capacity: Option<u32>,

    /// LOD band edges in screen pixels, e.g. `--lod-thresholds 10,20,50`.
    #[arg(long, value_delimiter = ',', num_args = 3)]
    pub lod_thresholds: Option<Vec<f32>>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Number of synthetic holes the demo generates.
    #[arg(long)]
    pub holes: Option<usize>,

    /// Number of frames the demo simulates.
    #[arg(long)]
    pub frames: Option<u32>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(dark) = args.dark_mode {
            self.display.dark_mode = dark;
        }
        if let Some(dev) = args.developer_mode {
            self.display.developer_mode = dev;
        }
        if let Some(capacity) = args.capacity {
            self.batching.default_capacity = capacity;
        }
        if let Some(ref t) = args.lod_thresholds
            && t.len() == 3
        {
            self.lod.thresholds_px = [t[0], t[1], t[2]];
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            dark_mode: None,
            developer_mode: None,
            capacity: None,
            lod_thresholds: None,
            log_level: None,
            holes: None,
            frames: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            dark_mode: Some(true),
            capacity: Some(250),
            lod_thresholds: Some(vec![4.0, 8.0, 16.0]),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert!(config.display.dark_mode);
        assert_eq!(config.batching.default_capacity, 250);
        assert_eq!(config.lod.thresholds_px, [4.0, 8.0, 16.0]);
        // Non-overridden fields retain defaults
        assert!(!config.display.developer_mode);
        assert_eq!(config.debug.log_level, "info");
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_threshold_list() {
        let args = CliArgs::parse_from(["blastviz", "--lod-thresholds", "5,10,25", "--holes", "64"]);
        assert_eq!(args.lod_thresholds, Some(vec![5.0, 10.0, 25.0]));
        assert_eq!(args.holes, Some(64));
    }
}
