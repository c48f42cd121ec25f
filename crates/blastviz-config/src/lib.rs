//! Configuration for the blast-hole visualization core.
//!
//! Settings that the viewer used to read from ambient globals (dark mode,
//! developer mode, batching precision, LOD thresholds) live here as explicit
//! structs. They persist to disk as RON and accept CLI overrides via clap.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{BatchConfig, Config, DebugConfig, DisplayConfig, LodConfig, default_config_dir};
pub use error::ConfigError;
