//! Structured logging for the blast viewer core.
//!
//! Libraries in this workspace only emit `tracing` events; binaries call
//! [`init_logging`] once to install a subscriber. Console output carries
//! uptime timestamps and module paths, and debug builds can also write a JSON
//! log file. The level comes from `RUST_LOG` first, then from the config.

use blastviz_config::Config;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info";

/// File name of the JSON log written in debug builds.
pub const LOG_FILE_NAME: &str = "blastviz.log";

/// Build the filter string for a config.
///
/// Developer mode raises the batching, LOD and culling crates to `debug` so
/// their per-frame statistics show up without touching `RUST_LOG`.
pub fn filter_for(config: Option<&Config>) -> String {
    let Some(config) = config else {
        return DEFAULT_FILTER.to_string();
    };
    let base = if config.debug.log_level.is_empty() {
        DEFAULT_FILTER
    } else {
        config.debug.log_level.as_str()
    };
    if config.display.developer_mode {
        format!("{base},blastviz_batch=debug,blastviz_lod=debug,blastviz_cull=debug")
    } else {
        base.to_string()
    }
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - whether file logging may be enabled
/// * `config` - optional configuration for the level override
///
/// ```no_run
/// use blastviz_log::init_logging;
///
/// init_logging(None, false, None);
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_for(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// An `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_level() {
        let filter = default_env_filter();
        assert!(format!("{filter}").contains("info"));
    }

    #[test]
    fn test_filter_without_config_is_default() {
        assert_eq!(filter_for(None), DEFAULT_FILTER);
    }

    #[test]
    fn test_filter_uses_config_level() {
        let mut config = Config::default();
        config.debug.log_level = "warn".to_string();
        assert_eq!(filter_for(Some(&config)), "warn");
    }

    #[test]
    fn test_empty_level_falls_back_to_default() {
        let mut config = Config::default();
        config.debug.log_level.clear();
        assert_eq!(filter_for(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_developer_mode_raises_core_crates() {
        let mut config = Config::default();
        config.display.developer_mode = true;
        let filter = filter_for(Some(&config));
        assert!(filter.starts_with("info,"));
        assert!(filter.contains("blastviz_batch=debug"));
        assert!(filter.contains("blastviz_cull=debug"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }

    #[test]
    fn test_env_filter_parsing() {
        for filter_str in ["info", "debug,blastviz_lod=trace", "warn,blastviz_batch=debug"] {
            assert!(
                EnvFilter::try_new(filter_str).is_ok(),
                "Failed to parse filter: {filter_str}"
            );
        }
    }

    #[test]
    fn test_log_file_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(LOG_FILE_NAME);
        assert_eq!(path.file_name().unwrap(), "blastviz.log");
    }
}
