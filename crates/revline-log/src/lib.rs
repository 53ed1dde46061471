//! Structured logging for Revline.
//!
//! Sets up the `tracing` subscriber: human-readable console output plus an
//! optional JSON log file in debug builds. The filter comes from `RUST_LOG`
//! when set, otherwise from the configured log level.

use std::path::Path;

use revline_config::Config;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names one.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written into the log directory.
pub const LOG_FILE_NAME: &str = "revline.log";

/// Filter directive taken from `config`, or [`DEFAULT_FILTER`].
pub fn filter_directive(config: Option<&Config>) -> &str {
    config
        .map(|c| c.debug.log_level.trim())
        .filter(|level| !level.is_empty())
        .unwrap_or(DEFAULT_FILTER)
}

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file
/// * `debug_build` - the file layer is only added in debug builds
/// * `config` - log level and file logging switch
///
/// Fails if a global subscriber is already installed.
///
/// ```no_run
/// use revline_config::Config;
/// use revline_log::init_logging;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./logs")), true, Some(&config)).ok();
/// ```
pub fn init_logging(
    log_dir: Option<&Path>,
    debug_build: bool,
    config: Option<&Config>,
) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true) // the memory monitor runs on its own named thread
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let file_logging = config.is_none_or(|c| c.debug.file_logging);
    if debug_build
        && file_logging
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

        return subscriber.with(file_layer).try_init();
    }

    subscriber.try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_without_config() {
        assert_eq!(filter_directive(None), "info");
    }

    #[test]
    fn test_config_log_level_is_used() {
        let mut config = Config::default();
        config.debug.log_level = "debug,revline_memory=trace".to_string();
        assert_eq!(filter_directive(Some(&config)), "debug,revline_memory=trace");
    }

    #[test]
    fn test_blank_log_level_falls_back() {
        let mut config = Config::default();
        config.debug.log_level = "  ".to_string();
        assert_eq!(filter_directive(Some(&config)), DEFAULT_FILTER);
    }

    #[test]
    fn test_subsystem_filters_parse() {
        for directive in [
            "info",
            "debug,revline_lod=trace",
            "warn,revline_memory=debug,revline_config=info",
        ] {
            assert!(EnvFilter::try_new(directive).is_ok(), "{directive}");
        }
    }

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        let first = init_logging(Some(dir.path()), true, Some(&config));
        let second = init_logging(None, false, None);
        // Another test binary may have installed a subscriber first.
        assert!(first.is_err() || second.is_err());
        if first.is_ok() {
            assert!(dir.path().join(LOG_FILE_NAME).exists());
        }
    }
}
