//! Diagnostic logging setup.
//!
//! Logs go to stderr through `tracing-subscriber`, leaving stdout for the
//! progress lines an operator reads. `RUST_LOG` takes precedence over
//! `logging.level` when set.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Build the filter from `RUST_LOG`, falling back to the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
