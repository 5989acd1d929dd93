//! Structured logging initialization.
//!
//! `RUST_LOG` takes precedence over the configured level, so operators
//! can raise verbosity per module without touching the config file.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber from a [`LoggingConfig`]. Safe to
/// call more than once; later calls are no-ops.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if config.json_format {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Initialize plain console logging at the default level.
pub fn init_default() {
    init(&LoggingConfig::default());
}
