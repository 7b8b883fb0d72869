//! Tracing bootstrap for the engine binary and tests.

use std::env::var;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the default log level.
pub const LOG_LEVEL_ENV: &str = "ENGINE_LOG_LEVEL";
/// Log level used when neither `RUST_LOG` nor [`LOG_LEVEL_ENV`] is set.
pub const DEFAULT_LOG_LEVEL: &str = "debug";

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` when `RUST_LOG` is unset or invalid.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Installs the subscriber with the level taken from [`LOG_LEVEL_ENV`].
pub fn init_from_env() {
    let level = var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string());
    init_tracing(&level);
}
