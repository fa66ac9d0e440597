//! Logging utilities and structured logging support

pub use log::{debug, info, warn, error, trace};

use crate::core::config::EngineConfig;

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with a default filter
///
/// `RUST_LOG` still takes precedence when it is set. Calling this more than
/// once is harmless; later calls are ignored.
pub fn init_with_level(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .try_init();
}

/// Initialize the logging system from an engine configuration
pub fn init_from_config(config: &EngineConfig) {
    init_with_level(&config.log_filter());
}
