//! Logging utilities built on the `log` facade

use std::sync::Once;

pub use log::{debug, error, info, trace, warn};

static INIT: Once = Once::new();

/// Initialize the logging system with an `info` default filter.
///
/// `RUST_LOG` overrides the default. Calling this more than once is a no-op.
pub fn init() {
    init_with_filter("info");
}

/// Initialize the logging system with a custom default filter
pub fn init_with_filter(default_filter: &str) {
    INIT.call_once(|| {
        let env = env_logger::Env::default().default_filter_or(default_filter);
        // A host application may already own the global logger.
        let _ = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init();
    });
}
