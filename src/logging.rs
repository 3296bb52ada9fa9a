//! Log output setup.
//!
//! The store only emits `tracing` events. Applications embedding it can
//! install their own subscriber, or call [init] for a plain stderr one.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter (e.g. `jsonshelf=debug`).
pub const LOG_ENV: &str = "JSONSHELF_LOG";

/// Filter used when [LOG_ENV] is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs a global fmt subscriber.
///
/// Returns `false` if a global subscriber was already set.
pub fn init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .try_init()
        .is_ok()
}

/// Installs a subscriber that writes through the test harness, once per
/// process.
pub fn init_test() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_test_writer()
            .try_init();
    });
}
