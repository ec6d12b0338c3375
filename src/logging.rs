//! Logging setup
//!
//! Library code only emits `tracing` events. Binaries and tests call
//! [`init`] to install a formatter; `RUST_LOG` overrides the default filter.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global fmt subscriber
///
/// # Arguments
/// * `default_filter` - Filter used when `RUST_LOG` is unset, e.g. `"info"`
///   or `"ara_bridge=debug"`
///
/// # Returns
/// `false` if a global subscriber was already installed (the call is then a
/// no-op).
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}

/// Subscriber for tests: captured by the test harness, never installed twice
pub fn init_for_tests() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("ara_bridge=debug"))
        .with_test_writer()
        .try_init();
}
