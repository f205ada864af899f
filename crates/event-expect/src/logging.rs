//! Log output for engines and suites.
//!
//! The library only emits `tracing` events; these helpers install a
//! `tracing-subscriber` formatter for binaries and tests that want to see
//! them. `RUST_LOG` takes precedence over the filter passed in.

use crate::result::{ExpectError, ExpectResult};
use tracing_subscriber::EnvFilter;

/// Filter used when none is given
pub const DEFAULT_FILTER: &str = "event_expect=info";

fn env_filter(fallback: &str) -> ExpectResult<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .map_err(|e| ExpectError::configuration(format!("invalid log filter '{fallback}': {e}")))
}

/// Install a stderr formatter. A subscriber that is already installed is
/// left in place.
///
/// # Errors
///
/// Returns a configuration error if the filter does not parse.
pub fn init(filter: &str) -> ExpectResult<()> {
    let filter = env_filter(filter)?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Install a formatter that writes through the test harness's captured
/// output, at debug level for this crate.
pub fn init_for_tests() {
    if let Ok(filter) = env_filter("event_expect=debug") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}
