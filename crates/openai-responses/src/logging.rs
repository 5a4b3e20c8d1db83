//! Logging setup for programs and tests that host a mock.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

fn filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize logging to stderr. `RUST_LOG` applies unless `verbose` is set.
///
/// Does nothing if a global subscriber is already installed.
pub fn init(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(verbose))
        .try_init();
}

/// Initialize logging through the test harness's captured output.
///
/// Safe to call from every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter(false))
        .try_init();
}
