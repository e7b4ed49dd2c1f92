use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const DEFAULT_FILTER: &str = "dynaquery=info";

/// Install a global subscriber: fmt output filtered by `RUST_LOG` (falling
/// back to [`DEFAULT_FILTER`]), plus the span-trace layer `color-eyre` reports
/// read from. Returns `false` if a subscriber was already installed.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(ErrorLayer::default())
        .try_init()
        .is_ok()
}

/// Like [`init`], but writes through the test harness so output is captured.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .with(ErrorLayer::default())
        .try_init();
}
