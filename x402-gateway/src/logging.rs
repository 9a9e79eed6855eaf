//! Structured logging setup.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "x402_gateway=info,tower_http=info";

/// Initializes the global `tracing` subscriber from `RUST_LOG`, falling back
/// to a sensible default when the variable is unset or invalid.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
