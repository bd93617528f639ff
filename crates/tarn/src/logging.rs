//! Log output setup.
//!
//! Every Tarn crate logs through `tracing`. Applications that want the
//! output on stderr call [`init`] once at startup; `RUST_LOG` overrides
//! the default level.

use tracing_subscriber::EnvFilter;

/// Error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install a formatted stderr subscriber. Defaults to `info`, or `debug`
/// when `verbose` is set.
pub fn init(verbose: bool) -> Result<(), InitError> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}
