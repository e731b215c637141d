//! Diagnostics for the `aims` CLI and tutorials.
//!
//! Tracing goes to stderr only. Calculation artifacts (`aims.out`,
//! `aims.err`, the written inputs) live in the calculation directory and are
//! unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn`. Compact format on stderr so
/// stdout stays machine-readable. Calling it twice is a no-op.
///
/// ```bash
/// RUST_LOG=aims=debug aims run job.toml
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .ok();
}
