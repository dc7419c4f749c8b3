//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

/// Installs a test-writer fmt subscriber filtered by `RUST_LOG` (default
/// `warn`). Safe to call from every test; only the first call installs it.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
