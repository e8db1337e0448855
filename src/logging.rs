//! Logging configuration for the gateway.
//!
//! Logs go to stderr so stdout stays clean for the serialized response
//! payload.

use tracing_subscriber::EnvFilter;

/// Initializes stderr logging with an environment-controlled filter.
///
/// Honors `RUST_LOG`; defaults to `info` when unset.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
