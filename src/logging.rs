//! Tracing subscriber setup for the CLI.

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber.
///
/// Respects `RUST_LOG`; defaults to `warn` so library diagnostics stay out
/// of normal CLI output. Logs go to stderr, results to stdout.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
