use std::env;

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when it is set.
pub fn init_tracing_logger(default_filter: &str) {
    let rust_log = env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let env_filter = match rust_log.is_empty() {
        true => EnvFilter::builder().parse_lossy(default_filter),
        false => EnvFilter::builder().parse_lossy(rust_log),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(detect_ansi_support())
        .init();
}

pub fn detect_ansi_support() -> bool {
    // Log output goes to stdout. When it is piped into a file (the capture scripts do this) we
    // want plain text.
    if !atty::is(atty::Stream::Stdout) {
        return false;
    }

    env::var("TERM").map(|term| term != "dumb").unwrap_or(false)
}
