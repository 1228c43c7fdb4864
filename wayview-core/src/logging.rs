//! Logging setup for wayview, built on the `tracing` ecosystem.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Initializes the global logging subscriber, directing messages to
/// `stderr`.
///
/// Messages are filtered through `RUST_LOG`, defaulting to `info` when the
/// variable is unset or invalid. ANSI colors are used only when stderr is
/// a TTY. Errors (e.g. a subscriber already being set, as happens across
/// tests) are ignored.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_reentrant() {
        // A second call must not panic even though a global subscriber is
        // already installed.
        init_logging();
        init_logging();
    }
}
