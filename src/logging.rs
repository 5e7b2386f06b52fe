//! Logging configuration for stride-db.
//!
//! Logs always go to stderr so that stdout carries only query output.

use tracing_subscriber::EnvFilter;

/// Returns the default filter directive for the given `-v` count.
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initializes logging on stderr.
///
/// `RUST_LOG` takes precedence over the verbosity-derived default.
pub fn init_stderr_logging(verbosity: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity))),
        )
        .with_writer(std::io::stderr)
        .init();
}
