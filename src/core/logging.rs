//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! The log level is read from the `FIREFLOW_LOG` environment variable
//! (e.g. "info", "debug"), defaulting to `info`.

use tracing_subscriber::fmt;

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup; calling it again panics, so library
/// consumers that install their own subscriber should skip this.
pub fn init_logging() {
    let level = std::env::var("FIREFLOW_LOG")
        .ok()
        .and_then(|s| parse_level_str(&s))
        .unwrap_or(tracing::Level::INFO);

    fmt()
        .with_max_level(level)
        .with_target(true)
        .init();
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
