//! Logging initialization using the `tracing` ecosystem.
//!
//! Book notifications are logged with a `[symbol]` prefix by the handlers
//! themselves, so the subscriber stays minimal: level + message on a
//! compact console line, plus an optional daily-rotating file copy.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File prefix for daily-rotating log output.
const LOG_FILE_PREFIX: &str = "plb";

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start. `log_level` is the default filter
/// when the `RUST_LOG` env var is not set (e.g. `"info"`); `log_dir`, when
/// given, adds a plain-text file copy of everything rotated daily under the
/// `plb` prefix.
pub fn init_logging(log_level: &str, log_dir: Option<&str>) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Targets and thread ids are noise here: one binary, one feed thread per
    // book, and every book line already carries its symbol.
    let file_layer = log_dir.map(|dir| {
        fmt::layer()
            .with_writer(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX))
            .with_ansi(false)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();
}
