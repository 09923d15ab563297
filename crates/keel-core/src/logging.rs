//! Logging integration for keel.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating per-migration spans.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info", "warn",
/// "error"). In debug mode a pretty, human-readable format is used; otherwise a
/// structured JSON format is used. Installing a second subscriber is a no-op.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .with_writer(std::io::stderr)
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for applying or reverting a single migration.
///
/// Every log entry emitted while the span is entered carries the migration
/// version and the direction it is being run in.
///
/// # Examples
///
/// ```
/// use keel_core::logging::migration_span;
///
/// let span = migration_span("20250101000003", "up");
/// let _guard = span.enter();
/// tracing::info!("applying migration");
/// ```
pub fn migration_span(version: &str, direction: &str) -> tracing::Span {
    tracing::info_span!("migration", version = version, direction = direction)
}
