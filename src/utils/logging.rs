//! Logging initialization.
//!
//! Respects the RUST_LOG environment variable; a filter from the config
//! file applies only when RUST_LOG is unset, and "info" is the fallback
//! when neither is present.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the host's tracing subscriber. RUST_LOG takes precedence
/// over `filter`; with neither set, logs at "info".
pub fn init_logging(filter: Option<&str>) {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter.unwrap_or("info"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .init();
}
