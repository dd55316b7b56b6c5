//! Log subscriber setup driven by [`LoggingConfig`].

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// `RUST_LOG` if set and valid, otherwise the configured directive.
fn build_filter(level: &str) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return filter;
        }
    }
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        eprintln!("Invalid logging.level {level:?} ({e}), using \"info\"");
        EnvFilter::new("info")
    })
}

/// Install the global subscriber. A second call leaves the first in place.
pub fn init_tracing(logging: &LoggingConfig) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(&logging.level))
        .with(
            fmt::layer()
                .with_ansi(logging.ansi)
                .with_target(logging.target),
        )
        .try_init();
}
