//! Tracing/logging initialization.
//!
//! Logs always go to stderr so they never interleave with prompts written
//! to stdout.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Build the env filter: `RUST_LOG` if set, otherwise `<crate_target>=<level>`.
pub fn env_filter(crate_target: &str, level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{crate_target}={level}")))
}

/// Initialise the global tracing subscriber from the logging config.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(crate_target: &str, logging: &LoggingConfig) -> bool {
    let filter = env_filter(crate_target, &logging.level);
    let registry = tracing_subscriber::registry().with(filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .is_ok()
    }
}
