//! Tracing setup. Logs go to stderr so command output on stdout stays clean.

use shared::config::{Config, LogFormat};
use std::io;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, util::SubscriberInitExt};

/// Installs the global subscriber and returns the configured level.
///
/// `RUST_LOG` takes precedence over `logging.level`.
pub fn initialize_tracing(config: &Config) -> String {
    let fmt_builder = fmt::fmt()
        .with_env_filter(build_env_filter(config))
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(io::stderr);

    // A second initialisation keeps the first subscriber.
    let _ = if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).finish().try_init()
    } else {
        fmt_builder.with_ansi(true).finish().try_init()
    };

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::WARN);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}
