//! Subscriber setup: a rolling file sink plus, in text mode, a stdout sink.
//!
//! The filter is `RUST_LOG` when set, otherwise `log_level` followed by the
//! per-target `log_directives` from the config (e.g. `sqlx=warn`).

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Filter string built from the config alone
pub fn filter_directives(config: &AppConfig) -> String {
    std::iter::once(config.log_level.as_str())
        .chain(config.log_directives.iter().map(String::as_str))
        .filter(|d| !d.trim().is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn rotation(name: &str) -> Rotation {
    match name {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Install the global subscriber. Keep the guard alive for the process lifetime,
/// dropping it flushes and stops the file writer.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender = RollingFileAppender::new(
        rotation(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(writer).with_ansi(false))
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    tracing::debug!(filter = %filter_directives(config), "logging initialized");
    guard
}
