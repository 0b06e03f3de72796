//! Logging initialization and configuration.
//!
//! Uses the `tracing` ecosystem for structured logging with support for
//! both human-readable and JSON output formats.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

/// Initialize the logging subsystem.
///
/// # Arguments
///
/// * `verbose` - If true, enables DEBUG level logging; otherwise INFO level.
/// * `json_format` - If true, outputs structured JSON logs; otherwise pretty-printed.
///
/// # Notes
///
/// - Log output goes to stderr (stdout is reserved for data output)
/// - The RUST_LOG environment variable can override the log level
/// - A second call is a no-op, so tests and host applications may call it freely
pub fn init(verbose: bool, json_format: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    init_with_level(default_level, json_format);
}

/// Initialize logging with configuration from Config.
///
/// `verbose_override` forces DEBUG; `json_logs_override` forces JSON output.
pub fn init_from_config(config: &Config, verbose_override: bool, json_logs_override: bool) {
    let level = if verbose_override {
        "debug".to_string()
    } else {
        config.logging.level.to_lowercase()
    };
    let json_format = json_logs_override || config.logging.format.eq_ignore_ascii_case("json");
    init_with_level(&level, json_format);
}

fn init_with_level(default_level: &str, json_format: bool) {
    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let result = if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized; keeping the existing subscriber");
    }
}
