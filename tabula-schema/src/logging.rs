//! Logging setup for programs embedding the compiler.
//!
//! The compiler itself only emits `tracing` events; nothing is printed
//! unless a subscriber is installed. These helpers install a
//! `tracing-subscriber` fmt subscriber.
//!
//! # Environment Variables
//!
//! - `TABULA_LOG` - filter directive, e.g. `debug` or `tabula_schema=trace` (default: `warn`)
//! - `TABULA_LOG_FORMAT=json|pretty|compact` - output format (default: compact)
//!
//! # Usage
//!
//! ```rust,no_run
//! use tabula_schema::logging;
//!
//! // Initialize logging (call once at startup)
//! logging::init();
//! ```

use std::env;
use std::sync::Once;

use crate::config::{LogFormat, LoggingConfig};

static INIT: Once = Once::new();

/// Variable holding the filter directive.
pub const LOG_ENV: &str = "TABULA_LOG";

/// Variable holding the output format.
pub const FORMAT_ENV: &str = "TABULA_LOG_FORMAT";

/// The filter directive from `TABULA_LOG`, or `warn`.
pub fn log_level() -> String {
    level_from(env::var(LOG_ENV).ok())
}

/// The format from `TABULA_LOG_FORMAT`, or compact.
pub fn log_format() -> LogFormat {
    format_from(env::var(FORMAT_ENV).ok())
}

fn level_from(var: Option<String>) -> String {
    var.filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "warn".to_string())
}

fn format_from(var: Option<String>) -> LogFormat {
    var.and_then(|f| LogFormat::parse(&f)).unwrap_or_default()
}

/// Initialize logging from the environment.
///
/// Subsequent calls, and calls after any other `init*` function, are no-ops.
pub fn init() {
    install(&log_level(), log_format());
}

/// Initialize logging with a specific filter, keeping the format from the
/// environment.
pub fn init_with_level(level: &str) {
    install(level, log_format());
}

/// Initialize logging from the `[logging]` table of `tabula.toml`.
///
/// `TABULA_LOG` still wins over the configured level when set.
pub fn init_with_config(config: &LoggingConfig) {
    let level = env::var(LOG_ENV).unwrap_or_else(|_| config.level.clone());
    install(&level, config.format);
}

fn install(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        let registry = tracing_subscriber::registry().with(filter);

        // Another subscriber may already be set by the host program.
        let installed = match format {
            LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
            LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
        };

        if installed.is_ok() {
            tracing::info!(level, format = ?format, "tabula logging initialized");
        }
    });
}
