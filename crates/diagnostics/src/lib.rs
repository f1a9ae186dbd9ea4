//! Process-wide logging for the codelist tools.
//!
//! Output goes to stderr through `emit_term`. The level comes from the
//! `CODELIST_LOG` environment variable:
//! - `off` - no logs
//! - `error`, `warn` (default), `info`, `debug`

use std::sync::Once;

// Re-export emit so the macros resolve in dependent crates
pub use emit;

/// Environment variable that selects the log level.
pub const LOG_ENV: &str = "CODELIST_LOG";

const DEFAULT_LEVEL: &str = "warn";

static INIT: Once = Once::new();

/// Level requested by a `CODELIST_LOG` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSetting {
    Off,
    Min(emit::Level),
    /// Unrecognized value, logged at info.
    Unknown,
}

/// Map a `CODELIST_LOG` value onto a level.
pub fn parse_level(value: &str) -> LogSetting {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => LogSetting::Off,
        "error" => LogSetting::Min(emit::Level::Error),
        "warn" | "warning" => LogSetting::Min(emit::Level::Warn),
        "info" => LogSetting::Min(emit::Level::Info),
        "debug" => LogSetting::Min(emit::Level::Debug),
        _ => LogSetting::Unknown,
    }
}

/// Initialize logging from `CODELIST_LOG`.
///
/// Call once at startup. Later calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let value = std::env::var(LOG_ENV).unwrap_or_else(|_| DEFAULT_LEVEL.to_string());

        let min = match parse_level(&value) {
            LogSetting::Off => return,
            LogSetting::Min(level) => level,
            LogSetting::Unknown => emit::Level::Info,
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        if parse_level(&value) == LogSetting::Unknown {
            emit::warn!("unknown {var} value {value}, using info", var: LOG_ENV);
        }

        // The runtime lives for the rest of the process.
        std::mem::forget(rt);
    });
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;

/// Logging macros, re-exported from `emit` so template holes capture the
/// caller's local variables (a `macro_rules!` wrapper would hide them
/// behind macro hygiene).
///
/// - `info!`: routine operations: cache hits, queries submitted, files written.
/// - `debug!`: detail useful when debugging: SQL text, page counts, row counts.
/// - `warn!`: problems that do not stop the current operation, e.g. a failed cache write.
/// - `error!`: failures that end the current operation.
pub use emit::{debug, error, info, warn};
