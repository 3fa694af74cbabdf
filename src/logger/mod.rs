//! Structured logging for the decision routing and risk-tilt core
//!
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-component debug control (`--debug router,drift` or `--debug all`)
//! - Dual output: colored console + optional file persistence
//!
//! ## Usage
//!
//! ```rust
//! use riskrouter::logger::{self, LogTag};
//!
//! logger::error(LogTag::Correlation, "[AUDIT-VIOLATION] correlation calculation failed");
//! logger::warning(LogTag::Router, "EnhancedBrain failed, trying next tier");
//! logger::info(LogTag::Drift, "Baseline set for feature atr");
//! logger::debug(LogTag::VolOfVol, "ES vol-of-vol=0.0123"); // Only with --debug volofvol
//! ```
//!
//! Call [`init`] once at startup. Logging before `init` uses the default
//! configuration (Info level, console only).

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger with an explicit configuration
///
/// Opens the file sink when `config.file_path` is set. A failure to open the
/// file is reported on stderr and logging continues on the console only.
pub fn init(config: LoggerConfig) {
    let file_path = config.file_path.clone();
    set_logger_config(config);

    if let Some(path) = file_path {
        if let Err(e) = file::init_file_logging(&path) {
            eprintln!("Failed to open log file '{}': {}", path.display(), e);
        }
    }
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level
///
/// Only shown when debug is enabled for the tag.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level
///
/// Only shown with `--verbose`.
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Force flush pending file writes
pub fn flush() {
    file::flush_file_logging();
}
