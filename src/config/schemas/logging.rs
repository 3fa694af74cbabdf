/// Logging configuration
use crate::config_struct;
use crate::logger::{LogLevel, LoggerConfig};
use std::path::PathBuf;

config_struct! {
    pub struct LoggingConfig {
        level: LogLevel = LogLevel::Info,
        /// Tags with debug output (`all` for every tag)
        debug_tags: Vec<String> = Vec::new(),
        console: bool = true,
        file_path: Option<String> = None,
    }
}

impl LoggingConfig {
    pub fn to_logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            min_level: self.level,
            console_enabled: self.console,
            file_path: self.file_path.as_ref().map(PathBuf::from),
            ..LoggerConfig::default()
        }
        .with_debug_keys(&self.debug_tags)
    }
}
