//! Global logger configuration

use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level shown (Error is always shown)
    pub min_level: LogLevel,
    /// Tags with debug output enabled
    pub debug_tags: HashSet<LogTag>,
    /// Console output switch (file output is unaffected)
    pub console_enabled: bool,
    /// Optional log file
    pub file_path: Option<PathBuf>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
            console_enabled: true,
            file_path: None,
        }
    }
}

impl LoggerConfig {
    /// Build from `--debug` values; `all` enables every tag
    pub fn with_debug_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            if key.eq_ignore_ascii_case("all") {
                self.debug_tags.extend(LogTag::all().iter().copied());
            } else if let Some(tag) = LogTag::from_debug_key(key) {
                self.debug_tags.insert(tag);
            }
        }
        if !self.debug_tags.is_empty() && self.min_level < LogLevel::Debug {
            self.min_level = LogLevel::Debug;
        }
        self
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG.read().clone()
}

pub fn set_logger_config(config: LoggerConfig) {
    *LOGGER_CONFIG.write() = config;
}

pub(crate) fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    LOGGER_CONFIG.read().debug_tags.contains(tag)
}
