//! `[logging]` section: level and sink toggles used when no log-topology
//! document is supplied.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use toml::Value;

use super::Severity;
use super::fields::Fields;

/// Logging toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub level: Severity,
    pub file_enabled: bool,
    pub file_path: PathBuf,
    pub console_enabled: bool,
    /// Also send records to the local syslog daemon.
    pub syslog_enabled: bool,
    /// Rotation threshold in megabytes.
    pub max_file_size: u64,
    /// Rotated files to keep.
    pub max_files: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Severity::Info,
            file_enabled: true,
            file_path: PathBuf::from("logs/app.log"),
            console_enabled: true,
            syslog_enabled: true,
            max_file_size: 10,
            max_files: 5,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawLogging {
    level: Option<Value>,
    file_enabled: Option<Value>,
    file_path: Option<Value>,
    console_enabled: Option<Value>,
    syslog_enabled: Option<Value>,
    max_file_size: Option<Value>,
    max_files: Option<Value>,
}

impl RawLogging {
    pub(super) fn resolve(self, fields: &mut Fields) -> LoggingConfig {
        let d = LoggingConfig::default();
        let level = fields.string("logging.level", self.level);
        LoggingConfig {
            level: fields.parsed("logging.level", level.as_deref(), d.level),
            file_enabled: fields.boolean("logging.file_enabled", self.file_enabled, d.file_enabled),
            file_path: fields
                .string("logging.file_path", self.file_path)
                .map(PathBuf::from)
                .unwrap_or(d.file_path),
            console_enabled: fields.boolean(
                "logging.console_enabled",
                self.console_enabled,
                d.console_enabled,
            ),
            syslog_enabled: fields.boolean(
                "logging.syslog_enabled",
                self.syslog_enabled,
                d.syslog_enabled,
            ),
            max_file_size: fields.number("logging.max_file_size", self.max_file_size, d.max_file_size),
            max_files: fields.number("logging.max_files", self.max_files, d.max_files),
        }
    }
}
