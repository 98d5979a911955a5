//! A single log record as seen by the routing table.

use crate::config::Severity;

/// Log record independent of the frontend (`tracing` or `log`) that produced it.
#[derive(Debug, Clone)]
pub struct LogRecord<'a> {
    pub level: Severity,
    /// Namespace used for routing, usually the module path.
    pub target: &'a str,
    pub module_path: Option<&'a str>,
    pub file: Option<&'a str>,
    pub line: Option<u32>,
    pub message: &'a str,
}

impl<'a> LogRecord<'a> {
    pub fn new(level: Severity, target: &'a str, message: &'a str) -> Self {
        Self {
            level,
            target,
            module_path: None,
            file: None,
            line: None,
            message,
        }
    }

    pub fn with_module_path(mut self, module_path: &'a str) -> Self {
        self.module_path = Some(module_path);
        self
    }

    pub fn with_location(mut self, file: &'a str, line: u32) -> Self {
        self.file = Some(file);
        self.line = Some(line);
        self
    }

    /// Run `f` with this record as a `log::Record`, the form appenders take.
    pub fn with_log<R>(&self, f: impl FnOnce(&log::Record<'_>) -> R) -> R {
        f(&log::Record::builder()
            .level(self.level.into())
            .target(self.target)
            .module_path(self.module_path)
            .file(self.file)
            .line(self.line)
            .args(format_args!("{}", self.message))
            .build())
    }
}
