//! Log sinks: `log4rs` appenders and rollers, plus a syslog appender.

use anyhow::anyhow;
use log4rs::append::Append;
use log4rs::append::console::{self, ConsoleAppender};
use log4rs::append::file::FileAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::policy::compound::roll::Roll;
use log4rs::append::rolling_file::policy::compound::roll::delete::DeleteRoller;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::encode::pattern::PatternEncoder;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use syslog::{Facility, Formatter3164, Logger, LoggerBackend};

/// Console stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Stdout,
    Stderr,
}

impl std::str::FromStr for ConsoleTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(ConsoleTarget::Stdout),
            "stderr" => Ok(ConsoleTarget::Stderr),
            other => Err(format!("unknown console target `{}` (expected stdout or stderr)", other)),
        }
    }
}

impl From<ConsoleTarget> for console::Target {
    fn from(target: ConsoleTarget) -> Self {
        match target {
            ConsoleTarget::Stdout => console::Target::Stdout,
            ConsoleTarget::Stderr => console::Target::Stderr,
        }
    }
}

pub(crate) fn console_appender(target: ConsoleTarget, encoder: PatternEncoder) -> Box<dyn Append> {
    Box::new(
        ConsoleAppender::builder()
            .target(target.into())
            .encoder(Box::new(encoder))
            .build(),
    )
}

/// Opens `path`, creating parent directories. With `append == false` the
/// file is truncated.
pub(crate) fn file_appender(
    path: &Path,
    append: bool,
    encoder: PatternEncoder,
) -> io::Result<Box<dyn Append>> {
    let appender = FileAppender::builder()
        .append(append)
        .encoder(Box::new(encoder))
        .build(path)?;
    Ok(Box::new(appender))
}

/// Rolls the active file with `roller` once it grows past `limit` bytes.
pub(crate) fn rolling_file_appender(
    path: &Path,
    append: bool,
    encoder: PatternEncoder,
    limit: u64,
    roller: Box<dyn Roll>,
) -> io::Result<Box<dyn Append>> {
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(limit)), roller);
    let appender = RollingFileAppender::builder()
        .append(append)
        .encoder(Box::new(encoder))
        .build(path, Box::new(policy))?;
    Ok(Box::new(appender))
}

pub(crate) fn delete_roller() -> Box<dyn Roll> {
    Box::new(DeleteRoller::new())
}

/// Archives go to `pattern` with `{}` replaced by `base ..= base + count - 1`.
pub(crate) fn fixed_window_roller(pattern: &str, base: u32, count: u32) -> Result<Box<dyn Roll>, String> {
    if count == 0 {
        return Err("count must be at least 1".to_string());
    }
    if base.checked_add(count - 1).is_none() {
        return Err(format!("base {} plus count {} overflows the archive index", base, count));
    }

    let roller = FixedWindowRoller::builder()
        .base(base)
        .build(pattern, count)
        .map_err(|e| format!("invalid roller pattern `{}`: {}", pattern, e))?;
    Ok(Box::new(roller))
}

/// Sends the message of each record to the local syslog daemon (RFC 3164,
/// `user` facility).
pub struct SyslogAppender {
    process: String,
    logger: Mutex<Logger<LoggerBackend, Formatter3164>>,
}

impl SyslogAppender {
    /// Connects to the local syslog socket.
    pub fn connect(process: impl Into<String>) -> Result<Self, String> {
        let process = process.into();
        let formatter = Formatter3164 {
            facility: Facility::LOG_USER,
            hostname: None,
            process: process.clone(),
            pid: std::process::id(),
        };

        let logger = syslog::unix(formatter).map_err(|e| format!("cannot connect to syslog: {}", e))?;
        Ok(Self {
            process,
            logger: Mutex::new(logger),
        })
    }
}

impl fmt::Debug for SyslogAppender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogAppender")
            .field("process", &self.process)
            .finish_non_exhaustive()
    }
}

impl Append for SyslogAppender {
    fn append(&self, record: &log::Record<'_>) -> anyhow::Result<()> {
        let message = record.args().to_string();
        let mut logger = self
            .logger
            .lock()
            .map_err(|_| anyhow!("syslog connection poisoned"))?;

        let sent = match record.level() {
            log::Level::Error => logger.err(message),
            log::Level::Warn => logger.warning(message),
            log::Level::Info => logger.info(message),
            log::Level::Debug | log::Level::Trace => logger.debug(message),
        };
        sent.map_err(|e| anyhow!("syslog write failed: {}", e))
    }

    fn flush(&self) {}
}
