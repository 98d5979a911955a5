//! Logging bootstrap: turns a log-topology document into a routing table and
//! installs it as the process-wide `tracing` subscriber. Appenders, encoders
//! and rollers are `log4rs` components.
//!
//! `log` records are bridged into `tracing` and routed the same way. The
//! active table sits behind an [`ArcSwap`]; a refresh builds a complete new
//! table and swaps it in, and a refresh that fails keeps the old one.

mod append;
mod document;
mod encoder;
mod layer;
mod record;
mod table;

pub use append::{ConsoleTarget, SyslogAppender};
pub use document::{
    AppenderSpec, CONSOLE_PATTERN, EncoderSpec, FILE_PATTERN, FilterSpec, LogConfig, PolicySpec,
    RollerSpec, RouteSpec, SizeSpec, TriggerSpec,
};
pub use encoder::{DEFAULT_PATTERN, pattern_encoder};
pub use layer::RoutingLayer;
pub use record::LogRecord;
pub use table::{DEFAULT_ROOT_LEVEL, Resolution, RoutingTable};

use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::ConfigError;

static INSTALLED: OnceLock<Arc<ArcSwap<RoutingTable>>> = OnceLock::new();

/// Validate `config`, install it process-wide and return its handle.
///
/// There is no source file to re-read, so `refresh_rate` is ignored.
pub fn load(config: LogConfig) -> Result<LoggingHandle, ConfigError> {
    LoggingHandle::build(config)?.install()
}

/// Like [`load`], reading the document from `path`. Starts the refresh
/// thread when the document sets `refresh_rate`.
pub fn init_file<P: AsRef<Path>>(path: P) -> Result<LoggingHandle, ConfigError> {
    let mut handle = LoggingHandle::from_file(path)?.install()?;
    handle.spawn_refresh()?;
    Ok(handle)
}

/// Snapshot of the installed routing table, if [`load`] or [`init_file`]
/// succeeded in this process.
pub fn active_table() -> Option<Arc<RoutingTable>> {
    INSTALLED.get().map(|table| table.load_full())
}

#[derive(Debug)]
struct Shared {
    table: Arc<ArcSwap<RoutingTable>>,
    source: Option<PathBuf>,
    refresh_errors: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl Shared {
    fn refresh(&self) -> Result<bool, ConfigError> {
        let Some(ref path) = self.source else {
            return Ok(false);
        };

        let result = LogConfig::from_file(path).and_then(|config| {
            if *self.table.load().source() == config {
                return Ok(false);
            }
            let table = RoutingTable::build(config)?;
            self.table.store(Arc::new(table));
            Ok(true)
        });

        match result {
            Ok(changed) => {
                if changed {
                    info!(path = %path.display(), "logging configuration reloaded");
                }
                Ok(changed)
            }
            Err(e) => {
                self.refresh_errors.fetch_add(1, Ordering::Relaxed);
                if let Ok(mut last) = self.last_error.lock() {
                    *last = Some(e.to_string());
                }
                warn!(path = %path.display(), error = %e, "logging refresh failed, keeping previous configuration");
                Err(e)
            }
        }
    }
}

#[derive(Debug)]
struct RefreshTask {
    stop: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// Owner of a routing table.
///
/// Dropping the handle stops refresh, detaches every appender and flushes
/// them, closing their files.
#[derive(Debug)]
pub struct LoggingHandle {
    shared: Arc<Shared>,
    refresh: Option<RefreshTask>,
}

impl LoggingHandle {
    /// Build a table without installing it or enabling refresh.
    pub fn build(config: LogConfig) -> Result<Self, ConfigError> {
        Self::with_source(config, None)
    }

    /// Build a table from the document at `path`; [`Self::refresh`] re-reads it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = LogConfig::from_file(path)?;
        Self::with_source(config, Some(path.to_path_buf()))
    }

    fn with_source(config: LogConfig, source: Option<PathBuf>) -> Result<Self, ConfigError> {
        let table = RoutingTable::build(config)?;
        Ok(Self {
            shared: Arc::new(Shared {
                table: Arc::new(ArcSwap::from_pointee(table)),
                source,
                refresh_errors: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
            refresh: None,
        })
    }

    /// Install as the global `tracing` subscriber and `log` logger.
    pub fn install(self) -> Result<Self, ConfigError> {
        tracing_subscriber::registry()
            .with(self.layer())
            .try_init()
            .map_err(|_| ConfigError::AlreadyInstalled)?;
        let _ = INSTALLED.set(Arc::clone(&self.shared.table));
        Ok(self)
    }

    /// Layer for attaching this table to a caller-built subscriber.
    pub fn layer(&self) -> RoutingLayer {
        RoutingLayer::new(Arc::clone(&self.shared.table))
    }

    /// Current table snapshot.
    pub fn table(&self) -> Arc<RoutingTable> {
        self.shared.table.load_full()
    }

    /// Route `record` through the current table; returns the appender ids written to.
    pub fn dispatch(&self, record: &LogRecord<'_>) -> Vec<String> {
        self.shared
            .table
            .load()
            .dispatch(record)
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn refresh_rate(&self) -> Duration {
        self.shared.table.load().source().refresh_rate
    }

    /// Re-read the source document now. `Ok(true)` if a new table was
    /// installed, `Ok(false)` if the document was unchanged or there is no
    /// source. On error the current table stays active.
    pub fn refresh(&self) -> Result<bool, ConfigError> {
        self.shared.refresh()
    }

    /// Failed refresh attempts so far.
    pub fn refresh_errors(&self) -> u64 {
        self.shared.refresh_errors.load(Ordering::Relaxed)
    }

    pub fn last_refresh_error(&self) -> Option<String> {
        self.shared.last_error.lock().ok().and_then(|last| last.clone())
    }

    /// Start re-reading the source every `refresh_rate`. Does nothing without
    /// a source file, with a zero rate, or if already running.
    ///
    /// The wait restarts after each refresh, so a slow refresh delays the
    /// next one instead of causing a burst. The rate is fixed at spawn time.
    pub fn spawn_refresh(&mut self) -> Result<(), ConfigError> {
        let rate = self.refresh_rate();
        if self.refresh.is_some() || self.shared.source.is_none() || rate.is_zero() {
            return Ok(());
        }

        let (stop, stopped) = mpsc::channel::<()>();
        let shared = Arc::clone(&self.shared);
        let thread = thread::Builder::new()
            .name("log-refresh".to_string())
            .spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(rate) {
                    // Failures are recorded on the handle and logged.
                    let _ = shared.refresh();
                }
            })?;

        self.refresh = Some(RefreshTask { stop, thread });
        Ok(())
    }

    /// Same as dropping the handle.
    pub fn close(self) {}
}

impl Drop for LoggingHandle {
    fn drop(&mut self) {
        if let Some(task) = self.refresh.take() {
            let _ = task.stop.send(());
            let _ = task.thread.join();
        }

        let previous = self.shared.table.swap(Arc::new(RoutingTable::empty()));
        previous.flush();
    }
}

#[cfg(test)]
mod tests;
