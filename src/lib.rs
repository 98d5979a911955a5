//! Startup configuration for the heartbeat daemon.
//!
//! - [`config`] loads the TOML application config into a typed [`Config`].
//! - [`logging`] turns a log-topology YAML document into a routing table and
//!   installs it as the process-wide `tracing`/`log` sink.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError};
pub use logging::{LogConfig, LoggingHandle};
