use hbd_config::config::{Config, ConfigError};
use hbd_config::logging::{self, LogConfig, LoggingHandle};
use std::env;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_LOG_CONFIG_PATH: &str = "log4rs.yaml";

fn parse_flag(prefix: &str, default: &str) -> String {
    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix(prefix) {
            return value.to_string();
        }
    }
    default.to_string()
}

/// Installs the log-topology document if present, otherwise a topology
/// derived from the `[logging]` section.
fn init_logging(log_config_path: &str, config: &Config) -> Result<LoggingHandle, ConfigError> {
    if Path::new(log_config_path).exists() {
        logging::init_file(log_config_path)
    } else {
        logging::load(LogConfig::from_settings(&config.logging))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = parse_flag("--config=", DEFAULT_CONFIG_PATH);
    let log_config_path = parse_flag("--log-config=", DEFAULT_LOG_CONFIG_PATH);
    let watch = env::args().any(|arg| arg == "--watch");

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    let handle = match init_logging(&log_config_path, &config) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Failed to initialize logging from {}: {}", log_config_path, e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        config = %config_path,
        app = %config.app.name,
        version = %config.app.version,
        environment = %config.app.environment,
        "Configuration loaded"
    );
    debug!(debug = config.app.debug, "Debug mode");
    info!(
        database = %config.database.host,
        port = config.database.port,
        pool_min = config.database.pool.min_connections,
        pool_max = config.database.pool.max_connections,
        "Database settings"
    );
    info!(address = %config.server_address(), cors = config.server.enable_cors, "Server settings");

    match config.app.cache {
        Some(ref cache) => debug!(
            default_interval = cache.default_interval,
            max_interval = cache.max_interval,
            auto_cleanup = cache.auto_cleanup,
            "Heartbeat cache enabled"
        ),
        None => debug!("Heartbeat cache disabled"),
    }

    if config.logging.syslog_enabled && !handle.table().appender_ids().any(|id| id == "syslog") {
        warn!("Syslog enabled but no syslog appender is active, continuing without syslog");
    }

    if watch {
        info!(
            refresh_rate = ?handle.refresh_rate(),
            "Watching logging configuration (press Ctrl+C to stop)"
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
        }
    }

    handle.close();
    ExitCode::SUCCESS
}
