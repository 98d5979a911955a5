//! Application configuration loading and validation.
//!
//! Uses `toml` to load the application config file. Every section is
//! optional and falls back to its documented defaults; only `app.name` is
//! required. Environment variables (optionally from a `.env` file) may
//! override connection settings.

mod app;
mod builder;
mod database;
pub(crate) mod duration;
mod error;
pub(crate) mod fields;
mod logging;
mod server;
mod severity;

pub use app::{AppConfig, CacheConfig, Environment};
pub use builder::ConfigBuilder;
pub use database::{DatabaseConfig, PoolConfig};
pub use error::{ConfigError, ParseError};
pub use logging::LoggingConfig;
pub use server::ServerConfig;
pub use severity::Severity;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

use fields::Fields;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub app: AppConfig,
}

/// Document as written; every key optional so defaults and violations can be
/// resolved per field.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    database: database::RawDatabase,
    #[serde(default)]
    server: server::RawServer,
    #[serde(default)]
    logging: logging::RawLogging,
    #[serde(default)]
    app: app::RawApp,
}

impl Config {
    /// Load configuration from a TOML file, then apply environment overrides.
    ///
    /// Loads a `.env` file first if one exists. `app.version` is replaced by
    /// the crate version. Recognized variables:
    /// `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`, `MYSQL_PASSWORD`,
    /// `MYSQL_DATABASE`, `SERVER_HOST`, `SERVER_PORT`, `APP_ENV`, `APP_DEBUG`,
    /// `LOG_LEVEL`, `LOG_FILE_PATH`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore error if not found)
        dotenvy::dotenv().ok();

        let mut config = Self::load_from_file(path)?;
        // The running binary reports its own version.
        config.app.version = env!("CARGO_PKG_VERSION").to_string();
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file without consulting the environment.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse raw document bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let content = std::str::from_utf8(bytes).map_err(ParseError::from)?;
        Self::from_toml_str(content)
    }

    /// Parse a TOML document, apply defaults and validate every field.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(content)?;

        let mut fields = Fields::new();
        let config = Config {
            database: raw.database.resolve(&mut fields),
            server: raw.server.resolve(&mut fields),
            logging: raw.logging.resolve(&mut fields),
            app: raw.app.resolve(&mut fields),
        };
        config.check(&mut fields);
        fields.finish()?;

        Ok(config)
    }

    /// Apply overrides from a key lookup, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut fields = Fields::new();

        if let Some(host) = lookup("MYSQL_HOST") {
            self.database.host = host;
        }
        if let Some(port) = lookup("MYSQL_PORT") {
            self.database.port = parse_override(&mut fields, "MYSQL_PORT", &port, self.database.port);
        }
        if let Some(user) = lookup("MYSQL_USER") {
            self.database.user = user;
        }
        if let Some(password) = lookup("MYSQL_PASSWORD") {
            self.database.password = password;
        }
        if let Some(database) = lookup("MYSQL_DATABASE") {
            self.database.database = database;
        }

        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            self.server.port = parse_override(&mut fields, "SERVER_PORT", &port, self.server.port);
        }

        if let Some(environment) = lookup("APP_ENV") {
            self.app.environment = fields.parsed("APP_ENV", Some(environment.as_str()), self.app.environment);
        }
        if let Some(debug) = lookup("APP_DEBUG") {
            self.app.debug = parse_override(&mut fields, "APP_DEBUG", &debug, self.app.debug);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = fields.parsed("LOG_LEVEL", Some(level.as_str()), self.logging.level);
        }
        if let Some(file_path) = lookup("LOG_FILE_PATH") {
            self.logging.file_path = PathBuf::from(file_path);
        }

        fields.finish()
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut fields = Fields::new();
        self.check(&mut fields);
        fields.finish()
    }

    fn check(&self, fields: &mut Fields) {
        if self.app.name.trim().is_empty() {
            // A missing name is already reported by the resolver.
            if !fields.reported("app.name") {
                fields.push(ConfigError::invalid("app.name", "must not be empty"));
            }
        }

        if self.database.port == 0 {
            fields.push(ConfigError::invalid("database.port", "cannot be 0"));
        }

        if self.server.port == 0 {
            fields.push(ConfigError::invalid("server.port", "cannot be 0"));
        }

        if self.logging.file_enabled && self.logging.max_file_size == 0 {
            fields.push(ConfigError::invalid("logging.max_file_size", "must be at least 1 MB"));
        }

        let pool = &self.database.pool;
        if pool.min_connections > pool.max_connections {
            fields.push(ConfigError::invalid(
                "database.pool.min_connections",
                format!(
                    "{} cannot be greater than max_connections ({})",
                    pool.min_connections, pool.max_connections
                ),
            ));
        }

        if let Some(ref cache) = self.app.cache {
            if cache.default_interval > cache.max_interval {
                fields.push(ConfigError::invalid(
                    "app.cache.default_interval",
                    format!(
                        "{} cannot be greater than max_interval ({})",
                        cache.default_interval, cache.max_interval
                    ),
                ));
            }
        }
    }

    /// Serialize to pretty TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Database connection URL.
    pub fn database_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.database.user,
            self.database.password,
            self.database.host,
            self.database.port,
            self.database.database
        )
    }

    /// Server bind address.
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn is_production(&self) -> bool {
        self.app.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.app.environment == Environment::Development
    }

    pub fn cache_enabled(&self) -> bool {
        self.app.cache.is_some()
    }
}

fn parse_override<T: std::str::FromStr>(fields: &mut Fields, key: &str, value: &str, current: T) -> T {
    match value.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            fields.push(ConfigError::invalid(key, format!("cannot parse `{}`", value)));
            current
        }
    }
}
