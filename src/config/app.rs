//! Application-level configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use toml::Value;

use super::fields::Fields;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "unknown environment `{}` (expected one of development, staging, production)",
                other
            )),
        }
    }
}

/// Application metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    /// Application name used in logs.
    pub name: String,
    pub version: String,
    pub environment: Environment,
    pub debug: bool,
    /// Heartbeat cache tunables; `None` means caching is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
}

/// Heartbeat cache tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheConfig {
    /// Default heartbeat interval in seconds.
    pub default_interval: u64,
    /// Largest heartbeat interval a device may request, in seconds.
    pub max_interval: u64,
    pub auto_cleanup: bool,
    /// Hours between cleanup passes.
    pub cleanup_interval: u64,
    /// Records older than this many days are dropped.
    pub max_record_age: u32,
}

/// The name has no default; a configuration must set it.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            debug: false,
            cache: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_interval: 300,
            max_interval: 3600,
            auto_cleanup: true,
            cleanup_interval: 24,
            max_record_age: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawApp {
    name: Option<Value>,
    version: Option<Value>,
    environment: Option<Value>,
    debug: Option<Value>,
    cache: Option<RawCache>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCache {
    default_interval: Option<Value>,
    max_interval: Option<Value>,
    auto_cleanup: Option<Value>,
    cleanup_interval: Option<Value>,
    max_record_age: Option<Value>,
}

impl RawApp {
    pub(super) fn resolve(self, fields: &mut Fields) -> AppConfig {
        let d = AppConfig::default();
        let name = fields
            .required("app.name", self.name)
            .and_then(|name| fields.string("app.name", Some(name)));
        let environment = fields.string("app.environment", self.environment);
        AppConfig {
            name: name.unwrap_or_default(),
            version: fields.string("app.version", self.version).unwrap_or(d.version),
            environment: fields.parsed("app.environment", environment.as_deref(), d.environment),
            debug: fields.boolean("app.debug", self.debug, d.debug),
            cache: self.cache.map(|raw| raw.resolve(fields)),
        }
    }
}

impl RawCache {
    fn resolve(self, fields: &mut Fields) -> CacheConfig {
        let d = CacheConfig::default();
        CacheConfig {
            default_interval: fields.number(
                "app.cache.default_interval",
                self.default_interval,
                d.default_interval,
            ),
            max_interval: fields.number("app.cache.max_interval", self.max_interval, d.max_interval),
            auto_cleanup: fields.boolean("app.cache.auto_cleanup", self.auto_cleanup, d.auto_cleanup),
            cleanup_interval: fields.number(
                "app.cache.cleanup_interval",
                self.cleanup_interval,
                d.cleanup_interval,
            ),
            max_record_age: fields.number(
                "app.cache.max_record_age",
                self.max_record_age,
                d.max_record_age,
            ),
        }
    }
}
