//! Database connection configuration.

use serde::{Deserialize, Serialize};
use toml::Value;

use super::fields::Fields;

/// Database connection parameters handed to the (external) pool builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Schema name.
    pub database: String,
    /// Seed the schema with canned data on startup.
    pub initialize_canned_data: bool,
    pub pool: PoolConfig,
}

/// Connection pool sizing. Timeouts are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub idle_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: "password".to_string(),
            database: "mysql".to_string(),
            initialize_canned_data: false,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 1,
            max_connections: 10,
            connection_timeout: 30,
            idle_timeout: 600,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawDatabase {
    host: Option<Value>,
    port: Option<Value>,
    user: Option<Value>,
    password: Option<Value>,
    database: Option<Value>,
    initialize_canned_data: Option<Value>,
    #[serde(default)]
    pool: RawPool,
}

#[derive(Debug, Default, Deserialize)]
struct RawPool {
    min_connections: Option<Value>,
    max_connections: Option<Value>,
    connection_timeout: Option<Value>,
    idle_timeout: Option<Value>,
}

impl RawDatabase {
    pub(super) fn resolve(self, fields: &mut Fields) -> DatabaseConfig {
        let d = DatabaseConfig::default();
        DatabaseConfig {
            host: fields.string("database.host", self.host).unwrap_or(d.host),
            port: fields.number("database.port", self.port, d.port),
            user: fields.string("database.user", self.user).unwrap_or(d.user),
            password: fields.string("database.password", self.password).unwrap_or(d.password),
            database: fields.string("database.database", self.database).unwrap_or(d.database),
            initialize_canned_data: fields.boolean(
                "database.initialize_canned_data",
                self.initialize_canned_data,
                d.initialize_canned_data,
            ),
            pool: PoolConfig {
                min_connections: fields.number(
                    "database.pool.min_connections",
                    self.pool.min_connections,
                    d.pool.min_connections,
                ),
                max_connections: fields.number(
                    "database.pool.max_connections",
                    self.pool.max_connections,
                    d.pool.max_connections,
                ),
                connection_timeout: fields.number(
                    "database.pool.connection_timeout",
                    self.pool.connection_timeout,
                    d.pool.connection_timeout,
                ),
                idle_timeout: fields.number(
                    "database.pool.idle_timeout",
                    self.pool.idle_timeout,
                    d.pool.idle_timeout,
                ),
            },
        }
    }
}
