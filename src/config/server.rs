//! HTTP server bind settings.

use serde::{Deserialize, Serialize};
use toml::Value;

use super::fields::Fields;

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    pub enable_cors: bool,
    /// Maximum request body size in bytes.
    pub max_body_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout: 30,
            enable_cors: true,
            max_body_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawServer {
    host: Option<Value>,
    port: Option<Value>,
    request_timeout: Option<Value>,
    enable_cors: Option<Value>,
    max_body_size: Option<Value>,
}

impl RawServer {
    pub(super) fn resolve(self, fields: &mut Fields) -> ServerConfig {
        let d = ServerConfig::default();
        ServerConfig {
            host: fields.string("server.host", self.host).unwrap_or(d.host),
            port: fields.number("server.port", self.port, d.port),
            request_timeout: fields.number(
                "server.request_timeout",
                self.request_timeout,
                d.request_timeout,
            ),
            enable_cors: fields.boolean("server.enable_cors", self.enable_cors, d.enable_cors),
            max_body_size: fields.number("server.max_body_size", self.max_body_size, d.max_body_size),
        }
    }
}
