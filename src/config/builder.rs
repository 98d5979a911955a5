//! Programmatic configuration construction.

use super::{Config, ConfigError, Environment, Severity};

/// Builds a [`Config`] from defaults, validating on [`ConfigBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_host(mut self, host: impl Into<String>) -> Self {
        self.config.database.host = host.into();
        self
    }

    pub fn database_port(mut self, port: u16) -> Self {
        self.config.database.port = port;
        self
    }

    pub fn database_user(mut self, user: impl Into<String>) -> Self {
        self.config.database.user = user.into();
        self
    }

    pub fn database_password(mut self, password: impl Into<String>) -> Self {
        self.config.database.password = password.into();
        self
    }

    pub fn database_name(mut self, database: impl Into<String>) -> Self {
        self.config.database.database = database.into();
        self
    }

    pub fn server_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn log_level(mut self, level: Severity) -> Self {
        self.config.logging.level = level;
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.app.name = name.into();
        self
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.config.app.environment = environment;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.app.debug = debug;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
