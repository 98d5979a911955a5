//! Configuration error types.

use thiserror::Error;

/// Configuration loading error.
///
/// Shared by the application config loader and the logging bootstrapper.
/// Everything except a failed logging refresh is fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("{route} references unknown appender `{appender}`")]
    UnresolvedReference { route: String, appender: String },
    #[error("failed to parse config: {0}")]
    Parse(#[from] ParseError),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{}", join(.0))]
    Multiple(Vec<ConfigError>),
    #[error("a global logger is already installed")]
    AlreadyInstalled,
}

/// Underlying document syntax error.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("document is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Collapses collected violations: none is success, one is returned as is.
    pub(crate) fn from_violations(mut violations: Vec<ConfigError>) -> Result<(), ConfigError> {
        match violations.len() {
            0 => Ok(()),
            1 => Err(violations.remove(0)),
            _ => Err(ConfigError::Multiple(violations)),
        }
    }

    /// Flattened view over this error and any errors it groups.
    pub fn violations(&self) -> Vec<&ConfigError> {
        match self {
            ConfigError::Multiple(errors) => errors.iter().flat_map(|e| e.violations()).collect(),
            other => vec![other],
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err.into())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.into())
    }
}

fn join(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
