//! Field-by-field resolution of raw documents into typed values.
//!
//! Violations are collected rather than returned early so a single load
//! reports every bad field at once.

use std::str::FromStr;
use toml::Value;

use super::ConfigError;

#[derive(Debug, Default)]
pub(crate) struct Fields {
    violations: Vec<ConfigError>,
}

impl Fields {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Non-negative integer that must fit `T`; falls back to `default` on error.
    pub(crate) fn number<T>(&mut self, path: &str, value: Option<Value>, default: T) -> T
    where
        T: TryFrom<i64>,
    {
        let raw = match value {
            None => return default,
            Some(Value::Integer(raw)) => raw,
            Some(other) => {
                self.mismatch(path, "a non-negative integer", &other);
                return default;
            }
        };

        if raw < 0 {
            self.push(ConfigError::invalid(
                path,
                format!("{} is negative, expected a non-negative integer", raw),
            ));
            return default;
        }

        match T::try_from(raw) {
            Ok(v) => v,
            Err(_) => {
                self.push(ConfigError::invalid(path, format!("{} is out of range", raw)));
                default
            }
        }
    }

    pub(crate) fn boolean(&mut self, path: &str, value: Option<Value>, default: bool) -> bool {
        match value {
            None => default,
            Some(Value::Boolean(b)) => b,
            Some(other) => {
                self.mismatch(path, "a boolean", &other);
                default
            }
        }
    }

    /// String value; `None` if absent or of another type (reported).
    pub(crate) fn string(&mut self, path: &str, value: Option<Value>) -> Option<String> {
        match value? {
            Value::String(s) => Some(s),
            other => {
                self.mismatch(path, "a string", &other);
                None
            }
        }
    }

    /// Value parsed through `FromStr`, e.g. severities and environments.
    pub(crate) fn parsed<T>(&mut self, path: &str, value: Option<&str>, default: T) -> T
    where
        T: FromStr<Err = String>,
    {
        match value.map(str::parse::<T>) {
            None => default,
            Some(Ok(v)) => v,
            Some(Err(reason)) => {
                self.push(ConfigError::invalid(path, reason));
                default
            }
        }
    }

    pub(crate) fn required<T>(&mut self, path: &str, value: Option<T>) -> Option<T> {
        if value.is_none() {
            self.push(ConfigError::MissingField(path.to_string()));
        }
        value
    }

    /// Whether a violation was already recorded for `path`.
    pub(crate) fn reported(&self, path: &str) -> bool {
        self.violations.iter().any(|err| match err {
            ConfigError::MissingField(field) | ConfigError::InvalidValue { field, .. } => field == path,
            _ => false,
        })
    }

    pub(crate) fn count(&self) -> usize {
        self.violations.len()
    }

    fn mismatch(&mut self, path: &str, expected: &str, found: &Value) {
        self.push(ConfigError::invalid(
            path,
            format!("expected {}, found {}", expected, found.type_str()),
        ));
    }

    pub(crate) fn push(&mut self, err: ConfigError) {
        self.violations.push(err);
    }

    pub(crate) fn finish(self) -> Result<(), ConfigError> {
        ConfigError::from_violations(self.violations)
    }
}
