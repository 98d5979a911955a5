//! Log-topology document (`log4rs.yaml` schema).

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{ConfigError, LoggingConfig, duration};

/// Pattern used by console appenders derived from `[logging]`.
pub const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{h({l})}] {t} - {m}{n}";
/// Pattern used by file appenders derived from `[logging]`.
pub const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {T} {t} - {m}{n}";

/// Parsed log-topology document. Validation happens when the routing table
/// is built.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogConfig {
    /// Re-read interval for the source file; zero disables refresh.
    #[serde(default, with = "duration")]
    pub refresh_rate: Duration,
    #[serde(default)]
    pub appenders: BTreeMap<String, AppenderSpec>,
    pub root: Option<RouteSpec>,
    #[serde(default)]
    pub loggers: BTreeMap<String, RouteSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppenderSpec {
    /// `console`, `file`, `rolling_file` or `syslog`.
    pub kind: Option<String>,
    pub encoder: Option<EncoderSpec>,
    /// Console stream: `stdout` (default) or `stderr`.
    pub target: Option<String>,
    pub path: Option<PathBuf>,
    pub append: Option<bool>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    pub policy: Option<PolicySpec>,
    /// Process name reported to syslog.
    pub process: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EncoderSpec {
    pub kind: Option<String>,
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FilterSpec {
    pub kind: Option<String>,
    pub level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PolicySpec {
    pub kind: Option<String>,
    pub trigger: Option<TriggerSpec>,
    pub roller: Option<RollerSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TriggerSpec {
    pub kind: Option<String>,
    pub limit: Option<SizeSpec>,
}

/// Byte count, either bare (`1048576`) or with a unit (`10 mb`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    Bytes(u64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RollerSpec {
    /// `delete` or `fixed_window`.
    pub kind: Option<String>,
    pub pattern: Option<String>,
    pub count: Option<u32>,
    pub base: Option<u32>,
}

/// Root or named logger route.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RouteSpec {
    pub level: Option<String>,
    #[serde(default)]
    pub appenders: Vec<String>,
    pub additive: Option<bool>,
}

impl LogConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Topology equivalent to the `[logging]` section: a colored console
    /// appender, a size-rolled file appender and a syslog appender, each
    /// present if enabled and all on the root route.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let mut appenders = BTreeMap::new();

        if settings.console_enabled {
            appenders.insert(
                "console".to_string(),
                AppenderSpec {
                    kind: Some("console".to_string()),
                    encoder: Some(EncoderSpec::pattern(CONSOLE_PATTERN)),
                    ..Default::default()
                },
            );
        }

        if settings.file_enabled {
            let roller = if settings.max_files == 0 {
                RollerSpec {
                    kind: Some("delete".to_string()),
                    ..Default::default()
                }
            } else {
                RollerSpec {
                    kind: Some("fixed_window".to_string()),
                    pattern: Some(archive_pattern(&settings.file_path)),
                    count: Some(settings.max_files),
                    base: Some(1),
                }
            };

            appenders.insert(
                "file".to_string(),
                AppenderSpec {
                    kind: Some("rolling_file".to_string()),
                    encoder: Some(EncoderSpec::pattern(FILE_PATTERN)),
                    path: Some(settings.file_path.clone()),
                    append: Some(true),
                    policy: Some(PolicySpec {
                        kind: Some("compound".to_string()),
                        trigger: Some(TriggerSpec {
                            kind: Some("size".to_string()),
                            limit: Some(SizeSpec::Text(format!("{} mb", settings.max_file_size))),
                        }),
                        roller: Some(roller),
                    }),
                    ..Default::default()
                },
            );
        }

        if settings.syslog_enabled {
            appenders.insert(
                "syslog".to_string(),
                AppenderSpec {
                    kind: Some("syslog".to_string()),
                    process: Some(env!("CARGO_PKG_NAME").to_string()),
                    ..Default::default()
                },
            );
        }

        LogConfig {
            refresh_rate: Duration::ZERO,
            root: Some(RouteSpec {
                level: Some(settings.level.as_str().to_string()),
                appenders: appenders.keys().cloned().collect(),
                additive: None,
            }),
            appenders,
            loggers: BTreeMap::new(),
        }
    }
}

impl EncoderSpec {
    fn pattern(pattern: &str) -> Self {
        EncoderSpec {
            kind: Some("pattern".to_string()),
            pattern: Some(pattern.to_string()),
        }
    }
}

/// `logs/app.log` becomes `logs/app.{}.log`.
fn archive_pattern(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "log".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{}.{{}}.{}", stem, ext.to_string_lossy()),
        None => format!("{}.{{}}", stem),
    };
    path.with_file_name(file_name).to_string_lossy().into_owned()
}

/// Parses `1024`, `10kb`, `10 mb`, `1 GB`. Units are binary multiples.
pub(crate) fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let num_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (num_str, unit) = s.split_at(num_end);
    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid size number: {}", num_str))?;

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" | "k" => 1024,
        "mb" | "m" => 1024 * 1024,
        "gb" | "g" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit: {}", other)),
    };

    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size {} overflows", s))
}

impl SizeSpec {
    pub(crate) fn bytes(&self) -> Result<u64, String> {
        match self {
            SizeSpec::Bytes(n) => Ok(*n),
            SizeSpec::Text(s) => parse_size(s),
        }
    }
}
