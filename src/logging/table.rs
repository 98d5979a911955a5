//! Routing table: resolved appenders plus namespace routes.
//!
//! A table is built once from a [`LogConfig`] and never mutated; refresh
//! replaces the whole table.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use log4rs::append::Append;
use log4rs::append::rolling_file::policy::compound::roll::Roll;
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;
use log4rs::filter::{Filter, Response};

use super::append::{self, ConsoleTarget, SyslogAppender};
use super::document::{AppenderSpec, LogConfig, PolicySpec, RouteSpec};
use super::encoder;
use super::record::LogRecord;
use crate::config::fields::Fields;
use crate::config::{ConfigError, Severity};

/// Level used when the document has no `root.level`.
pub const DEFAULT_ROOT_LEVEL: Severity = Severity::Debug;

#[derive(Debug)]
struct Target {
    filters: Vec<Box<dyn Filter>>,
    sink: Box<dyn Append>,
}

impl Target {
    fn accepts(&self, record: &log::Record<'_>) -> bool {
        for filter in &self.filters {
            match filter.filter(record) {
                Response::Accept => return true,
                Response::Neutral => {}
                Response::Reject => return false,
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Route {
    level: Option<Severity>,
    appenders: Vec<String>,
    additive: bool,
}

/// Effective level and appender set for a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub level: Severity,
    pub appenders: Vec<String>,
}

#[derive(Debug)]
pub struct RoutingTable {
    appenders: BTreeMap<String, Target>,
    root_level: Severity,
    root_appenders: Vec<String>,
    routes: HashMap<String, Route>,
    /// Most verbose level any route lets through.
    min_level: Severity,
    source: LogConfig,
}

/// Validated appender description; files are opened only after the whole
/// document validates.
enum Plan {
    Console(ConsoleTarget),
    File {
        path: PathBuf,
        append: bool,
    },
    Rolling {
        path: PathBuf,
        append: bool,
        limit: u64,
        roller: Box<dyn Roll>,
    },
    Syslog {
        process: String,
    },
}

struct AppenderPlan {
    id: String,
    thresholds: Vec<Severity>,
    encoder: PatternEncoder,
    plan: Plan,
}

impl RoutingTable {
    /// Validate `config` and open its appenders.
    pub fn build(config: LogConfig) -> Result<Self, ConfigError> {
        let mut fields = Fields::new();

        let mut plans = Vec::new();
        for (id, spec) in &config.appenders {
            if let Some(plan) = plan_appender(id, spec, &mut fields) {
                plans.push(plan);
            }
        }

        let root = config.root.clone().unwrap_or_default();
        let root_level = fields.parsed("root.level", root.level.as_deref(), DEFAULT_ROOT_LEVEL);
        check_references("root", &root.appenders, &config, &mut fields);

        let mut routes = HashMap::new();
        for (name, spec) in &config.loggers {
            let path = format!("loggers.{}", name);
            let route = plan_route(&path, spec, &config, &mut fields);
            routes.insert(normalize(name).into_owned(), route);
        }

        fields.finish()?;

        let mut appenders = BTreeMap::new();
        let mut fields = Fields::new();
        for AppenderPlan {
            id,
            thresholds,
            encoder,
            plan,
        } in plans
        {
            let filters = thresholds
                .into_iter()
                .map(|level| {
                    let level = log::Level::from(level).to_level_filter();
                    Box::new(ThresholdFilter::new(level)) as Box<dyn Filter>
                })
                .collect();

            match open_appender(&id, plan, encoder) {
                Ok(Some(sink)) => {
                    appenders.insert(id, Target { filters, sink });
                }
                Ok(None) => {}
                Err(e) => fields.push(ConfigError::invalid(
                    format!("appenders.{}.path", id),
                    format!("cannot open log file: {}", e),
                )),
            }
        }
        fields.finish()?;

        let min_level = routes
            .values()
            .filter_map(|r: &Route| r.level)
            .fold(root_level, Ord::min);

        Ok(Self {
            appenders,
            root_level,
            root_appenders: root.appenders,
            routes,
            min_level,
            source: config,
        })
    }

    /// Table without appenders; every record is dropped.
    pub fn empty() -> Self {
        Self {
            appenders: BTreeMap::new(),
            root_level: Severity::Error,
            root_appenders: Vec::new(),
            routes: HashMap::new(),
            min_level: Severity::Error,
            source: LogConfig::default(),
        }
    }

    /// Walks from `namespace` up through its ancestors to root.
    ///
    /// The most specific route with a level decides the level. Appenders
    /// accumulate along the walk until a non-additive route, whose own
    /// appenders are still included.
    pub fn resolve(&self, namespace: &str) -> Resolution {
        let namespace = normalize(namespace);
        let mut level = None;
        let mut appenders: Vec<String> = Vec::new();
        let mut accumulating = true;

        let mut current = Some(namespace.as_ref());
        while let Some(name) = current {
            if let Some(route) = self.routes.get(name) {
                if level.is_none() {
                    level = route.level;
                }
                if accumulating {
                    extend_unique(&mut appenders, &route.appenders);
                    accumulating = route.additive;
                }
                if !accumulating && level.is_some() {
                    break;
                }
            }
            current = parent(name);
        }

        if accumulating {
            extend_unique(&mut appenders, &self.root_appenders);
        }

        Resolution {
            level: level.unwrap_or(self.root_level),
            appenders,
        }
    }

    /// Sends `record` to every appender that accepts it and returns the ids
    /// written to. Sink failures are reported on stderr and skipped.
    pub fn dispatch(&self, record: &LogRecord<'_>) -> Vec<&str> {
        let resolution = self.resolve(record.target);
        if record.level < resolution.level {
            return Vec::new();
        }

        record.with_log(|record| {
            let mut delivered = Vec::new();
            for id in &resolution.appenders {
                let Some((id, target)) = self.appenders.get_key_value(id) else {
                    continue;
                };
                if !target.accepts(record) {
                    continue;
                }
                match target.sink.append(record) {
                    Ok(()) => delivered.push(id.as_str()),
                    Err(e) => eprintln!("log appender `{}` failed: {}", id, e),
                }
            }
            delivered
        })
    }

    /// Cheap pre-filter: false only if no route could accept `level`.
    pub fn enabled(&self, level: Severity) -> bool {
        level >= self.min_level
    }

    pub fn flush(&self) {
        for target in self.appenders.values() {
            target.sink.flush();
        }
    }

    pub fn appender_ids(&self) -> impl Iterator<Item = &str> {
        self.appenders.keys().map(String::as_str)
    }

    /// Document the table was built from.
    pub fn source(&self) -> &LogConfig {
        &self.source
    }
}

impl Drop for RoutingTable {
    fn drop(&mut self) {
        self.flush();
    }
}

fn plan_appender(id: &str, spec: &AppenderSpec, fields: &mut Fields) -> Option<AppenderPlan> {
    let base = format!("appenders.{}", id);
    let before = fields.count();

    let encoder = match spec.encoder {
        Some(ref encoder) => {
            if let Some(kind) = encoder.kind.as_deref().filter(|k| *k != "pattern") {
                fields.push(ConfigError::invalid(
                    format!("{}.encoder.kind", base),
                    format!("unknown encoder `{}`", kind),
                ));
            }
            match encoder.pattern.as_deref().map(encoder::pattern_encoder) {
                None => encoder::default_encoder(),
                Some(Ok(encoder)) => encoder,
                Some(Err(reason)) => {
                    fields.push(ConfigError::invalid(format!("{}.encoder.pattern", base), reason));
                    encoder::default_encoder()
                }
            }
        }
        None => encoder::default_encoder(),
    };

    let mut thresholds = Vec::new();
    for (i, filter) in spec.filters.iter().enumerate() {
        let path = format!("{}.filters[{}]", base, i);
        match fields.required(&format!("{}.kind", path), filter.kind.as_deref()) {
            Some("threshold") | None => {}
            Some(other) => fields.push(ConfigError::invalid(
                format!("{}.kind", path),
                format!("unknown filter `{}`", other),
            )),
        }
        let level_path = format!("{}.level", path);
        if let Some(level) = fields.required(&level_path, filter.level.as_deref()) {
            thresholds.push(fields.parsed(&level_path, Some(level), Severity::Trace));
        }
    }

    let append = spec.append.unwrap_or(true);
    let plan = match fields.required(&format!("{}.kind", base), spec.kind.as_deref()) {
        None => None,
        Some("console") => {
            let target = fields.parsed(
                &format!("{}.target", base),
                spec.target.as_deref(),
                ConsoleTarget::Stdout,
            );
            Some(Plan::Console(target))
        }
        Some("file") => fields
            .required(&format!("{}.path", base), spec.path.clone())
            .map(|path| Plan::File { path, append }),
        Some("rolling_file") => {
            let path = fields.required(&format!("{}.path", base), spec.path.clone());
            let policy = fields.required(&format!("{}.policy", base), spec.policy.as_ref());
            match (path, policy.and_then(|p| plan_policy(&base, p, fields))) {
                (Some(path), Some((limit, roller))) => Some(Plan::Rolling {
                    path,
                    append,
                    limit,
                    roller,
                }),
                _ => None,
            }
        }
        Some("syslog") => Some(Plan::Syslog {
            process: spec
                .process
                .clone()
                .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string()),
        }),
        Some(other) => {
            fields.push(ConfigError::invalid(
                format!("{}.kind", base),
                format!("unknown appender kind `{}`", other),
            ));
            None
        }
    };

    if fields.count() > before {
        return None;
    }
    plan.map(|plan| AppenderPlan {
        id: id.to_string(),
        thresholds,
        encoder,
        plan,
    })
}

fn plan_policy(
    base: &str,
    policy: &PolicySpec,
    fields: &mut Fields,
) -> Option<(u64, Box<dyn Roll>)> {
    let base = format!("{}.policy", base);

    if let Some(kind) = policy.kind.as_deref().filter(|k| *k != "compound") {
        fields.push(ConfigError::invalid(
            format!("{}.kind", base),
            format!("unknown policy `{}`", kind),
        ));
    }

    let limit = fields
        .required(&format!("{}.trigger", base), policy.trigger.as_ref())
        .and_then(|trigger| {
            let path = format!("{}.trigger", base);
            match fields.required(&format!("{}.kind", path), trigger.kind.as_deref()) {
                Some("size") => {}
                Some(other) => fields.push(ConfigError::invalid(
                    format!("{}.kind", path),
                    format!("unknown trigger `{}`", other),
                )),
                None => {}
            }
            let limit_path = format!("{}.limit", path);
            let limit = fields.required(&limit_path, trigger.limit.as_ref())?;
            match limit.bytes() {
                Ok(0) => {
                    fields.push(ConfigError::invalid(limit_path, "must be greater than zero"));
                    None
                }
                Ok(bytes) => Some(bytes),
                Err(reason) => {
                    fields.push(ConfigError::invalid(limit_path, reason));
                    None
                }
            }
        });

    let roller = fields
        .required(&format!("{}.roller", base), policy.roller.as_ref())
        .and_then(|roller| {
            let path = format!("{}.roller", base);
            match fields.required(&format!("{}.kind", path), roller.kind.as_deref())? {
                "delete" => Some(append::delete_roller()),
                "fixed_window" => {
                    let pattern =
                        fields.required(&format!("{}.pattern", path), roller.pattern.clone());
                    let count = fields.required(&format!("{}.count", path), roller.count);
                    let (pattern, count) = (pattern?, count?);
                    match append::fixed_window_roller(&pattern, roller.base.unwrap_or(0), count) {
                        Ok(roller) => Some(roller),
                        Err(reason) => {
                            fields.push(ConfigError::invalid(path, reason));
                            None
                        }
                    }
                }
                other => {
                    fields.push(ConfigError::invalid(
                        format!("{}.kind", path),
                        format!("unknown roller `{}`", other),
                    ));
                    None
                }
            }
        });

    Some((limit?, roller?))
}

fn plan_route(path: &str, spec: &RouteSpec, config: &LogConfig, fields: &mut Fields) -> Route {
    let level = spec
        .level
        .as_deref()
        .map(|level| fields.parsed(&format!("{}.level", path), Some(level), DEFAULT_ROOT_LEVEL));
    check_references(path, &spec.appenders, config, fields);

    Route {
        level,
        appenders: spec.appenders.clone(),
        additive: spec.additive.unwrap_or(true),
    }
}

fn check_references(route: &str, ids: &[String], config: &LogConfig, fields: &mut Fields) {
    for id in ids {
        if !config.appenders.contains_key(id) {
            fields.push(ConfigError::UnresolvedReference {
                route: route.to_string(),
                appender: id.clone(),
            });
        }
    }
}

/// `Ok(None)` when a syslog daemon is unreachable; that is reported on
/// stderr and the appender is left out instead of failing the build.
fn open_appender(
    id: &str,
    plan: Plan,
    encoder: PatternEncoder,
) -> std::io::Result<Option<Box<dyn Append>>> {
    let sink = match plan {
        Plan::Console(target) => append::console_appender(target, encoder),
        Plan::File { path, append } => append::file_appender(&path, append, encoder)?,
        Plan::Rolling {
            path,
            append,
            limit,
            roller,
        } => append::rolling_file_appender(&path, append, encoder, limit, roller)?,
        Plan::Syslog { process } => match SyslogAppender::connect(process) {
            Ok(sink) => Box::new(sink),
            Err(e) => {
                eprintln!("syslog appender `{}` unavailable, continuing without it: {}", id, e);
                return Ok(None);
            }
        },
    };
    Ok(Some(sink))
}

fn extend_unique(into: &mut Vec<String>, ids: &[String]) {
    for id in ids {
        if !into.contains(id) {
            into.push(id.clone());
        }
    }
}

/// Route names accept `.` as a segment separator as well as `::`.
fn normalize(name: &str) -> Cow<'_, str> {
    if name.contains('.') {
        Cow::Owned(name.replace('.', "::"))
    } else {
        Cow::Borrowed(name)
    }
}

fn parent(name: &str) -> Option<&str> {
    name.rfind("::").map(|idx| &name[..idx])
}
