//! Tests for the logging bootstrap.

use super::*;
use crate::config::{LoggingConfig, ParseError, Severity};
use log4rs::encode::Encode;
use log4rs::encode::writer::simple::SimpleWriter;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tracing_subscriber::layer::SubscriberExt;

fn table(yaml: &str) -> Result<RoutingTable, ConfigError> {
    RoutingTable::build(LogConfig::from_yaml_str(yaml)?)
}

/// Root logs to console and file at info; the demo namespace logs debug to
/// the file only.
fn demo_yaml(dir: &TempDir) -> String {
    format!(
        r#"
appenders:
  console:
    kind: console
    target: stderr
    encoder:
      pattern: "{{d(%Y-%m-%d %H:%M:%S)}} [{{h({{l}})}}] {{M}} - {{m}}{{n}}"
  file:
    kind: file
    path: {}
    append: true
    encoder:
      pattern: "[{{l}}] {{t}} - {{m}}{{n}}"

root:
  level: info
  appenders:
    - console
    - file

loggers:
  mysql_connection_demo:
    level: debug
    appenders:
      - file
    additive: false
"#,
        dir.path().join("app.log").display()
    )
}

// ==================== Document parsing tests ====================

#[test]
fn test_parse_refresh_rate() {
    let cfg = LogConfig::from_yaml_str("refresh_rate: 30 seconds\n").unwrap();
    assert_eq!(cfg.refresh_rate, Duration::from_secs(30));
}

#[test]
fn test_refresh_rate_out_of_range() {
    let err = LogConfig::from_yaml_str("refresh_rate: 99999999999999999999999 seconds\n").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(ParseError::Yaml(_))));
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn test_parse_is_idempotent() {
    let dir = tempdir().unwrap();
    let a = LogConfig::from_yaml_str(&demo_yaml(&dir)).unwrap();
    let b = LogConfig::from_yaml_str(&demo_yaml(&dir)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_unknown_keys_are_ignored() {
    let yaml = r#"
appenders:
  out:
    kind: console
    colour: always
root:
  level: warn
  appenders: [out]
  owner: ops
extras:
  anything: 1
"#;
    let table = table(yaml).unwrap();
    assert_eq!(table.resolve("anything").level, Severity::Warn);
}

#[test]
fn test_parse_size() {
    assert_eq!(document::parse_size("1024").unwrap(), 1024);
    assert_eq!(document::parse_size("10kb").unwrap(), 10 * 1024);
    assert_eq!(document::parse_size("10 mb").unwrap(), 10 * 1024 * 1024);
    assert_eq!(document::parse_size("1 GB").unwrap(), 1024 * 1024 * 1024);
    assert!(document::parse_size("10 parsecs").is_err());
}

#[test]
fn test_empty_document_defaults() {
    let table = table("{}").unwrap();
    let resolution = table.resolve("any::module");
    assert_eq!(resolution.level, DEFAULT_ROOT_LEVEL);
    assert!(resolution.appenders.is_empty());
    assert_eq!(table.appender_ids().count(), 0);
}

// ==================== Validation tests ====================

#[test]
fn test_unresolved_root_reference() {
    let yaml = r#"
appenders:
  console:
    kind: console
root:
  appenders: [console, missing]
"#;
    let err = table(yaml).unwrap_err();
    match err {
        ConfigError::UnresolvedReference { route, appender } => {
            assert_eq!(route, "root");
            assert_eq!(appender, "missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unresolved_logger_reference() {
    let yaml = r#"
loggers:
  app::db:
    appenders: [audit]
"#;
    let err = table(yaml).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::UnresolvedReference { ref route, ref appender }
            if route == "loggers.app::db" && appender == "audit"
    ));
}

#[test]
fn test_invalid_levels() {
    let err = table("root:\n  level: verbose\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "root.level"));

    let err = table("loggers:\n  app:\n    level: off\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "loggers.app.level"));

    let yaml = r#"
appenders:
  out:
    kind: console
    filters:
      - kind: threshold
        level: loud
"#;
    let err = table(yaml).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { ref field, .. } if field == "appenders.out.filters[0].level"
    ));
}

#[test]
fn test_missing_appender_kind() {
    let err = table("appenders:\n  out:\n    target: stdout\n").unwrap_err();
    assert!(matches!(err, ConfigError::MissingField(ref f) if f == "appenders.out.kind"));
}

#[test]
fn test_missing_file_path() {
    let err = table("appenders:\n  file:\n    kind: file\n").unwrap_err();
    assert!(matches!(err, ConfigError::MissingField(ref f) if f == "appenders.file.path"));
}

#[test]
fn test_unknown_appender_kind() {
    let err = table("appenders:\n  net:\n    kind: kafka\n").unwrap_err();
    assert!(err.to_string().contains("unknown appender kind `kafka`"));
}

#[test]
fn test_invalid_pattern() {
    let yaml = "appenders:\n  out:\n    kind: console\n    encoder:\n      pattern: \"{q}\"\n";
    let err = table(yaml).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { ref field, .. } if field == "appenders.out.encoder.pattern"
    ));
}

#[test]
fn test_incomplete_rolling_policy() {
    let dir = tempdir().unwrap();
    let yaml = format!(
        r#"
appenders:
  roll:
    kind: rolling_file
    path: {}
    policy:
      trigger:
        kind: size
      roller:
        kind: fixed_window
        count: 3
"#,
        dir.path().join("roll.log").display()
    );
    let err = table(&yaml).unwrap_err();
    let missing: Vec<String> = err
        .violations()
        .into_iter()
        .filter_map(|e| match e {
            ConfigError::MissingField(f) => Some(f.clone()),
            _ => None,
        })
        .collect();
    assert!(missing.contains(&"appenders.roll.policy.trigger.limit".to_string()));
    assert!(missing.contains(&"appenders.roll.policy.roller.pattern".to_string()));
    // Nothing is opened when validation fails.
    assert!(!dir.path().join("roll.log").exists());
}

// ==================== Route resolution tests ====================

#[test]
fn test_non_additive_route() {
    let dir = tempdir().unwrap();
    let table = table(&demo_yaml(&dir)).unwrap();

    let demo = table.resolve("mysql_connection_demo");
    assert_eq!(demo.level, Severity::Debug);
    assert_eq!(demo.appenders, vec!["file".to_string()]);

    let other = table.resolve("hbd::server");
    assert_eq!(other.level, Severity::Info);
    assert_eq!(other.appenders, vec!["console".to_string(), "file".to_string()]);
}

#[test]
fn test_non_additive_dispatch() {
    let dir = tempdir().unwrap();
    let table = table(&demo_yaml(&dir)).unwrap();

    let debug = LogRecord::new(Severity::Debug, "mysql_connection_demo", "pool ready");
    assert_eq!(table.dispatch(&debug), vec!["file"]);

    let trace = LogRecord::new(Severity::Trace, "mysql_connection_demo", "row fetched");
    assert!(table.dispatch(&trace).is_empty());
}

#[test]
fn test_child_namespace_inherits_route() {
    let dir = tempdir().unwrap();
    let table = table(&demo_yaml(&dir)).unwrap();

    let resolution = table.resolve("mysql_connection_demo::server::handlers");
    assert_eq!(resolution.level, Severity::Debug);
    assert_eq!(resolution.appenders, vec!["file".to_string()]);
}

#[test]
fn test_dotted_route_names() {
    let yaml = r#"
appenders:
  a:
    kind: console
root:
  level: error
loggers:
  app.db:
    level: trace
    appenders: [a]
"#;
    let table = table(yaml).unwrap();
    assert_eq!(table.resolve("app::db::pool").level, Severity::Trace);
    assert_eq!(table.resolve("app.db.pool").level, Severity::Trace);
    assert_eq!(table.resolve("app").level, Severity::Error);
}

#[test]
fn test_additive_routes_accumulate_without_duplicates() {
    let yaml = r#"
appenders:
  a:
    kind: console
  b:
    kind: console
  c:
    kind: console
root:
  level: warn
  appenders: [a]
loggers:
  app:
    appenders: [b, a]
  app::db:
    level: debug
    appenders: [c]
"#;
    let table = table(yaml).unwrap();

    let resolution = table.resolve("app::db");
    assert_eq!(resolution.level, Severity::Debug);
    assert_eq!(resolution.appenders, vec!["c", "b", "a"]);

    // `app` sets no level, so it comes from root.
    assert_eq!(table.resolve("app").level, Severity::Warn);
}

#[test]
fn test_non_additive_route_still_inherits_level() {
    let yaml = r#"
appenders:
  a:
    kind: console
  b:
    kind: console
root:
  level: info
  appenders: [a]
loggers:
  app:
    level: trace
  app::quiet:
    appenders: [b]
    additive: false
"#;
    let table = table(yaml).unwrap();
    let resolution = table.resolve("app::quiet::inner");
    assert_eq!(resolution.level, Severity::Trace);
    assert_eq!(resolution.appenders, vec!["b"]);
}

#[test]
fn test_threshold_filter_raises_target_minimum() {
    let dir = tempdir().unwrap();
    let yaml = format!(
        r#"
appenders:
  all:
    kind: file
    path: {}
  errors:
    kind: file
    path: {}
    filters:
      - kind: threshold
        level: info
      - kind: threshold
        level: error
root:
  level: debug
  appenders: [all, errors]
"#,
        dir.path().join("all.log").display(),
        dir.path().join("errors.log").display()
    );
    let table = table(&yaml).unwrap();

    let warn = LogRecord::new(Severity::Warn, "app", "slow query");
    assert_eq!(table.dispatch(&warn), vec!["all"]);

    let error = LogRecord::new(Severity::Error, "app", "query failed");
    assert_eq!(table.dispatch(&error), vec!["all", "errors"]);
}

#[test]
fn test_enabled_uses_most_verbose_route() {
    let dir = tempdir().unwrap();
    let table = table(&demo_yaml(&dir)).unwrap();
    assert!(table.enabled(Severity::Debug));
    assert!(!table.enabled(Severity::Trace));
}

// ==================== Encoder tests ====================

fn sample_record<'a>(level: Severity, message: &'a str) -> LogRecord<'a> {
    LogRecord::new(level, "app::db", message)
        .with_module_path("app::db::pool")
        .with_location("src/db/pool.rs", 42)
}

fn render(pattern: &str, record: &LogRecord<'_>) -> String {
    let encoder = pattern_encoder(pattern).unwrap();
    let mut out = SimpleWriter(Vec::new());
    record.with_log(|r| encoder.encode(&mut out, r)).unwrap();
    String::from_utf8(out.0).unwrap()
}

#[test]
fn test_encode_level_target_and_message() {
    let line = render("[{l:<5}] {t} - {m}{n}", &sample_record(Severity::Info, "ready"));
    assert_eq!(line, "[INFO ] app::db - ready\n");
}

#[test]
fn test_encode_location_and_module() {
    let line = render("{M} {f}:{L} {l:>6}", &sample_record(Severity::Warn, "x"));
    assert_eq!(line, "app::db::pool src/db/pool.rs:42   WARN");
}

#[test]
fn test_encode_date() {
    let line = render("{d(%Y)(utc)}", &sample_record(Severity::Info, "x"));
    assert_eq!(line.len(), 4);
    assert!(line.chars().all(|c| c.is_ascii_digit()), "got {line}");
}

#[test]
fn test_encode_escapes_and_pid() {
    let line = render("{{{m}}} {P}", &sample_record(Severity::Info, "msg"));
    assert_eq!(line, format!("{{msg}} {}", std::process::id()));
}

#[test]
fn test_highlight_is_plain_off_terminal() {
    let line = render("{h({l})}", &sample_record(Severity::Error, "boom"));
    assert_eq!(line, "ERROR");
}

#[test]
fn test_encode_thread_name() {
    let line = std::thread::Builder::new()
        .name("worker-1".to_string())
        .spawn(|| render("{T}", &sample_record(Severity::Info, "")))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(line, "worker-1");
}

#[test]
fn test_invalid_patterns() {
    for pattern in ["{q}", "{m", "{l(x)}", "{h}", "{d(%Y)(mars)}"] {
        assert!(pattern_encoder(pattern).is_err(), "accepted {pattern}");
    }
}

#[test]
fn test_default_pattern() {
    let line = render(DEFAULT_PATTERN, &sample_record(Severity::Debug, "hi"));
    assert!(line.ends_with(" DEBUG app::db - hi\n"), "got {line}");
}

// ==================== Appender tests ====================

fn append_line(appender: &dyn log4rs::append::Append, message: &str) {
    LogRecord::new(Severity::Info, "app", message)
        .with_log(|r| appender.append(r))
        .unwrap();
}

#[test]
fn test_file_appender_writes_each_record() {
    let dir = tempdir().unwrap();
    let handle = LoggingHandle::build(LogConfig::from_yaml_str(&demo_yaml(&dir)).unwrap()).unwrap();

    handle.dispatch(&LogRecord::new(Severity::Info, "mysql_connection_demo", "connected"));
    handle.dispatch(&LogRecord::new(Severity::Trace, "mysql_connection_demo", "dropped"));

    let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
    assert_eq!(content, "[INFO] mysql_connection_demo - connected\n");
}

#[test]
fn test_file_appender_truncates_without_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("fresh.log");
    fs::write(&path, "stale\n").unwrap();

    let appender = append::file_appender(&path, false, pattern_encoder("{m}{n}").unwrap()).unwrap();
    append_line(appender.as_ref(), "new");
    appender.flush();

    assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
}

#[test]
fn test_file_appender_creates_parent_dirs() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/deeper/app.log");
    append::file_appender(&path, true, encoder::default_encoder()).unwrap();
    assert!(path.exists());
}

fn rolling_yaml(dir: &TempDir, limit: u64, roller: &str) -> String {
    format!(
        r#"
appenders:
  roll:
    kind: rolling_file
    path: {}
    encoder:
      pattern: "{{m}}{{n}}"
    policy:
      kind: compound
      trigger:
        kind: size
        limit: {}
      roller:
{}
root:
  level: info
  appenders: [roll]
"#,
        dir.path().join("app.log").display(),
        limit,
        roller
    )
}

#[test]
fn test_rolling_fixed_window_keeps_count_archives() {
    let dir = tempdir().unwrap();
    let roller = format!(
        "        kind: fixed_window\n        pattern: {}\n        base: 0\n        count: 2",
        dir.path().join("app.{}.log").display()
    );
    let table = table(&rolling_yaml(&dir, 15, &roller)).unwrap();

    // Each line is 10 bytes, so every second line crosses the limit.
    for i in 1..=7 {
        let message = format!("line-{:04}", i);
        assert_eq!(table.dispatch(&LogRecord::new(Severity::Info, "app", &message)), vec!["roll"]);
    }

    let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
    assert_eq!(read("app.log"), "line-0007\n");
    assert_eq!(read("app.0.log"), "line-0005\nline-0006\n");
    assert_eq!(read("app.1.log"), "line-0003\nline-0004\n");
    assert!(!dir.path().join("app.2.log").exists());
}

#[test]
fn test_rolling_delete() {
    let dir = tempdir().unwrap();
    let table = table(&rolling_yaml(&dir, 15, "        kind: delete")).unwrap();

    for message in ["first line", "second line", "third"] {
        table.dispatch(&LogRecord::new(Severity::Info, "app", message));
    }

    assert_eq!(fs::read_to_string(dir.path().join("app.log")).unwrap(), "third\n");
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_fixed_window_validation() {
    assert!(append::fixed_window_roller("logs/app.log", 0, 3).is_err());
    assert!(append::fixed_window_roller("logs/app.{}.log", 0, 0).is_err());
    assert!(append::fixed_window_roller("logs/app.{}.log.gz", 0, 3).is_err());
    assert!(append::fixed_window_roller("logs/app.{}.log", u32::MAX - 2, 3).is_ok());
}

#[test]
fn test_fixed_window_index_overflow_rejected() {
    let dir = tempdir().unwrap();
    let roller = format!(
        "        kind: fixed_window\n        pattern: {}\n        base: 4294967295\n        count: 2",
        dir.path().join("app.{}.log").display()
    );
    let err = table(&rolling_yaml(&dir, 10, &roller)).unwrap_err();
    match err {
        ConfigError::InvalidValue { field, reason } => {
            assert_eq!(field, "appenders.roll.policy.roller");
            assert!(reason.contains("overflows"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!dir.path().join("app.log").exists());
}

#[test]
fn test_zero_size_limit_rejected() {
    let dir = tempdir().unwrap();
    let err = table(&rolling_yaml(&dir, 0, "        kind: delete")).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::InvalidValue { ref field, .. } if field == "appenders.roll.policy.trigger.limit"
    ));
}

#[test]
fn test_syslog_appender_is_optional() {
    let yaml = r#"
appenders:
  syslog:
    kind: syslog
    process: hbd-test
root:
  level: info
  appenders: [syslog]
"#;
    // Builds whether or not a syslog daemon is listening.
    let table = table(yaml).unwrap();
    let delivered = table.dispatch(&LogRecord::new(Severity::Info, "app", "hello syslog"));
    assert!(delivered.is_empty() || delivered == vec!["syslog"]);
}

// ==================== Settings bridge tests ====================

#[test]
fn test_from_settings() {
    let dir = tempdir().unwrap();
    let settings = LoggingConfig {
        level: Severity::Warn,
        file_path: dir.path().join("logs/app.log"),
        syslog_enabled: false,
        max_file_size: 1,
        max_files: 3,
        ..LoggingConfig::default()
    };

    let config = LogConfig::from_settings(&settings);
    let roller = config.appenders["file"]
        .policy
        .as_ref()
        .and_then(|p| p.roller.clone())
        .unwrap();
    assert_eq!(roller.count, Some(3));
    assert!(roller.pattern.unwrap().ends_with("app.{}.log"));

    let table = RoutingTable::build(config).unwrap();
    let resolution = table.resolve("hbd");
    assert_eq!(resolution.level, Severity::Warn);
    assert_eq!(resolution.appenders, vec!["console", "file"]);
    assert!(dir.path().join("logs/app.log").exists());
}

#[test]
fn test_from_settings_adds_syslog() {
    let settings = LoggingConfig {
        file_enabled: false,
        console_enabled: false,
        syslog_enabled: true,
        ..LoggingConfig::default()
    };

    let config = LogConfig::from_settings(&settings);
    assert_eq!(config.appenders["syslog"].kind.as_deref(), Some("syslog"));
    assert_eq!(config.root.as_ref().unwrap().appenders, vec!["syslog"]);
    assert!(RoutingTable::build(config).is_ok());
}

#[test]
fn test_from_settings_without_sinks() {
    let settings = LoggingConfig {
        file_enabled: false,
        console_enabled: false,
        syslog_enabled: false,
        ..LoggingConfig::default()
    };
    let table = RoutingTable::build(LogConfig::from_settings(&settings)).unwrap();
    assert_eq!(table.appender_ids().count(), 0);
}

// ==================== Layer tests ====================

#[test]
fn test_layer_routes_tracing_events() {
    let dir = tempdir().unwrap();
    let handle = LoggingHandle::build(LogConfig::from_yaml_str(&demo_yaml(&dir)).unwrap()).unwrap();
    let subscriber = tracing_subscriber::registry().with(handle.layer());

    tracing::subscriber::with_default(subscriber, || {
        tracing::debug!(target: "mysql_connection_demo", user = 7, "connected");
        tracing::trace!(target: "mysql_connection_demo", "too verbose");
    });
    handle.close();

    let content = fs::read_to_string(dir.path().join("app.log")).unwrap();
    assert_eq!(content, "[DEBUG] mysql_connection_demo - connected user=7\n");
}

// ==================== Refresh tests ====================

fn write_levels(path: &std::path::Path, refresh: &str, level: &str) {
    let yaml = format!(
        "refresh_rate: {}\nappenders:\n  out:\n    kind: console\nroot:\n  level: {}\n  appenders: [out]\n",
        refresh, level
    );
    fs::write(path, yaml).unwrap();
}

#[test]
fn test_refresh_without_source() {
    let handle = LoggingHandle::build(LogConfig::default()).unwrap();
    assert!(!handle.refresh().unwrap());
}

#[test]
fn test_refresh_swaps_changed_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log4rs.yaml");
    write_levels(&path, "1 minute", "info");

    let handle = LoggingHandle::from_file(&path).unwrap();
    let before = handle.table();
    assert!(!handle.refresh().unwrap());
    assert!(Arc::ptr_eq(&before, &handle.table()));

    write_levels(&path, "1 minute", "error");
    assert!(handle.refresh().unwrap());
    assert_eq!(handle.table().resolve("app").level, Severity::Error);
    assert!(!Arc::ptr_eq(&before, &handle.table()));
}

#[test]
fn test_refresh_failure_keeps_active_table() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log4rs.yaml");
    write_levels(&path, "1 minute", "info");

    let handle = LoggingHandle::from_file(&path).unwrap();
    let before = handle.table();

    fs::write(&path, "root: [unclosed").unwrap();
    assert!(matches!(handle.refresh(), Err(ConfigError::Parse(_))));

    write_levels(&path, "1 minute", "chatty");
    assert!(matches!(handle.refresh(), Err(ConfigError::InvalidValue { .. })));

    assert!(Arc::ptr_eq(&before, &handle.table()));
    assert_eq!(handle.refresh_errors(), 2);
    assert!(handle.last_refresh_error().unwrap().contains("root.level"));
}

#[test]
fn test_refresh_rejects_out_of_range_rate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log4rs.yaml");
    write_levels(&path, "1 minute", "info");

    let handle = LoggingHandle::from_file(&path).unwrap();
    let before = handle.table();

    write_levels(&path, "99999999999999999999999 seconds", "warn");
    assert!(matches!(handle.refresh(), Err(ConfigError::Parse(_))));

    assert!(Arc::ptr_eq(&before, &handle.table()));
    assert_eq!(handle.refresh_errors(), 1);
    assert!(handle.last_refresh_error().unwrap().contains("out of range"));
}

#[test]
fn test_periodic_refresh() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log4rs.yaml");
    write_levels(&path, "20ms", "info");

    let mut handle = LoggingHandle::from_file(&path).unwrap();
    assert_eq!(handle.refresh_rate(), Duration::from_millis(20));
    handle.spawn_refresh().unwrap();

    write_levels(&path, "20ms", "warn");

    let mut level = handle.table().resolve("app").level;
    for _ in 0..100 {
        if level == Severity::Warn {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
        level = handle.table().resolve("app").level;
    }
    assert_eq!(level, Severity::Warn);
    handle.close();
}

#[test]
fn test_spawn_refresh_is_noop_without_rate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log4rs.yaml");
    fs::write(&path, "root:\n  level: info\n").unwrap();

    let mut handle = LoggingHandle::from_file(&path).unwrap();
    handle.spawn_refresh().unwrap();
    assert!(handle.refresh.is_none());
}
