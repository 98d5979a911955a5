//! `tracing-subscriber` layer that forwards events to the active routing table.

use arc_swap::ArcSwap;
use std::fmt::{self, Write};
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::subscriber::Interest;
use tracing::{Event, Metadata, Subscriber};
use tracing_log::NormalizeEvent;
use tracing_subscriber::layer::{Context, Layer};

use super::record::LogRecord;
use super::table::RoutingTable;
use crate::config::Severity;

/// Layer reading the table through an atomic snapshot per event, so a
/// refresh never exposes a half-built table.
#[derive(Debug, Clone)]
pub struct RoutingLayer {
    table: Arc<ArcSwap<RoutingTable>>,
}

impl RoutingLayer {
    pub(crate) fn new(table: Arc<ArcSwap<RoutingTable>>) -> Self {
        Self { table }
    }
}

impl<S: Subscriber> Layer<S> for RoutingLayer {
    fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
        // The table can be swapped at runtime; never let a callsite cache a verdict.
        Interest::sometimes()
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        self.table.load().enabled(Severity::from(*metadata.level()))
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // Events bridged from `log` carry their real target in fields.
        let normalized = event.normalized_metadata();
        let metadata = normalized.as_ref().unwrap_or_else(|| event.metadata());

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let message = visitor.finish();

        let record = LogRecord {
            level: Severity::from(*metadata.level()),
            target: metadata.target(),
            module_path: metadata.module_path(),
            file: metadata.file(),
            line: metadata.line(),
            message: &message,
        };

        self.table.load().dispatch(&record);
    }
}

/// Collects the `message` field followed by the remaining fields as `key=value`.
#[derive(Debug, Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(mut self) -> String {
        if self.message.is_empty() {
            return self.fields.trim_start().to_string();
        }
        self.message.push_str(&self.fields);
        self.message
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message.push_str(value),
            name if name.starts_with("log.") => {}
            name => {
                let _ = write!(self.fields, " {}={}", name, value);
            }
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{:?}", value);
            }
            name if name.starts_with("log.") => {}
            name => {
                let _ = write!(self.fields, " {}={:?}", name, value);
            }
        }
    }
}
