use crate::field::{Field, FieldValue};
use crate::record::{Level as RecordLevel, LogRecord};
use crate::writer::BatchWriter;
use std::sync::Arc;
use tracing::field::Visit;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Target prefix of events emitted by this crate. They are never fed
/// back into a writer, so a failing flush cannot log itself in a loop.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// appends them to a [`BatchWriter`].
///
/// By default events at `INFO` and above are captured. Appending only
/// touches the writer's in-memory buffer; network I/O happens on the
/// writer's flush task, away from application threads.
pub struct BatchLayer {
    writer: Arc<BatchWriter>,
    max_level: Level,
}

impl BatchLayer {
    pub fn new(writer: Arc<BatchWriter>) -> Self {
        Self {
            writer,
            max_level: Level::INFO,
        }
    }

    /// Capture events at `level` and anything more severe. `TRACE`
    /// captures everything.
    pub fn with_max_level(mut self, level: Level) -> Self {
        self.max_level = level;
        self
    }

    pub fn writer(&self) -> &Arc<BatchWriter> {
        &self.writer
    }
}

impl<S> Layer<S> for BatchLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if *meta.level() > self.max_level || is_own_target(meta.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(
            RecordLevel::from(meta.level()),
            visitor.message.unwrap_or_default(),
            visitor.fields,
        );
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            record = record.with_caller(format!("{}:{}", short_file(file), line));
        }

        self.writer.push(record);
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .map(|rest| rest.is_empty() || rest.starts_with("::"))
        .unwrap_or(false)
}

/// Keep only the file name, the way `file:line` callers are usually shown.
fn short_file(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Collects an event's `message` and converts every other field into a
/// canonical [`Field`].
#[derive(Default)]
pub struct FieldVisitor {
    pub message: Option<String>,
    pub fields: Vec<Field>,
}

impl FieldVisitor {
    fn push(&mut self, field: &tracing::field::Field, value: FieldValue) {
        self.fields.push(Field {
            key: field.name().to_string(),
            value,
        });
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, FieldValue::Str(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.push(field, FieldValue::Int(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.push(field, FieldValue::UInt(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.push(field, FieldValue::Float(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.push(field, FieldValue::Bool(value));
    }

    fn record_error(
        &mut self,
        field: &tracing::field::Field,
        value: &(dyn std::error::Error + 'static),
    ) {
        self.push(field, FieldValue::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{:?}", value));
        } else {
            self.push(field, FieldValue::Str(format!("{:?}", value)));
        }
    }
}
