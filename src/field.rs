//! Canonical key/value fields.
//!
//! Every logging-framework binding converts its own field type into
//! [`Field`] at the boundary, so the writer never has to know where a
//! field came from.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const TRACE_KEY: &str = "trace";
pub const SPAN_KEY: &str = "span";
pub const DURATION_KEY: &str = "duration";

/// Value half of a [`Field`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    Json(Value),
}

impl FieldValue {
    /// JSON form stored in the open fields map.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Str(s) => Value::String(s.clone()),
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::UInt(v) => Value::from(*v),
            FieldValue::Float(v) => Value::from(*v),
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Duration(d) => Value::String(format_duration(*d)),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::UInt(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bool(v) => write!(f, "{v}"),
            FieldValue::Duration(d) => f.write_str(&format_duration(*d)),
            FieldValue::Json(Value::String(s)) => f.write_str(s),
            FieldValue::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        FieldValue::Str(v.clone())
    }
}

macro_rules! int_field_value {
    ($variant:ident, $target:ty, $($t:ty),+) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::$variant(v as $target)
                }
            }
        )+
    };
}

int_field_value!(Int, i64, i8, i16, i32, i64, isize);
int_field_value!(UInt, u64, u8, u16, u32, u64, usize);

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<Duration> for FieldValue {
    fn from(v: Duration) -> Self {
        FieldValue::Duration(v)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

/// A single `key = value` pair attached to a log call.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Field {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Shorthand for [`Field::new`].
pub fn field(key: impl Into<String>, value: impl Into<FieldValue>) -> Field {
    Field::new(key, value)
}

/// Result of splitting a field list into dedicated attributes and the
/// open fields map.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PromotedFields {
    pub trace: Option<String>,
    pub span: Option<String>,
    pub duration: Option<String>,
    pub fields: BTreeMap<String, Value>,
}

/// Lift `trace`, `span` and `duration` out of `fields`.
///
/// A `duration` holding a [`Duration`] is rendered in short form
/// (`50ms`); anything else uses its text form. Remaining keys land in the
/// open map, later duplicates overwriting earlier ones.
pub fn promote_fields<I>(fields: I) -> PromotedFields
where
    I: IntoIterator<Item = Field>,
{
    let mut promoted = PromotedFields::default();
    for Field { key, value } in fields {
        match key.as_str() {
            TRACE_KEY => promoted.trace = Some(value.to_string()),
            SPAN_KEY => promoted.span = Some(value.to_string()),
            DURATION_KEY => promoted.duration = Some(value.to_string()),
            _ => {
                promoted.fields.insert(key, value.to_json());
            }
        }
    }
    promoted
}

/// Render a duration the way Go's `time.Duration.String` does:
/// `0s`, `999ns`, `1.5µs`, `50ms`, `1.5s`, `1m30s`, `1h0m0s`.
pub fn format_duration(d: Duration) -> String {
    const MICRO: u128 = 1_000;
    const MILLI: u128 = 1_000_000;
    const SECOND: u128 = 1_000_000_000;

    let nanos = d.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < MICRO {
        return format!("{nanos}ns");
    }
    if nanos < MILLI {
        return format!("{}µs", fixed_point(nanos, MICRO, 3));
    }
    if nanos < SECOND {
        return format!("{}ms", fixed_point(nanos, MILLI, 6));
    }

    let secs = nanos / SECOND;
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let rest = (secs % 60) * SECOND + nanos % SECOND;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&fixed_point(rest, SECOND, 9));
    out.push('s');
    out
}

fn fixed_point(value: u128, unit: u128, width: usize) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
