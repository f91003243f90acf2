use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::field::{promote_fields, Field};

/// Severity attached to every [`LogRecord`].
///
/// The set is closed: it is the union of the levels emitted by the
/// logging-framework bindings that feed a writer. Serialized as the
/// lowercase name, which is also what ends up in the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
    Alert,
    Severe,
    Slow,
    Stack,
    Stat,
}

impl Level {
    pub const ALL: [Level; 9] = [
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Alert,
        Level::Severe,
        Level::Slow,
        Level::Stack,
        Level::Stat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Alert => "alert",
            Level::Severe => "severe",
            Level::Slow => "slow",
            Level::Stack => "stack",
            Level::Stat => "stat",
        }
    }

    /// Whether console-style outputs should route this level to stderr.
    pub fn is_problem(&self) -> bool {
        matches!(self, Level::Error | Level::Warn)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known [`Level`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown log level: {0:?}")]
pub struct ParseLevelError(pub String);

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .iter()
            .copied()
            .find(|level| level.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseLevelError(s.to_string()))
    }
}

impl From<&tracing::Level> for Level {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => Level::Error,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::INFO => Level::Info,
            _ => Level::Debug,
        }
    }
}

/// One observation waiting to be persisted.
///
/// This is also the document shape written to the search index; the
/// relational sink maps the same fields onto columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    ///
    /// `content` is rendered through `Display`, so strings pass through
    /// unchanged and errors render as their message. The `trace`, `span`
    /// and `duration` keys are lifted out of `fields` into their own
    /// attributes.
    pub fn new<C, I>(level: Level, content: C, fields: I) -> Self
    where
        C: fmt::Display,
        I: IntoIterator<Item = Field>,
    {
        let promoted = promote_fields(fields);
        LogRecord {
            timestamp: Utc::now(),
            level,
            content: content.to_string(),
            caller: None,
            duration: promoted.duration,
            trace: promoted.trace,
            span: promoted.span,
            fields: promoted.fields,
        }
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
