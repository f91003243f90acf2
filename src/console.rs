use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::BatchSink;
use async_trait::async_trait;
use std::io::Write;

/// Sink that prints one line per record.
///
/// `error` and `warn` go to stderr, everything else to stdout. Handy in
/// local development and as one leg of a [`MultiSink`](crate::multi::MultiSink).
#[derive(Clone, Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        ConsoleSink
    }
}

/// `[LEVEL] timestamp content trace=.. span=.. duration=.. key=value ..`
pub fn format_line(record: &LogRecord) -> String {
    let mut parts = vec![
        format!("[{}]", record.level.as_str().to_ascii_uppercase()),
        record.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        record.content.clone(),
    ];

    if let Some(trace) = &record.trace {
        parts.push(format!("trace={trace}"));
    }
    if let Some(span) = &record.span {
        parts.push(format!("span={span}"));
    }
    if let Some(duration) = &record.duration {
        parts.push(format!("duration={duration}"));
    }
    for (key, value) in &record.fields {
        match value {
            serde_json::Value::String(s) => parts.push(format!("{key}={s}")),
            other => parts.push(format!("{key}={other}")),
        }
    }

    parts.join(" ")
}

#[async_trait]
impl BatchSink for ConsoleSink {
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();

        for record in batch {
            let line = format_line(record);
            if record.level.is_problem() {
                writeln!(err, "{line}")?;
            } else {
                writeln!(out, "{line}")?;
            }
        }
        out.flush()?;
        err.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::field;
    use crate::record::Level;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    #[test]
    fn formats_promoted_then_open_fields() {
        let record = LogRecord::new(
            Level::Warn,
            "slow query",
            vec![
                field("user", "a"),
                field("trace", "t1"),
                field("duration", Duration::from_millis(250)),
                field("rows", 12),
            ],
        )
        .with_timestamp(Utc.with_ymd_and_hms(2025, 12, 16, 8, 30, 0).unwrap());

        assert_eq!(
            format_line(&record),
            "[WARN] 2025-12-16 08:30:00.000 slow query trace=t1 duration=250ms rows=12 user=a"
        );
    }
}
