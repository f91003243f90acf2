use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::BatchSink;
use async_trait::async_trait;
use std::sync::Arc;

/// Fans every batch out to several sinks, in order.
///
/// Every sink is attempted even if an earlier one fails. A single failure
/// is returned as-is; several are wrapped in [`SinkError::Multiple`].
#[derive(Clone, Default)]
pub struct MultiSink {
    sinks: Vec<Arc<dyn BatchSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Arc<dyn BatchSink>>) -> Self {
        MultiSink { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn BatchSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

fn collect(mut errors: Vec<SinkError>) -> Result<(), SinkError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(SinkError::Multiple(errors)),
    }
}

#[async_trait]
impl BatchSink for MultiSink {
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.send_batch(batch).await {
                errors.push(e);
            }
        }
        collect(errors)
    }

    async fn ping(&self) -> Result<(), SinkError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.ping().await {
                errors.push(e);
            }
        }
        collect(errors)
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.close().await {
                errors.push(e);
            }
        }
        collect(errors)
    }
}
