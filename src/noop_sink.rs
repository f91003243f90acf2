use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::BatchSink;
use async_trait::async_trait;

/// A sink that simply drops every batch.
///
/// Useful for measuring the overhead of buffering itself without any
/// external I/O.
#[derive(Clone, Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl BatchSink for NoopSink {
    async fn send_batch(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
        Ok(())
    }
}
