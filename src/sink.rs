use crate::error::SinkError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Remote destination for batches of [`LogRecord`]s.
///
/// A writer calls these methods only from its flush task, one call at a
/// time, so implementations never see two batches in flight from the
/// same writer.
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Persist one batch with a single bulk operation.
    ///
    /// **Parameters**
    /// - `batch`: records in buffer order; never empty.
    ///
    /// **Returns**
    /// - `Ok(())` if the backend accepted the batch.
    /// - `Err(..)` on network, serialization or backend failure. The
    ///   writer drops the batch; it is not retried or re-buffered.
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError>;

    /// Synchronous connectivity probe, independent of any buffering.
    ///
    /// Default implementation always succeeds.
    async fn ping(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Release connection resources. Called once, after the final drain.
    ///
    /// Default implementation is a no-op.
    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
