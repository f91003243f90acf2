use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::buffer::{FlushSignal, RecordBuffer};
use crate::error::{SinkError, WriterError};
use crate::sink::BatchSink;
use crate::stats::WriterStats;

/// What woke the flush task up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The buffer reached its capacity.
    Size,
    /// The flush interval elapsed.
    Timer,
    /// The writer is closing; this is the last cycle.
    Shutdown,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Size => "size",
            Trigger::Timer => "timer",
            Trigger::Shutdown => "shutdown",
        }
    }
}

/// Handle to the single background task that drains a writer's buffer.
///
/// The task waits on three events: the size signal from the buffer, a
/// periodic tick, and shutdown. Size and timer wake-ups run one flush
/// cycle and go back to waiting. Shutdown runs exactly one final cycle
/// and ends the task. Sends are awaited inline, so a writer never has
/// more than one batch in flight and batches reach the sink in drain
/// order.
#[derive(Debug)]
pub struct FlushScheduler {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<Result<usize, SinkError>>,
}

impl FlushScheduler {
    /// Spawn the flush task on `runtime`.
    ///
    /// The first tick fires one full `interval` after spawning. Dropping
    /// the returned handle without calling [`shutdown`](Self::shutdown)
    /// still makes the task run its final drain and exit.
    pub fn spawn(
        runtime: &Handle,
        buffer: Arc<RecordBuffer>,
        signal: FlushSignal,
        sink: Arc<dyn BatchSink>,
        interval: Duration,
        stats: Arc<WriterStats>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(run(buffer, signal, sink, interval, stats, shutdown_rx));
        FlushScheduler { shutdown_tx, handle }
    }

    /// Stop the periodic and size triggers, let any in-flight send
    /// finish, then wait for the final drain.
    ///
    /// Returns how many records the final drain delivered.
    pub async fn shutdown(self) -> Result<usize, WriterError> {
        // An error here only means the task is already gone; awaiting the
        // handle reports why.
        let _ = self.shutdown_tx.send(());
        let delivered = self.handle.await??;
        Ok(delivered)
    }
}

async fn run(
    buffer: Arc<RecordBuffer>,
    mut signal: FlushSignal,
    sink: Arc<dyn BatchSink>,
    interval: Duration,
    stats: Arc<WriterStats>,
    mut shutdown: oneshot::Receiver<()>,
) -> Result<usize, SinkError> {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let trigger = tokio::select! {
            biased;
            // Fires on an explicit shutdown and when the writer is dropped.
            _ = &mut shutdown => break,
            Some(()) = signal.recv() => Trigger::Size,
            _ = ticker.tick() => Trigger::Timer,
        };

        // Failures are already logged and counted; the loop keeps going.
        let _ = flush_once(&buffer, &*sink, &stats, trigger).await;
    }

    flush_once(&buffer, &*sink, &stats, Trigger::Shutdown).await
}

/// Drain the buffer and hand the batch to the sink.
///
/// An empty buffer is a no-op. A failed send drops the batch: it is
/// counted, logged, and returned, never retried or re-buffered.
pub(crate) async fn flush_once(
    buffer: &RecordBuffer,
    sink: &dyn BatchSink,
    stats: &WriterStats,
    trigger: Trigger,
) -> Result<usize, SinkError> {
    let batch = buffer.drain();
    if batch.is_empty() {
        return Ok(0);
    }

    let records = batch.len();
    match sink.send_batch(&batch).await {
        Ok(()) => {
            stats.record_flush(records);
            debug!(trigger = trigger.as_str(), records, "flushed log batch");
            Ok(records)
        }
        Err(e) => {
            let lost = match &e {
                // Records the sink skipped before sending are lost too.
                SinkError::Rejected { failed, total } => {
                    let lost = (*failed).min(*total) + records.saturating_sub(*total);
                    stats.record_partial(records.saturating_sub(lost), lost);
                    lost
                }
                _ => {
                    stats.record_failure(records);
                    records
                }
            };
            error!(
                trigger = trigger.as_str(),
                records,
                lost,
                error = %e,
                "log batch dropped after sink failure"
            );
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Level, LogRecord};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        batches: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl BatchSink for Recording {
        async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
            self.batches.lock().unwrap().push(batch.len());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl BatchSink for Broken {
        async fn send_batch(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
            Err(SinkError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        }
    }

    struct PartlyRejecting;

    #[async_trait]
    impl BatchSink for PartlyRejecting {
        async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
            Err(SinkError::Rejected {
                failed: 1,
                total: batch.len(),
            })
        }
    }

    fn filled(n: usize) -> RecordBuffer {
        let (buffer, _signal) = RecordBuffer::new(100);
        for i in 0..n {
            buffer.append(LogRecord::new(Level::Info, i, Vec::new()));
        }
        buffer
    }

    #[tokio::test]
    async fn empty_buffer_sends_nothing() {
        let sink = Recording::default();
        let stats = WriterStats::default();
        let delivered = flush_once(&filled(0), &sink, &stats, Trigger::Timer)
            .await
            .unwrap();

        assert_eq!(delivered, 0);
        assert!(sink.batches.lock().unwrap().is_empty());
        assert_eq!(stats.snapshot().flushes, 0);
    }

    #[tokio::test]
    async fn sends_whole_buffer_as_one_batch() {
        let sink = Recording::default();
        let stats = WriterStats::default();
        let buffer = filled(7);

        let delivered = flush_once(&buffer, &sink, &stats, Trigger::Size).await.unwrap();

        assert_eq!(delivered, 7);
        assert_eq!(*sink.batches.lock().unwrap(), vec![7]);
        assert!(buffer.is_empty());
        assert_eq!(stats.snapshot().flushed_records, 7);
    }

    #[tokio::test]
    async fn failed_batch_is_dropped_not_rebuffered() {
        let stats = WriterStats::default();
        let buffer = filled(3);

        let result = flush_once(&buffer, &Broken, &stats, Trigger::Timer).await;

        assert!(matches!(result, Err(SinkError::Status { status: 503, .. })));
        assert!(buffer.is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed_flushes, 1);
        assert_eq!(snapshot.failed_records, 3);
    }

    #[tokio::test]
    async fn partial_rejection_counts_only_rejected_records() {
        let stats = WriterStats::default();
        let buffer = filled(3);

        let result = flush_once(&buffer, &PartlyRejecting, &stats, Trigger::Size).await;

        assert!(matches!(result, Err(SinkError::Rejected { failed: 1, total: 3 })));
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.failed_flushes, 1);
        assert_eq!(snapshot.failed_records, 1);
        assert_eq!(snapshot.flushed_records, 2);
        assert_eq!(snapshot.flushes, 0);
    }
}
