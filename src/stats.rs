use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between a writer's producers and its flush task.
///
/// Failed flushes are never retried, so these counters are the only
/// place a dropped batch stays visible after the fact.
#[derive(Debug, Default)]
pub struct WriterStats {
    appended: AtomicU64,
    dropped: AtomicU64,
    flushes: AtomicU64,
    flushed_records: AtomicU64,
    failed_flushes: AtomicU64,
    failed_records: AtomicU64,
}

/// Point-in-time copy of [`WriterStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Records accepted into the buffer.
    pub appended: u64,
    /// Records rejected because the writer was already closed.
    pub dropped: u64,
    /// Batches the sink accepted.
    pub flushes: u64,
    pub flushed_records: u64,
    /// Batches the sink failed on, fully or in part.
    pub failed_flushes: u64,
    /// Records lost to failed batches. For a partially rejected batch
    /// only the rejected records count here; the rest are in
    /// `flushed_records`.
    pub failed_records: u64,
}

impl WriterStats {
    pub(crate) fn record_append(&self) {
        self.appended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_drop(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flush(&self, records: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_records.fetch_add(records as u64, Ordering::Relaxed);
    }

    /// A batch the sink took only in part: `delivered` records were
    /// stored and `lost` were not.
    pub(crate) fn record_partial(&self, delivered: usize, lost: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.flushed_records.fetch_add(delivered as u64, Ordering::Relaxed);
        self.failed_records.fetch_add(lost as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, records: usize) {
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        self.failed_records.fetch_add(records as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            appended: self.appended.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flushed_records: self.flushed_records.load(Ordering::Relaxed),
            failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
            failed_records: self.failed_records.load(Ordering::Relaxed),
        }
    }
}
