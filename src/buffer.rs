use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::record::LogRecord;

/// Receiving end of the single-slot "buffer is full" signal.
pub type FlushSignal = mpsc::Receiver<()>;

/// Outcome of [`RecordBuffer::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    /// Buffered; no new flush request was needed.
    Buffered,
    /// Buffered, and this call sent the size-triggered flush request.
    FlushRequested,
    /// Rejected because the buffer was closed. The record is gone.
    Closed,
}

impl Append {
    pub fn accepted(self) -> bool {
        self != Append::Closed
    }
}

#[derive(Debug)]
struct Pending {
    records: Vec<LogRecord>,
    closed: bool,
}

/// Ordered, mutex-protected accumulator of pending records.
///
/// Producers call [`append`](RecordBuffer::append) from any thread; the
/// flush task calls [`drain`](RecordBuffer::drain). Both run inside the
/// same critical section, so a record is either in the drained batch or
/// still in the buffer, never both and never neither.
///
/// Reaching the capacity sends a request over a one-slot channel. When a
/// request is already pending the new one is dropped, so there is never
/// more than one outstanding size-triggered flush.
///
/// The closed flag lives under the same lock. Once
/// [`close`](RecordBuffer::close) returns, every accepted record is
/// visible to the next drain and every later append is rejected.
#[derive(Debug)]
pub struct RecordBuffer {
    pending: Mutex<Pending>,
    capacity: usize,
    flush_tx: mpsc::Sender<()>,
}

impl RecordBuffer {
    /// Create an empty buffer and the signal the flush task listens on.
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> (Self, FlushSignal) {
        let capacity = capacity.max(1);
        let (flush_tx, flush_rx) = mpsc::channel(1);
        let buffer = RecordBuffer {
            pending: Mutex::new(Pending {
                records: Vec::with_capacity(capacity),
                closed: false,
            }),
            capacity,
            flush_tx,
        };
        (buffer, flush_rx)
    }

    /// Add a record to the tail and request a flush if the buffer is full.
    ///
    /// Never blocks on I/O.
    pub fn append(&self, record: LogRecord) -> Append {
        let full = {
            let mut pending = self.lock();
            if pending.closed {
                return Append::Closed;
            }
            pending.records.push(record);
            pending.records.len() >= self.capacity
        };

        // A full slot means the flush task has not picked up the last
        // request yet; that flush will take this record too.
        if full && self.flush_tx.try_send(()).is_ok() {
            Append::FlushRequested
        } else {
            Append::Buffered
        }
    }

    /// Swap out everything buffered so far, leaving an empty buffer.
    ///
    /// An empty result means there was nothing to flush. Draining still
    /// works after [`close`](RecordBuffer::close).
    pub fn drain(&self) -> Vec<LogRecord> {
        let mut pending = self.lock();
        if pending.records.is_empty() {
            return Vec::new();
        }
        std::mem::replace(&mut pending.records, Vec::with_capacity(self.capacity))
    }

    /// Reject all further appends. Returns `false` if already closed.
    pub fn close(&self) -> bool {
        let mut pending = self.lock();
        !std::mem::replace(&mut pending.closed, true)
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // The guarded value is a plain Vec and a flag, which stay consistent
    // even if a holder panicked mid-push.
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
