#![allow(dead_code)]

use async_trait::async_trait;
use batch_log_writer::{BatchSink, LogRecord, SinkError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

/// Sink that remembers every batch it was handed.
#[derive(Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<LogRecord>>>,
    arrived: Notify,
    pub closes: AtomicUsize,
    pub pings: AtomicUsize,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<Vec<LogRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().iter().map(Vec::len).collect()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    /// Wait until at least `n` batches arrived; panics after five seconds.
    pub async fn wait_for_batches(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.batches.lock().unwrap().len() >= n {
                    return;
                }
                self.arrived.notified().await;
            }
        })
        .await
        .expect("timed out waiting for batches");
    }
}

#[async_trait]
impl BatchSink for RecordingSink {
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        self.arrived.notify_one();
        Ok(())
    }

    async fn ping(&self) -> Result<(), SinkError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that fails every send and counts attempts.
#[derive(Default)]
pub struct FailingSink {
    pub attempts: AtomicUsize,
    attempted: Notify,
}

impl FailingSink {
    pub async fn wait_for_attempts(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if self.attempts.load(Ordering::SeqCst) >= n {
                    return;
                }
                self.attempted.notified().await;
            }
        })
        .await
        .expect("timed out waiting for send attempts");
    }
}

#[async_trait]
impl BatchSink for FailingSink {
    async fn send_batch(&self, _batch: &[LogRecord]) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted.notify_one();
        Err(SinkError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }
}

/// Sink whose first send blocks until [`GatedSink::release`] is called.
#[derive(Default)]
pub struct GatedSink {
    pub inner: RecordingSink,
    entered: Notify,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedSink {
    pub async fn wait_until_blocked(&self) {
        tokio::time::timeout(Duration::from_secs(5), self.entered.notified())
            .await
            .expect("first send never started");
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl BatchSink for GatedSink {
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.entered.notify_one();
            self.gate.notified().await;
        }
        self.inner.send_batch(batch).await
    }
}
