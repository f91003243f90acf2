use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::debug;

use crate::buffer::RecordBuffer;
use crate::error::{SinkError, WriterError};
use crate::field::{field, Field};
use crate::record::{Level, LogRecord};
use crate::scheduler::FlushScheduler;
use crate::sink::BatchSink;
use crate::stats::{StatsSnapshot, WriterStats};

pub const DEFAULT_CAPACITY: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Buffering behavior of a [`BatchWriter`].
///
/// **Fields**
/// - `capacity`: number of buffered records that triggers a flush.
///   `0` is replaced by [`DEFAULT_CAPACITY`].
/// - `flush_interval`: maximum time between flushes even when the
///   buffer is not full. Zero is replaced by [`DEFAULT_FLUSH_INTERVAL`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    pub capacity: usize,
    pub flush_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl WriterConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Substitute defaults for values that would make the writer useless.
    pub fn normalized(self) -> Self {
        Self {
            capacity: if self.capacity == 0 {
                DEFAULT_CAPACITY
            } else {
                self.capacity
            },
            flush_interval: if self.flush_interval.is_zero() {
                DEFAULT_FLUSH_INTERVAL
            } else {
                self.flush_interval
            },
        }
    }
}

/// Buffered writer that ships records to a [`BatchSink`] in batches.
///
/// Appending only touches an in-memory buffer, so it is cheap and safe
/// from any number of threads, sync or async. A background task owned by
/// the writer flushes the buffer when it fills up, every
/// `flush_interval`, and once more on [`close`](BatchWriter::close).
///
/// A failed flush drops its batch; see [`StatsSnapshot`] for how many
/// records were lost that way.
pub struct BatchWriter {
    buffer: Arc<RecordBuffer>,
    sink: Arc<dyn BatchSink>,
    stats: Arc<WriterStats>,
    config: WriterConfig,
    scheduler: Mutex<Option<FlushScheduler>>,
}

impl fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchWriter")
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

macro_rules! level_methods {
    ($($(#[$meta:meta])* $name:ident => $level:expr),+ $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $name<C, I>(&self, content: C, fields: I)
            where
                C: fmt::Display,
                I: IntoIterator<Item = Field>,
            {
                self.append($level, content, fields);
            }
        )+
    };
}

impl BatchWriter {
    /// Create a writer around `sink` and start its flush task.
    ///
    /// Must be called from within a tokio runtime; the flush task is
    /// spawned on the current one.
    pub fn new(sink: Arc<dyn BatchSink>, config: WriterConfig) -> Result<Self, WriterError> {
        let runtime = Handle::try_current().map_err(|_| WriterError::NoRuntime)?;
        let config = config.normalized();

        let (buffer, signal) = RecordBuffer::new(config.capacity);
        let buffer = Arc::new(buffer);
        let stats = Arc::new(WriterStats::default());

        let scheduler = FlushScheduler::spawn(
            &runtime,
            Arc::clone(&buffer),
            signal,
            Arc::clone(&sink),
            config.flush_interval,
            Arc::clone(&stats),
        );

        debug!(
            capacity = config.capacity,
            flush_interval_ms = config.flush_interval.as_millis() as u64,
            "batch writer started"
        );

        Ok(BatchWriter {
            buffer,
            sink,
            stats,
            config,
            scheduler: Mutex::new(Some(scheduler)),
        })
    }

    /// Writer backed by an [`ElasticsearchSink`](crate::elasticsearch::ElasticsearchSink).
    #[cfg(feature = "elasticsearch")]
    pub fn elasticsearch(
        config: crate::elasticsearch::ElasticsearchConfig,
        writer_config: WriterConfig,
    ) -> Result<Self, WriterError> {
        let sink = crate::elasticsearch::ElasticsearchSink::new(config)?;
        Self::new(Arc::new(sink), writer_config)
    }

    /// Writer backed by a [`PostgresSink`](crate::postgres::PostgresSink).
    #[cfg(feature = "postgres")]
    pub async fn postgres(
        config: crate::postgres::PostgresConfig,
        writer_config: WriterConfig,
    ) -> Result<Self, WriterError> {
        let sink = crate::postgres::PostgresSink::connect(config).await?;
        Self::new(Arc::new(sink), writer_config)
    }

    /// Writer whose sink is selected by the scheme of `dsn`.
    pub async fn from_dsn(
        dsn: &str,
        writer_config: WriterConfig,
    ) -> Result<Self, crate::backend::BackendBuildError> {
        let backend = crate::backend::parse_dsn(dsn)?;
        let sink = crate::backend::connect_sink(&backend).await?;
        Ok(Self::new(sink, writer_config)?)
    }

    /// Build a record from `level`, `content` and `fields` and buffer it.
    ///
    /// `content` is rendered through `Display`. The `trace`, `span` and
    /// `duration` fields become dedicated record attributes.
    pub fn append<C, I>(&self, level: Level, content: C, fields: I)
    where
        C: fmt::Display,
        I: IntoIterator<Item = Field>,
    {
        self.push(LogRecord::new(level, content, fields));
    }

    /// Buffer an already built record.
    ///
    /// Records pushed after [`close`](BatchWriter::close) has started are
    /// dropped and counted in [`StatsSnapshot::dropped`].
    pub fn push(&self, record: LogRecord) {
        if self.buffer.append(record).accepted() {
            self.stats.record_append();
        } else {
            self.stats.record_drop();
        }
    }

    level_methods! {
        debug => Level::Debug,
        info => Level::Info,
        warn => Level::Warn,
        error => Level::Error,
        alert => Level::Alert,
        severe => Level::Severe,
        /// Slow-call record; pass the elapsed time as a `duration` field.
        slow => Level::Slow,
        stat => Level::Stat,
    }

    /// Record `content` together with the current thread's backtrace,
    /// stored under the `stack` field.
    pub fn stack<C: fmt::Display>(&self, content: C) {
        let backtrace = std::backtrace::Backtrace::force_capture().to_string();
        self.append(Level::Stack, content, [field("stack", backtrace)]);
    }

    /// Probe the sink. Independent of the buffer and the flush task.
    pub async fn ping(&self) -> Result<(), SinkError> {
        self.sink.ping().await
    }

    /// Flush everything still buffered, stop the flush task and close
    /// the sink.
    ///
    /// Does not return before the final drain has been attempted. A
    /// failure of that drain is returned (the batch is not retried);
    /// otherwise the result of closing the sink is. Calling `close`
    /// again afterwards does nothing.
    pub async fn close(&self) -> Result<(), WriterError> {
        let mut scheduler = self.scheduler.lock().await;
        let Some(running) = scheduler.take() else {
            return Ok(());
        };

        // Appends racing with this call either land before the final
        // drain or are rejected.
        self.buffer.close();
        let drained = running.shutdown().await;
        let sink_closed = self.sink.close().await;

        let delivered = drained?;
        debug!(records = delivered, "batch writer closed");
        sink_closed.map_err(WriterError::from)
    }

    pub fn is_closed(&self) -> bool {
        self.buffer.is_closed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Records currently waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}
