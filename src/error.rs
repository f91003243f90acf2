/// Error returned by a [`BatchSink`](crate::sink::BatchSink) operation.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[cfg(feature = "elasticsearch")]
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("sink rejected {failed} of {total} records")]
    Rejected { failed: usize, total: usize },

    #[cfg(feature = "postgres")]
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid sink configuration: {0}")]
    InvalidConfig(String),

    #[error("sink is closed")]
    Closed,

    #[error("{} sinks failed", .0.len())]
    Multiple(Vec<SinkError>),
}

/// Error returned by [`BatchWriter`](crate::writer::BatchWriter).
#[derive(thiserror::Error, Debug)]
pub enum WriterError {
    #[error("batch writer must be created inside a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("flush task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}
