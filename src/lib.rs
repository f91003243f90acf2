pub mod buffer;
pub mod error;
pub mod field;
pub mod record;
pub mod scheduler;
pub mod sink;
pub mod stats;
pub mod writer;

pub mod backend;
pub mod console;
pub mod env;
pub mod init;
pub mod layer;
pub mod multi;
pub mod noop_sink;

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use error::{SinkError, WriterError};
pub use field::{field, Field, FieldValue};
pub use record::{Level, LogRecord};
pub use sink::BatchSink;
pub use writer::{BatchWriter, WriterConfig};
