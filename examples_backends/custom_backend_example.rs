use std::sync::Arc;

use async_trait::async_trait;
use batch_log_writer::console::ConsoleSink;
use batch_log_writer::multi::MultiSink;
use batch_log_writer::{field, BatchSink, BatchWriter, LogRecord, SinkError, WriterConfig};

/// Example of integrating a completely custom backend by implementing
/// the `BatchSink` trait directly. Imagine this talks to some
/// proprietary store for which this crate does not provide a sink.
struct MyCustomDbSink;

#[async_trait]
impl BatchSink for MyCustomDbSink {
    async fn send_batch(&self, batch: &[LogRecord]) -> Result<(), SinkError> {
        // One bulk call per batch; here we just report its size.
        println!("[my-custom-db] storing {} records", batch.len());
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sink = MultiSink::new(vec![
        Arc::new(MyCustomDbSink) as Arc<dyn BatchSink>,
        Arc::new(ConsoleSink::new()),
    ]);
    let writer = BatchWriter::new(Arc::new(sink), WriterConfig::default())?;

    writer.info("custom backend example started", []);
    writer.error("simulated error sent via custom backend", [field("db", "my-custom-db")]);

    writer.close().await?;
    Ok(())
}
