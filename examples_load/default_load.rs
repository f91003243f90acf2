use std::sync::Arc;
use std::time::Instant;

use batch_log_writer::noop_sink::NoopSink;
use batch_log_writer::{field, BatchWriter, WriterConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let writer = BatchWriter::new(Arc::new(NoopSink), WriterConfig::default())?;

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        writer.error("default load test error", [field("iteration", i)]);
    }

    let elapsed = start.elapsed();
    println!(
        "default config: appended {} records in {:?} (~{:.0} rec/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    writer.close().await?;
    println!("{:?}", writer.stats());
    Ok(())
}
