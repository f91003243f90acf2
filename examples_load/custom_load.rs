use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;

use batch_log_writer::noop_sink::NoopSink;
use batch_log_writer::{field, BatchWriter, WriterConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = WriterConfig::default()
        .with_capacity(1_000)
        .with_flush_interval(Duration::from_millis(200));
    let writer = Arc::new(BatchWriter::new(Arc::new(NoopSink), config)?);

    let threads: u64 = 8;
    let per_thread: u64 = 100_000;
    let start = Instant::now();

    let producers: Vec<_> = (0..threads)
        .map(|t| {
            let writer = Arc::clone(&writer);
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    writer.error("custom load test error", [field("thread", t), field("iteration", i)]);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().expect("producer thread panicked");
    }

    let elapsed = start.elapsed();
    let n = threads * per_thread;
    println!(
        "custom config: appended {} records from {} threads in {:?} (~{:.0} rec/s)",
        n,
        threads,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    writer.close().await?;
    println!("{:?}", writer.stats());
    Ok(())
}
