use std::time::Duration;

use batch_log_writer::elasticsearch::ElasticsearchConfig;
use batch_log_writer::{field, BatchWriter, WriterConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ElasticsearchConfig {
        addresses: vec![std::env::var("ES_URL").unwrap_or_else(|_| "http://127.0.0.1:9200".to_string())],
        index_prefix: "orders".to_string(),
        ..Default::default()
    };
    let writer = BatchWriter::elasticsearch(config, WriterConfig::default())?;

    if let Err(e) = writer.ping().await {
        eprintln!("elasticsearch is not reachable yet: {e}");
    }

    writer.info("elasticsearch example started", []);
    writer.slow(
        "order lookup",
        [
            field("trace", "4bf92f3577b34da6"),
            field("duration", Duration::from_millis(730)),
            field("order_id", 123),
        ],
    );

    // Records land in `orders-YYYY.MM.DD`.
    writer.close().await?;
    Ok(())
}
