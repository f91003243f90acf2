use std::sync::Arc;

use batch_log_writer::console::ConsoleSink;
use batch_log_writer::init::{init_tracing_with_config, LayerConfig};
use batch_log_writer::{BatchWriter, WriterConfig};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let writer = Arc::new(BatchWriter::new(Arc::new(ConsoleSink::new()), WriterConfig::from_env())?);

    init_tracing_with_config(
        Arc::clone(&writer),
        LayerConfig {
            enable_stdout: false,
            ..Default::default()
        },
    )?;

    info!(trace = "t-42", "service started");
    warn!(duration = "1.2s", endpoint = "/orders", "slow request");
    error!(order_id = 123, "order failed");

    // Buffered records are printed by the final drain.
    writer.close().await?;
    Ok(())
}
