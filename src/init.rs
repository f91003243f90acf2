use crate::layer::BatchLayer;
use crate::writer::BatchWriter;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global subscriber installed by
/// [`init_tracing_with_config`].
///
/// **Fields**
/// - `max_level`: least severe level forwarded to the writer.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added next to [`BatchLayer`] so events are also printed locally.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub max_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            max_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Error returned when a global subscriber is already installed.
#[derive(thiserror::Error, Debug)]
#[error("failed to install global tracing subscriber: {0}")]
pub struct InitError(#[from] tracing::subscriber::SetGlobalDefaultError);

/// Install a global `tracing` subscriber that feeds `writer`.
///
/// **Parameters**
/// - `writer`: the [`BatchWriter`] receiving every captured event. Keep a
///   clone of the `Arc` to [`close`](BatchWriter::close) it on shutdown.
/// - `config`: [`LayerConfig`] controlling level and console output.
pub fn init_tracing_with_config(
    writer: Arc<BatchWriter>,
    config: LayerConfig,
) -> Result<(), InitError> {
    let layer = BatchLayer::new(writer).with_max_level(config.max_level);

    // The two variants have different subscriber types, so each is
    // installed separately.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Initialize tracing with [`LayerConfig::default`].
pub fn init_tracing(writer: Arc<BatchWriter>) -> Result<(), InitError> {
    init_tracing_with_config(writer, LayerConfig::default())
}
