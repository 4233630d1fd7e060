use crate::facade::LogFacade;
use crate::layer::JournalLayer;
use crate::sink::{JournalSink, LogSink};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the journal layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of payloads queued before new ones
///   are dropped.
/// - `batch_size`: number of payloads handed to the sink per batch.
/// - `flush_interval`: longest time a partial batch waits before it is
///   flushed.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is
///   installed next to [`JournalLayer`] so events also reach the console.
/// - `min_level`: least severe level that gets journaled.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub enable_stdout: bool,
    pub min_level: Level,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 64,
            flush_interval: Duration::from_secs(1),
            enable_stdout: true,
            min_level: Level::WARN,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInstalled(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Build a [`JournalLayer`] for composing into an existing subscriber.
///
/// Must be called from within a Tokio runtime.
pub fn journal_layer(sink: Arc<dyn LogSink>, config: &LayerConfig) -> (JournalLayer, JoinHandle<()>) {
    JournalLayer::new(
        sink,
        config.channel_buffer,
        config.batch_size,
        config.flush_interval,
        config.min_level,
    )
}

/// Install a global `tracing` subscriber that journals events through
/// `sink`.
///
/// **Returns**
/// - the handle of the background delivery task.
/// - `Err(InitError::AlreadyInstalled)` if the process already has a
///   global subscriber; the layer is discarded in that case.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, InitError> {
    let (layer, handle) = journal_layer(sink, &config);

    // The two subscriber shapes have different types, so each branch
    // installs its own.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(handle)
}

/// Journal host events into `facade` with [`LayerConfig::default`].
pub fn init_tracing(facade: Arc<LogFacade>) -> Result<JoinHandle<()>, InitError> {
    init_tracing_with_config(Arc::new(JournalSink::new(facade)), LayerConfig::default())
}
