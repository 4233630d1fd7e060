use crate::error::LogError;
use crate::facade::LogFacade;
use crate::record::Payload;
use async_trait::async_trait;
use std::io;
use std::sync::Arc;

/// Asynchronous destination for payloads produced by the journal layer.
///
/// The layer calls `send` from a background task and never awaits it on
/// the application thread.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a single payload.
    ///
    /// **Returns**
    /// - `Ok(())` if the payload needs no further attempt: it was stored, or
    ///   the sink already handed it to its own fallback.
    /// - `Err(LogError::Rejected(..))` if it will never be accepted; the
    ///   layer drops it without retrying.
    /// - any other `Err(..)` is treated as transient and retried with
    ///   backoff.
    async fn send(&self, payload: &Payload) -> Result<(), LogError>;

    /// Flush any buffered payloads, if the sink buffers.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), LogError> {
        Ok(())
    }
}

/// [`LogSink`] writing into a [`LogFacade`].
///
/// File I/O runs on Tokio's blocking pool. Storage failures are final here:
/// the store has already diverted the line to its fallback, so a retry
/// would only divert it again.
#[derive(Clone)]
pub struct JournalSink {
    facade: Arc<LogFacade>,
}

impl JournalSink {
    pub fn new(facade: Arc<LogFacade>) -> Self {
        Self { facade }
    }
}

#[async_trait]
impl LogSink for JournalSink {
    async fn send(&self, payload: &Payload) -> Result<(), LogError> {
        let facade = Arc::clone(&self.facade);
        let payload = payload.clone();
        let stored = tokio::task::spawn_blocking(move || facade.log_structured(&payload))
            .await
            .map_err(|join| LogError::Io(io::Error::other(join)))?;

        match stored {
            Err(err) if !err.is_rejection() => {
                tracing::debug!(error = %err, "journal write diverted to fallback");
                Ok(())
            }
            other => other,
        }
    }
}
