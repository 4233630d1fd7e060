use crate::error::LogError;
use crate::record::Payload;
use crate::sink::LogSink;
use async_trait::async_trait;

/// A sink that simply drops all payloads.
///
/// Useful for measuring the overhead of the layer itself without any
/// file I/O, and for tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl LogSink for NoopSink {
    async fn send(&self, _payload: &Payload) -> Result<(), LogError> {
        Ok(())
    }
}
