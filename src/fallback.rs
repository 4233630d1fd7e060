use crate::error::LogError;

/// Secondary destination for journal lines that could not be written to
/// the log file.
///
/// Fallback delivery is best effort: implementations must not panic and
/// have no way to report failure.
pub trait FallbackSink: Send + Sync {
    /// Take a serialized journal line (without trailing newline) together
    /// with the reason it was diverted.
    fn divert(&self, line: &str, reason: &LogError);
}

/// Emits diverted lines as `tracing` warnings so they end up in whatever
/// subscriber the host installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFallback;

impl FallbackSink for TracingFallback {
    fn divert(&self, line: &str, reason: &LogError) {
        tracing::warn!(
            target: "checkout_journal::fallback",
            reason = %reason,
            line,
            "journal write diverted"
        );
    }
}

/// Drops diverted lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFallback;

impl FallbackSink for NoopFallback {
    fn divert(&self, _line: &str, _reason: &LogError) {}
}
