use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::config::{ConfigPatch, LoggerConfig};
use crate::error::Result;
use crate::fallback::{FallbackSink, TracingFallback};
use crate::record::{message_payload, Level, Payload};
use crate::store::LogStore;
use crate::tail::{tail_file, DEFAULT_TAIL_BUFFER};
use crate::validator::LogValidator;

/// Default number of lines returned by admin-style tail views.
pub const DEFAULT_TAIL_LINES: usize = 200;

/// Snapshot of the journal's state, suitable for an admin status view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub exists: bool,
    pub size: u64,
    pub path: PathBuf,
    pub max_size: u64,
    pub retention_days: u32,
}

struct Components {
    config: LoggerConfig,
    validator: LogValidator,
    store: LogStore,
}

/// Entry point for everything that wants to journal.
///
/// Every method takes `&self`; share the facade behind an `Arc`. Writes and
/// reads hold the shared side of an internal lock, so concurrent appends
/// still serialize on the file lock only. [`LogFacade::update_config`] holds
/// the exclusive side while validator and store are rebuilt.
pub struct LogFacade {
    components: RwLock<Components>,
}

impl LogFacade {
    /// Build validator and store from `config`, diverting failed writes to
    /// [`TracingFallback`].
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_fallback(config, Arc::new(TracingFallback))
    }

    pub fn with_fallback(config: LoggerConfig, fallback: Arc<dyn FallbackSink>) -> Self {
        let validator = LogValidator::new(config.event_policy);
        let store = LogStore::with_fallback(&config, fallback);
        Self {
            components: RwLock::new(Components {
                config,
                validator,
                store,
            }),
        }
    }

    /// Build the facade and secure its log directory up front.
    ///
    /// A directory that cannot be prepared is reported but does not prevent
    /// construction: appends will divert to the fallback until it is fixed.
    pub fn assemble(config: LoggerConfig) -> Arc<Self> {
        if let Err(err) = config.validate() {
            tracing::warn!(error = %err, "journal configuration is out of bounds");
        }
        let facade = Self::new(config);
        if let Err(err) = facade.components.read().store.ensure_directory_secure() {
            tracing::warn!(error = %err, "could not secure journal directory");
        }
        Arc::new(facade)
    }

    /// Validate `payload` and append it. Rejected payloads leave no trace in
    /// the journal.
    pub fn log_structured(&self, payload: &Payload) -> Result<()> {
        let components = self.components.read();
        if let Err(rejection) = components.validator.check(payload) {
            tracing::debug!(reason = %rejection, "journal record rejected");
            return Err(rejection.into());
        }
        components.store.append(payload)
    }

    /// Journal a `log_message` event carrying `message`, `level` and `context`.
    ///
    /// The payload is checked as an event record, so the message length
    /// and level rules for bare message records do not apply: an empty or
    /// very long message is accepted.
    pub fn log_message(&self, message: &str, level: Level, context: Payload) -> Result<()> {
        self.log_structured(&message_payload(message, level, context))
    }

    pub fn log(&self, message: &str, level: Level, context: Payload) -> Result<()> {
        self.log_message(message, level, context)
    }

    pub fn info(&self, message: &str, context: Payload) -> Result<()> {
        self.log_message(message, Level::Info, context)
    }

    pub fn warning(&self, message: &str, context: Payload) -> Result<()> {
        self.log_message(message, Level::Warning, context)
    }

    pub fn error(&self, message: &str, context: Payload) -> Result<()> {
        self.log_message(message, Level::Error, context)
    }

    /// Last `lines` lines of the active file, or a placeholder text when it
    /// cannot be read.
    pub fn tail(&self, lines: usize) -> String {
        let components = self.components.read();
        let store = &components.store;
        store.tail(store.path(), lines, DEFAULT_TAIL_BUFFER)
    }

    /// Like [`LogFacade::tail`], but reports why the file could not be read.
    pub fn try_tail(&self, lines: usize) -> Result<String> {
        let components = self.components.read();
        Ok(tail_file(components.store.path(), lines, DEFAULT_TAIL_BUFFER)?)
    }

    pub fn stats(&self) -> LogStats {
        let components = self.components.read();
        LogStats {
            exists: components.store.file_exists(),
            size: components.store.file_size(),
            path: components.store.path().to_path_buf(),
            max_size: components.config.max_log_size,
            retention_days: components.config.purge_keep_days,
        }
    }

    /// Rotate now regardless of size. Returns the rotated file's path.
    pub fn force_rotate(&self) -> Result<PathBuf> {
        self.components.read().store.rotate()
    }

    pub fn purge(&self) -> usize {
        self.components.read().store.purge_expired_rotations()
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.components.read().store.path().to_path_buf()
    }

    pub fn config(&self) -> LoggerConfig {
        self.components.read().config.clone()
    }

    /// Merge `patch` into the current configuration and rebuild validator
    /// and store paths before returning.
    pub fn update_config(&self, patch: &ConfigPatch) {
        let mut components = self.components.write();
        let merged = components.config.merge(patch);
        if let Err(err) = merged.validate() {
            tracing::warn!(error = %err, "journal configuration is out of bounds");
        }

        components.validator = LogValidator::new(merged.event_policy);
        components.store.update_config(&merged);
        components.config = merged;
    }
}
