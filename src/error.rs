use std::path::PathBuf;
use thiserror::Error;

/// Why a payload was refused by [`crate::validator::LogValidator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("event must be a non-empty string of at most {max} characters")]
    InvalidEvent { max: usize },

    #[error("event is not in the known vocabulary: {0}")]
    UnknownEvent(String),

    #[error("message must be a non-empty string of at most {max} characters")]
    InvalidMessage { max: usize },

    #[error("unknown message level: {0}")]
    InvalidLevel(String),

    #[error("unsafe key: {0:?}")]
    InvalidKey(String),

    #[error("unsafe value under key {0:?}")]
    UnsafeValue(String),
}

/// Failure of a journal operation.
///
/// None of these are fatal to the host: callers are expected to look at
/// `is_ok()` and move on.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("record rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("log directory missing or not writable: {}", .0.display())]
    DirectoryUnavailable(PathBuf),

    #[error("no active log file to rotate")]
    NothingToRotate,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LogError {
    /// True when the error came from validation rather than storage.
    pub fn is_rejection(&self) -> bool {
        matches!(self, LogError::Rejected(_))
    }
}

/// Result type alias for journal operations.
pub type Result<T> = std::result::Result<T, LogError>;

/// Invalid or unparsable configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("max_log_size must be at least {min} bytes, got {actual}")]
    MaxLogSizeTooSmall { min: u64, actual: u64 },

    #[error("purge_keep_days must be at least 1")]
    KeepDaysTooSmall,

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
