//! Environment variable names used by this crate for configuring the
//! journal from a host process.
//!
//! These are purely helpers; [`crate::config::LoggerConfig`] stays usable
//! without any environment access.

/// Directory that contains the log directory, e.g. `/var/www/uploads`.
pub const JOURNAL_BASE_PATH_ENV: &str = "CHECKOUT_JOURNAL_BASE_PATH";

/// Name of the log directory created under the base path.
pub const JOURNAL_DIR_NAME_ENV: &str = "CHECKOUT_JOURNAL_DIR_NAME";

/// File name of the active log file.
pub const JOURNAL_FILENAME_ENV: &str = "CHECKOUT_JOURNAL_FILENAME";

/// Rotation ceiling in bytes.
pub const JOURNAL_MAX_SIZE_ENV: &str = "CHECKOUT_JOURNAL_MAX_SIZE";

/// Retention window for rotated files, in days.
pub const JOURNAL_KEEP_DAYS_ENV: &str = "CHECKOUT_JOURNAL_KEEP_DAYS";

/// `strict` or `lenient` handling of unknown event names.
pub const JOURNAL_EVENT_POLICY_ENV: &str = "CHECKOUT_JOURNAL_EVENT_POLICY";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable, treating unset and empty as absent.
pub fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
