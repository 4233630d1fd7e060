use crate::env::{
    env_opt, env_or, JOURNAL_BASE_PATH_ENV, JOURNAL_DIR_NAME_ENV, JOURNAL_EVENT_POLICY_ENV,
    JOURNAL_FILENAME_ENV, JOURNAL_KEEP_DAYS_ENV, JOURNAL_MAX_SIZE_ENV,
};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_LOG_DIR_NAME: &str = "tb-logs";
pub const DEFAULT_LOG_FILENAME: &str = "wc_checkout_guard.log";
pub const DEFAULT_MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
pub const MIN_MAX_LOG_SIZE: u64 = 1024;
pub const DEFAULT_PURGE_KEEP_DAYS: u32 = 14;

/// How the validator treats `event` values outside the known vocabulary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPolicy {
    /// Unknown events are rejected.
    #[default]
    Strict,
    /// Unknown events are accepted and a warning is emitted.
    Lenient,
}

impl FromStr for EventPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(EventPolicy::Strict),
            "lenient" => Ok(EventPolicy::Lenient),
            _ => Err(ConfigError::InvalidValue {
                key: "event_policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Journal configuration.
///
/// **Fields**
/// - `log_base_path`: directory that will contain the log directory.
/// - `log_dir_name`: name of the log directory under `log_base_path`.
/// - `log_filename`: name of the active log file.
/// - `max_log_size`: once the active file is larger than this many bytes,
///   the next append rotates it first.
/// - `purge_keep_days`: rotated files older than this are deleted.
/// - `event_policy`: see [`EventPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub log_base_path: PathBuf,
    pub log_dir_name: String,
    pub log_filename: String,
    pub max_log_size: u64,
    pub purge_keep_days: u32,
    pub event_policy: EventPolicy,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_base_path: std::env::temp_dir(),
            log_dir_name: DEFAULT_LOG_DIR_NAME.to_string(),
            log_filename: DEFAULT_LOG_FILENAME.to_string(),
            max_log_size: DEFAULT_MAX_LOG_SIZE,
            purge_keep_days: DEFAULT_PURGE_KEEP_DAYS,
            event_policy: EventPolicy::Strict,
        }
    }
}

/// Partial configuration; `None` fields keep the current value on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigPatch {
    pub log_base_path: Option<PathBuf>,
    pub log_dir_name: Option<String>,
    pub log_filename: Option<String>,
    pub max_log_size: Option<u64>,
    pub purge_keep_days: Option<u32>,
    pub event_policy: Option<EventPolicy>,
}

impl LoggerConfig {
    /// Creates a config rooted at `base_path` with every other field at its default.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            log_base_path: base_path.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_log_size(mut self, bytes: u64) -> Self {
        self.max_log_size = bytes;
        self
    }

    #[must_use]
    pub fn with_purge_keep_days(mut self, days: u32) -> Self {
        self.purge_keep_days = days;
        self
    }

    #[must_use]
    pub fn with_event_policy(mut self, policy: EventPolicy) -> Self {
        self.event_policy = policy;
        self
    }

    /// Directory holding the active and rotated log files.
    pub fn log_dir(&self) -> PathBuf {
        self.log_base_path.join(&self.log_dir_name)
    }

    /// Full path of the active log file.
    pub fn log_file_path(&self) -> PathBuf {
        self.log_dir().join(&self.log_filename)
    }

    /// Shallow merge: returns a new config where every field set in `patch`
    /// replaces the current one.
    #[must_use]
    pub fn merge(&self, patch: &ConfigPatch) -> LoggerConfig {
        let patch = patch.clone();
        LoggerConfig {
            log_base_path: patch.log_base_path.unwrap_or_else(|| self.log_base_path.clone()),
            log_dir_name: patch.log_dir_name.unwrap_or_else(|| self.log_dir_name.clone()),
            log_filename: patch.log_filename.unwrap_or_else(|| self.log_filename.clone()),
            max_log_size: patch.max_log_size.unwrap_or(self.max_log_size),
            purge_keep_days: patch.purge_keep_days.unwrap_or(self.purge_keep_days),
            event_policy: patch.event_policy.unwrap_or(self.event_policy),
        }
    }

    /// Check the configuration against the documented bounds.
    ///
    /// The journal keeps working with a config that fails this check; it
    /// exists so hosts can refuse bad settings at their own boundary.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_base_path.as_os_str().is_empty() {
            return Err(ConfigError::Empty("log_base_path"));
        }
        if self.log_dir_name.trim().is_empty() {
            return Err(ConfigError::Empty("log_dir_name"));
        }
        if self.log_filename.trim().is_empty() {
            return Err(ConfigError::Empty("log_filename"));
        }
        if self.max_log_size < MIN_MAX_LOG_SIZE {
            return Err(ConfigError::MaxLogSizeTooSmall {
                min: MIN_MAX_LOG_SIZE,
                actual: self.max_log_size,
            });
        }
        if self.purge_keep_days < 1 {
            return Err(ConfigError::KeepDaysTooSmall);
        }
        Ok(())
    }

    /// Build a config from `CHECKOUT_JOURNAL_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = LoggerConfig::default();

        let mut config = LoggerConfig {
            log_base_path: env_opt(JOURNAL_BASE_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_base_path),
            log_dir_name: env_or(JOURNAL_DIR_NAME_ENV, DEFAULT_LOG_DIR_NAME),
            log_filename: env_or(JOURNAL_FILENAME_ENV, DEFAULT_LOG_FILENAME),
            ..defaults
        };

        if let Some(raw) = env_opt(JOURNAL_MAX_SIZE_ENV) {
            config.max_log_size = parse_number("max_log_size", &raw)?;
        }
        if let Some(raw) = env_opt(JOURNAL_KEEP_DAYS_ENV) {
            config.purge_keep_days = parse_number("purge_keep_days", &raw)?;
        }
        if let Some(raw) = env_opt(JOURNAL_EVENT_POLICY_ENV) {
            config.event_policy = raw.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_number<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}
