//! Structural checks applied to a payload before it may be journaled.
//!
//! Validation is pure: no I/O and no shared state beyond the configured
//! [`EventPolicy`], so a validator can be shared freely between threads.

use crate::config::EventPolicy;
use crate::error::Rejection;
use crate::record::{is_known_event, Level, Payload, RecordKind};
use serde_json::Value;

pub const MAX_EVENT_LEN: usize = 100;
pub const MAX_MESSAGE_LEN: usize = 1000;
pub const MAX_KEY_LEN: usize = 50;
pub const MAX_STRING_VALUE_LEN: usize = 2000;
pub const MAX_CONTAINER_LEN: usize = 50;
pub const MAX_FILEPATH_LEN: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogValidator {
    policy: EventPolicy,
}

impl LogValidator {
    pub fn new(policy: EventPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> EventPolicy {
        self.policy
    }

    /// Boolean form of [`LogValidator::check`].
    pub fn validate(&self, payload: &Payload) -> bool {
        self.check(payload).is_ok()
    }

    /// Decide whether `payload` may be persisted.
    ///
    /// Event records only have their `event` checked, message records only
    /// their `message` and `level`; every other payload goes through the
    /// generic key/value rules.
    pub fn check(&self, payload: &Payload) -> Result<(), Rejection> {
        if payload.is_empty() {
            return Err(Rejection::EmptyPayload);
        }

        match RecordKind::of(payload) {
            RecordKind::Event => self.check_event(&payload["event"]),
            RecordKind::Message => check_message(payload),
            RecordKind::Generic => check_generic(payload),
        }
    }

    fn check_event(&self, event: &Value) -> Result<(), Rejection> {
        let name = match event.as_str() {
            Some(name) if !name.trim().is_empty() && name.chars().count() <= MAX_EVENT_LEN => name,
            _ => return Err(Rejection::InvalidEvent { max: MAX_EVENT_LEN }),
        };

        if is_known_event(name) {
            return Ok(());
        }

        match self.policy {
            EventPolicy::Strict => Err(Rejection::UnknownEvent(name.to_string())),
            EventPolicy::Lenient => {
                tracing::warn!(event = name, "journaling event outside the known vocabulary");
                Ok(())
            }
        }
    }

    /// Whether `path` is acceptable as a log file location: non-blank, no
    /// parent-directory segments, bounded length.
    pub fn is_valid_filepath(&self, path: &str) -> bool {
        !path.trim().is_empty() && !path.contains("..") && path.len() <= MAX_FILEPATH_LEN
    }
}

fn check_message(payload: &Payload) -> Result<(), Rejection> {
    match payload["message"].as_str() {
        Some(message)
            if !message.trim().is_empty() && message.chars().count() <= MAX_MESSAGE_LEN => {}
        _ => return Err(Rejection::InvalidMessage { max: MAX_MESSAGE_LEN }),
    }

    if let Some(level) = payload.get("level") {
        let known = level.as_str().is_some_and(|l| l.parse::<Level>().is_ok());
        if !known {
            return Err(Rejection::InvalidLevel(display_value(level)));
        }
    }

    Ok(())
}

fn check_generic(payload: &Payload) -> Result<(), Rejection> {
    for (key, value) in payload {
        if !is_safe_key(key) {
            return Err(Rejection::InvalidKey(key.clone()));
        }
        if !is_safe_value(value) {
            return Err(Rejection::UnsafeValue(key.clone()));
        }
    }
    Ok(())
}

/// `[a-zA-Z0-9_]{1,50}`
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Scalars are always safe, strings are length-bounded, containers are
/// bounded in size and checked recursively.
pub fn is_safe_value(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => true,
        Value::String(s) => s.chars().count() <= MAX_STRING_VALUE_LEN,
        Value::Array(items) => {
            items.len() <= MAX_CONTAINER_LEN && items.iter().all(is_safe_value)
        }
        Value::Object(map) => {
            map.len() <= MAX_CONTAINER_LEN
                && map.iter().all(|(k, v)| is_safe_key(k) && is_safe_value(v))
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
