use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered key/value payload of a journal entry.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Timestamp layout written into the `time` field of every line.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Event names the checkout collaborators are allowed to journal.
pub const KNOWN_EVENTS: [&str; 5] = [
    "visit_commander",
    "redirect_checkout_to_cart",
    "block_checkout_blocks",
    "block_checkout_legacy",
    "log_message",
];

/// Event name used for plain messages routed through [`crate::facade::LogFacade::log_message`].
pub const MESSAGE_EVENT: &str = "log_message";

/// One line of the journal, as persisted.
///
/// The wire shape is `{"time": "...", "data": {...}}`; `data` holds the
/// payload after sanitization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: String,
    pub data: Payload,
}

impl LogRecord {
    /// Build a record stamped with the current local wall-clock time.
    pub fn now(data: Payload) -> Self {
        Self::at(Local::now(), data)
    }

    pub fn at(timestamp: DateTime<Local>, data: Payload) -> Self {
        Self {
            time: timestamp.format(RECORD_TIME_FORMAT).to_string(),
            data,
        }
    }

    /// Parse one JSON line back into a record.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Severity attached to message records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Warning,
    Error,
    Debug,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Info, Level::Warning, Level::Error, Level::Debug];

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// Shape of a payload, decided by which reserved key it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Carries an `event` key.
    Event,
    /// Carries a `message` key and no `event` key.
    Message,
    /// Neither reserved key is present.
    Generic,
}

impl RecordKind {
    pub fn of(payload: &Payload) -> Self {
        if payload.contains_key("event") {
            RecordKind::Event
        } else if payload.contains_key("message") {
            RecordKind::Message
        } else {
            RecordKind::Generic
        }
    }
}

pub fn is_known_event(name: &str) -> bool {
    KNOWN_EVENTS.contains(&name)
}

/// Payload of a `log_message` event.
pub fn message_payload(message: &str, level: Level, context: Payload) -> Payload {
    let mut payload = Payload::new();
    payload.insert("event".into(), MESSAGE_EVENT.into());
    payload.insert("level".into(), level.as_str().into());
    payload.insert("message".into(), message.into());
    payload.insert("context".into(), context.into());
    payload
}
