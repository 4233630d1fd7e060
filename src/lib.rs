//! Append-only JSON Lines journal for checkout events.
//!
//! [`facade::LogFacade`] is the entry point: it validates payloads with
//! [`validator::LogValidator`] and hands accepted ones to
//! [`store::LogStore`], which owns the log file, its rotation and purge.
//! With the `layer` feature, [`init`] can route host `tracing` events into
//! the same journal.

pub mod config;
pub mod env;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod record;
pub mod sanitize;
pub mod store;
pub mod tail;
pub mod validator;

#[cfg(feature = "layer")]
pub mod init;
#[cfg(feature = "layer")]
pub mod layer;
#[cfg(feature = "layer")]
pub mod noop_sink;
#[cfg(feature = "layer")]
pub mod sink;

pub use config::{ConfigPatch, EventPolicy, LoggerConfig};
pub use error::{ConfigError, LogError, Rejection};
pub use facade::{LogFacade, LogStats};
pub use record::{Level, LogRecord, Payload};
