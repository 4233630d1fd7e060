//! File-backed journal storage with rotation support.
//!
//! This module provides:
//! - [`LogStore`]: owner of the active log file and its directory
//! - Size-based rotation to `<file>.<YYYYMMDD_HHMMSS>`
//! - Retention purge keyed on the timestamp encoded in rotated file names
//! - Tail reads of the active file
//!
//! Appends take an advisory exclusive lock on the log file, so several
//! processes can share one journal. Rotation is a plain rename and is not
//! coordinated with appends from other processes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use fs4::fs_std::FileExt;

use crate::config::LoggerConfig;
use crate::error::{LogError, Result};
use crate::fallback::{FallbackSink, TracingFallback};
use crate::record::{LogRecord, Payload};
use crate::sanitize::sanitize_payload;
use crate::tail::{tail_or_placeholder, DEFAULT_TAIL_BUFFER};

/// Suffix layout of rotated files.
pub const ROTATION_SUFFIX_FORMAT: &str = "%Y%m%d_%H%M%S";
const ROTATION_SUFFIX_LEN: usize = 15;

/// Files dropped into the log directory to keep web servers from serving it.
pub const MARKER_FILES: [(&str, &str); 2] = [
    (".htaccess", "Deny from all\n"),
    ("index.php", "<?php // Silence is golden.\n"),
];

pub struct LogStore {
    config: LoggerConfig,
    log_dir: PathBuf,
    log_file_path: PathBuf,
    fallback: Arc<dyn FallbackSink>,
}

impl LogStore {
    /// Creates a store that diverts failed writes to [`TracingFallback`].
    pub fn new(config: &LoggerConfig) -> Self {
        Self::with_fallback(config, Arc::new(TracingFallback))
    }

    pub fn with_fallback(config: &LoggerConfig, fallback: Arc<dyn FallbackSink>) -> Self {
        Self {
            config: config.clone(),
            log_dir: config.log_dir(),
            log_file_path: config.log_file_path(),
            fallback,
        }
    }

    /// Swap in a new configuration; derived paths are recomputed before
    /// this returns.
    pub fn update_config(&mut self, config: &LoggerConfig) {
        self.config = config.clone();
        self.log_dir = config.log_dir();
        self.log_file_path = config.log_file_path();
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn file_exists(&self) -> bool {
        self.log_file_path.is_file()
    }

    /// Size of the active file in bytes, 0 when it does not exist.
    pub fn file_size(&self) -> u64 {
        fs::metadata(&self.log_file_path)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Create the log directory and its marker files if missing.
    ///
    /// Safe to call any number of times; existing markers are left alone.
    pub fn ensure_directory_secure(&self) -> Result<()> {
        fs::create_dir_all(&self.log_dir)?;

        for (name, content) in MARKER_FILES {
            let marker = self.log_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&marker) {
                Ok(mut file) => file.write_all(content.as_bytes())?,
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    /// Sanitize `payload`, stamp it and append it as one JSON line.
    ///
    /// Rotates first when the active file is over the size ceiling. When the
    /// directory is unusable or the write fails, the line goes to the
    /// fallback sink and an error is returned.
    pub fn append(&self, payload: &Payload) -> Result<()> {
        if let Err(err) = self.ensure_directory_secure() {
            tracing::debug!(dir = %self.log_dir.display(), error = %err, "could not secure log directory");
        }

        let record = LogRecord::now(sanitize_payload(payload));
        let line = serde_json::to_string(&record)?;

        if !is_writable_dir(&self.log_dir) {
            let err = LogError::DirectoryUnavailable(self.log_dir.clone());
            self.fallback.divert(&line, &err);
            return Err(err);
        }

        if self.should_rotate() {
            if let Err(err) = self.rotate() {
                tracing::warn!(path = %self.log_file_path.display(), error = %err, "log rotation failed");
            }
        }

        if let Err(err) = self.write_line(&line) {
            let err = LogError::Io(err);
            self.fallback.divert(&line, &err);
            return Err(err);
        }

        Ok(())
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)?;

        FileExt::lock_exclusive(&file)?;
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        let written = file.write_all(buf.as_bytes()).and_then(|()| file.flush());
        let unlocked = FileExt::unlock(&file);

        written.and(unlocked)
    }

    /// True when the active file exists and is larger than `max_log_size`.
    pub fn should_rotate(&self) -> bool {
        fs::metadata(&self.log_file_path)
            .map(|m| m.is_file() && m.len() > self.config.max_log_size)
            .unwrap_or(false)
    }

    /// Rename the active file to `<path>.<YYYYMMDD_HHMMSS>` and purge
    /// expired rotations. Returns the rotated path.
    pub fn rotate(&self) -> Result<PathBuf> {
        self.rotate_at(Utc::now())
    }

    fn rotate_at(&self, now: DateTime<Utc>) -> Result<PathBuf> {
        if !self.file_exists() {
            return Err(LogError::NothingToRotate);
        }

        let target = rotated_path(&self.log_file_path, now);
        fs::rename(&self.log_file_path, &target)?;
        tracing::info!(rotated = %target.display(), "log file rotated");

        self.purge_expired_rotations_at(now);
        Ok(target)
    }

    /// Delete rotated files older than `purge_keep_days`. Returns how many
    /// were deleted.
    pub fn purge_expired_rotations(&self) -> usize {
        self.purge_expired_rotations_at(Utc::now())
    }

    /// Age is taken from the file name suffix, not the filesystem. Names
    /// whose suffix does not parse are never deleted.
    pub fn purge_expired_rotations_at(&self, now: DateTime<Utc>) -> usize {
        let Some(basename) = self.log_file_path.file_name().and_then(|n| n.to_str()) else {
            return 0;
        };
        let prefix = format!("{basename}.");

        let entries = match fs::read_dir(&self.log_dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(dir = %self.log_dir.display(), error = %err, "purge skipped");
                return 0;
            }
        };

        let retention = Duration::days(i64::from(self.config.purge_keep_days));
        let mut deleted = 0;

        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !name.starts_with(&prefix) {
                continue;
            }
            let Some(rotated_at) = parse_rotation_suffix(name) else {
                continue;
            };

            if now.signed_duration_since(rotated_at) > retention {
                match fs::remove_file(entry.path()) {
                    Ok(()) => deleted += 1,
                    Err(err) => tracing::warn!(file = name, error = %err, "could not purge rotated log"),
                }
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, "purged expired log rotations");
        }
        deleted
    }

    /// Last `max_lines` lines of `path`, or [`crate::tail::TAIL_UNAVAILABLE`]
    /// when it cannot be opened.
    pub fn tail(&self, path: &Path, max_lines: usize, buffer_size: usize) -> String {
        tail_or_placeholder(path, max_lines, buffer_size)
    }

    /// Last `max_lines` lines of the active file.
    pub fn tail_active(&self, max_lines: usize) -> String {
        self.tail(&self.log_file_path, max_lines, DEFAULT_TAIL_BUFFER)
    }
}

fn is_writable_dir(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

/// `<path>.<YYYYMMDD_HHMMSS>` for a rotation happening at `at`.
pub fn rotated_path(path: &Path, at: DateTime<Utc>) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(at.format(ROTATION_SUFFIX_FORMAT).to_string());
    PathBuf::from(name)
}

/// Parse the trailing `YYYYMMDD_HHMMSS` of a rotated file name (UTC).
pub fn parse_rotation_suffix(name: &str) -> Option<DateTime<Utc>> {
    let start = name.len().checked_sub(ROTATION_SUFFIX_LEN)?;
    let suffix = name.get(start..)?;
    NaiveDateTime::parse_from_str(suffix, ROTATION_SUFFIX_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;
    use chrono::TimeZone;
    use parking_lot::Mutex;
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingFallback {
        lines: Mutex<Vec<String>>,
    }

    impl FallbackSink for RecordingFallback {
        fn divert(&self, line: &str, _reason: &LogError) {
            self.lines.lock().push(line.to_string());
        }
    }

    fn make_temp_store(config: impl FnOnce(LoggerConfig) -> LoggerConfig) -> (LogStore, TempDir) {
        let temp_dir = TempDir::new().expect("create temp dir");
        let config = config(LoggerConfig::new(temp_dir.path()));
        (LogStore::new(&config), temp_dir)
    }

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    fn rotated_files(store: &LogStore) -> Vec<PathBuf> {
        let prefix = format!("{}.", store.path().file_name().unwrap().to_str().unwrap());
        let mut files: Vec<PathBuf> = fs::read_dir(store.log_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_str().unwrap().starts_with(&prefix))
            .map(|e| e.path())
            .collect();
        files.sort();
        files
    }

    #[test]
    fn path_is_derived_from_config() {
        let (store, dir) = make_temp_store(|c| c);
        assert_eq!(store.path(), dir.path().join("tb-logs").join("wc_checkout_guard.log"));
        assert!(!store.file_exists());
        assert_eq!(store.file_size(), 0);
    }

    #[test]
    fn ensure_directory_secure_is_idempotent() {
        let (store, _dir) = make_temp_store(|c| c);
        store.ensure_directory_secure().unwrap();
        fs::write(store.log_dir().join("index.php"), "custom").unwrap();
        store.ensure_directory_secure().unwrap();

        let mut names: Vec<String> = fs::read_dir(store.log_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec![".htaccess", "index.php"]);
        assert_eq!(
            fs::read_to_string(store.log_dir().join(".htaccess")).unwrap(),
            "Deny from all\n"
        );
        // existing markers are never rewritten
        assert_eq!(fs::read_to_string(store.log_dir().join("index.php")).unwrap(), "custom");
    }

    #[test]
    fn append_writes_one_json_line() {
        let (store, _dir) = make_temp_store(|c| c);
        store
            .append(&payload(json!({"event": "visit_commander", "url": "https://shop.test/checkout/", "who": "Zoë"})))
            .unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        assert!(content.ends_with('\n'));
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("https://shop.test/checkout/"));
        assert!(content.contains("Zoë"));

        let record = LogRecord::from_line(content.trim_end()).unwrap();
        assert_eq!(record.data["event"], "visit_commander");
        assert_eq!(record.time.len(), "2024-01-01 00:00:00".len());
    }

    #[test]
    fn append_sanitizes_payload() {
        let (store, _dir) = make_temp_store(|c| c);
        store
            .append(&payload(json!({"note": "<b>hi</b>\nthere", "ip": " 1.2.3.4"})))
            .unwrap();

        let record = LogRecord::from_line(store.tail_active(1).as_str()).unwrap();
        assert_eq!(record.data["note"], "hi there");
        assert_eq!(record.data["ip"], " 1.2.3.4");
    }

    #[test]
    fn unusable_directory_diverts_to_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let fallback = Arc::new(RecordingFallback::default());
        let store = LogStore::with_fallback(&LoggerConfig::new(&blocker), fallback.clone());

        let err = store.append(&payload(json!({"event": "visit_commander"}))).unwrap_err();
        assert!(matches!(err, LogError::DirectoryUnavailable(_)));

        let diverted = fallback.lines.lock();
        assert_eq!(diverted.len(), 1);
        assert!(diverted[0].contains("visit_commander"));
    }

    #[test]
    fn failed_write_diverts_to_fallback() {
        let temp_dir = TempDir::new().unwrap();
        let fallback = Arc::new(RecordingFallback::default());
        let store = LogStore::with_fallback(&LoggerConfig::new(temp_dir.path()), fallback.clone());
        store.ensure_directory_secure().unwrap();
        // the directory stays writable but the active path cannot be appended to
        fs::create_dir(store.path()).unwrap();

        let err = store.append(&payload(json!({"event": "block_checkout_blocks"}))).unwrap_err();
        assert!(matches!(err, LogError::Io(_)));

        let diverted = fallback.lines.lock();
        assert_eq!(diverted.len(), 1);
        assert!(diverted[0].contains("block_checkout_blocks"));
    }

    #[test]
    fn rotation_happens_once_ceiling_is_exceeded() {
        let (store, _dir) = make_temp_store(|c| c.with_max_log_size(100));
        let record = payload(json!({"event": "block_checkout_legacy", "cart_count": 2}));

        while !store.should_rotate() {
            store.append(&record).unwrap();
        }
        let before = fs::read_to_string(store.path()).unwrap();
        assert!(rotated_files(&store).is_empty());

        store.append(&record).unwrap();

        let rotated = rotated_files(&store);
        assert_eq!(rotated.len(), 1);
        assert_eq!(fs::read_to_string(&rotated[0]).unwrap(), before);
        assert_eq!(fs::read_to_string(store.path()).unwrap().lines().count(), 1);

        let name = rotated[0].file_name().unwrap().to_str().unwrap();
        assert!(parse_rotation_suffix(name).is_some());
    }

    #[test]
    fn rotate_without_active_file_fails() {
        let (store, _dir) = make_temp_store(|c| c);
        assert!(matches!(store.rotate(), Err(LogError::NothingToRotate)));
    }

    #[test]
    fn rotated_path_appends_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 1).unwrap();
        assert_eq!(
            rotated_path(Path::new("/logs/guard.log"), at),
            PathBuf::from("/logs/guard.log.20240229_235901")
        );
        assert_eq!(parse_rotation_suffix("guard.log.20240229_235901"), Some(at));
        assert_eq!(parse_rotation_suffix("guard.log.old"), None);
        assert_eq!(parse_rotation_suffix("guard.log.2024022x_235901"), None);
    }

    #[test]
    fn purge_deletes_only_expired_parsable_rotations() {
        let (store, _dir) = make_temp_store(|c| c.with_purge_keep_days(14));
        store.ensure_directory_secure().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();

        let old = rotated_path(store.path(), now - Duration::days(20));
        let recent = rotated_path(store.path(), now - Duration::days(5));
        let garbage = store.log_dir().join("wc_checkout_guard.log.backup");
        let other = store.log_dir().join("other.log.20200101_000000");
        for path in [&old, &recent, &garbage, &other] {
            fs::write(path, "{}\n").unwrap();
        }

        assert_eq!(store.purge_expired_rotations_at(now), 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(garbage.exists());
        assert!(other.exists());

        assert_eq!(store.purge_expired_rotations_at(now), 0);
    }

    #[test]
    fn purge_on_missing_directory_returns_zero() {
        let (store, _dir) = make_temp_store(|c| c);
        assert_eq!(store.purge_expired_rotations(), 0);
    }

    #[test]
    fn update_config_moves_the_active_file() {
        let (mut store, dir) = make_temp_store(|c| c);
        let moved = LoggerConfig::new(dir.path().join("elsewhere"));
        store.update_config(&moved);

        assert_eq!(store.path(), moved.log_file_path());
        store.append(&payload(json!({"event": "log_message"}))).unwrap();
        assert!(moved.log_file_path().is_file());
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let (store, _dir) = make_temp_store(|c| c);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for seq in 0..50 {
                        store
                            .append(&payload(json!({"event": "visit_commander", "worker": worker, "seq": seq})))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.lines().count(), 400);
        for line in content.lines() {
            LogRecord::from_line(line).unwrap();
        }
    }
}
