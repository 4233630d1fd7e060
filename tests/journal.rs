use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use checkout_journal::config::{ConfigPatch, EventPolicy, LoggerConfig};
use checkout_journal::env::{JOURNAL_BASE_PATH_ENV, JOURNAL_EVENT_POLICY_ENV, JOURNAL_KEEP_DAYS_ENV};
use checkout_journal::record::{LogRecord, Payload, KNOWN_EVENTS};
use checkout_journal::sanitize::sanitize_payload;
use checkout_journal::store::{parse_rotation_suffix, rotated_path, LogStore};
use checkout_journal::tail::TAIL_UNAVAILABLE;
use checkout_journal::LogFacade;
use serde_json::json;
use tempfile::TempDir;

fn payload(value: serde_json::Value) -> Payload {
    value.as_object().cloned().expect("object payload")
}

fn make_facade(config: impl FnOnce(LoggerConfig) -> LoggerConfig) -> (Arc<LogFacade>, TempDir) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let facade = LogFacade::assemble(config(LoggerConfig::new(temp_dir.path())));
    (facade, temp_dir)
}

fn rotations(dir: &Path, basename: &str) -> Vec<PathBuf> {
    let prefix = format!("{basename}.");
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read log dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
        .map(|e| e.path())
        .collect();
    found.sort();
    found
}

#[test]
fn every_known_event_round_trips_through_tail() {
    let (facade, _dir) = make_facade(|c| c);

    for event in KNOWN_EVENTS {
        let original = payload(json!({
            "event": event,
            "ip_hash": "9f86d081",
            "cart_count": 2,
            "page": "https://shop.test/commander/",
            "note": "  deux articles <em>refusés</em> ",
        }));
        facade.log_structured(&original).expect("known event is journaled");

        let line = facade.tail(1);
        let record = LogRecord::from_line(&line).expect("tail yields a JSON line");
        assert_eq!(record.data, sanitize_payload(&original));
        assert_eq!(record.data["note"], "deux articles refusés");
    }
}

#[test]
fn lines_keep_unicode_and_slashes_literal() {
    let (facade, _dir) = make_facade(|c| c);
    facade
        .log_structured(&payload(json!({"event": "redirect_checkout_to_cart", "to": "/panier/ → café"})))
        .unwrap();

    let raw = fs::read_to_string(facade.log_file_path()).unwrap();
    assert!(raw.contains(r#""to":"/panier/ → café""#));
    assert!(raw.starts_with(r#"{"time":""#));
}

#[test]
fn unknown_events_follow_the_configured_policy() {
    let (facade, _dir) = make_facade(|c| c);
    let unknown = payload(json!({"event": "coupon_applied"}));

    assert!(facade.log_structured(&unknown).is_err());
    assert!(!facade.stats().exists);

    facade.update_config(&ConfigPatch {
        event_policy: Some(EventPolicy::Lenient),
        ..Default::default()
    });
    assert!(facade.log_structured(&unknown).is_ok());
    assert!(facade.stats().exists);
}

#[test]
fn size_triggered_rotation_preserves_previous_content() {
    let (facade, _dir) = make_facade(|c| c.with_max_log_size(100));
    let record = payload(json!({"event": "block_checkout_blocks", "cart_count": 3}));
    let path = facade.log_file_path();
    let dir = path.parent().unwrap().to_path_buf();
    let basename = path.file_name().unwrap().to_string_lossy().into_owned();

    while facade.stats().size <= 100 {
        facade.log_structured(&record).unwrap();
    }
    let before = fs::read_to_string(&path).unwrap();
    assert!(rotations(&dir, &basename).is_empty());

    facade.log_structured(&record).unwrap();

    let rotated = rotations(&dir, &basename);
    assert_eq!(rotated.len(), 1);
    assert_eq!(fs::read_to_string(&rotated[0]).unwrap(), before);
    assert!(parse_rotation_suffix(&rotated[0].file_name().unwrap().to_string_lossy()).is_some());
    assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
}

#[test]
fn retention_purge_removes_only_expired_rotation() {
    let temp_dir = TempDir::new().unwrap();
    let config = LoggerConfig::new(temp_dir.path()).with_purge_keep_days(14);
    let store = LogStore::new(&config);
    store.ensure_directory_secure().unwrap();

    let now = Utc::now();
    let twenty_days = rotated_path(store.path(), now - Duration::days(20));
    let five_days = rotated_path(store.path(), now - Duration::days(5));
    fs::write(&twenty_days, "old\n").unwrap();
    fs::write(&five_days, "recent\n").unwrap();

    assert_eq!(store.purge_expired_rotations(), 1);
    assert!(!twenty_days.exists());
    assert!(five_days.exists());
}

#[test]
fn tail_returns_exact_last_lines() {
    let (facade, _dir) = make_facade(|c| c);
    let path = facade.log_file_path();
    let content: String = (1..=1000).map(|i| format!("entry {i:04}\n")).collect();
    fs::write(&path, &content).unwrap();

    let tail = facade.tail(50);
    let expected: Vec<String> = (951..=1000).map(|i| format!("entry {i:04}")).collect();
    assert_eq!(tail, expected.join("\n"));
    assert!(!tail.starts_with('\n'));
    assert!(!tail.ends_with('\n'));

    assert_eq!(facade.tail(5000), content.trim_end_matches('\n'));
}

#[test]
fn tail_of_missing_file_is_a_placeholder() {
    let (facade, _dir) = make_facade(|c| c);
    assert_eq!(facade.tail(10), TAIL_UNAVAILABLE);
}

#[test]
fn directory_securing_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let store = LogStore::new(&LoggerConfig::new(temp_dir.path()));

    store.ensure_directory_secure().unwrap();
    store.ensure_directory_secure().unwrap();

    let entries: Vec<_> = fs::read_dir(store.log_dir()).unwrap().collect();
    assert_eq!(entries.len(), 2);
}

#[test]
fn config_can_be_read_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    std::env::set_var(JOURNAL_BASE_PATH_ENV, temp_dir.path());
    std::env::set_var(JOURNAL_KEEP_DAYS_ENV, "30");
    std::env::set_var(JOURNAL_EVENT_POLICY_ENV, "lenient");

    let config = LoggerConfig::from_env().expect("valid environment");

    std::env::remove_var(JOURNAL_BASE_PATH_ENV);
    std::env::remove_var(JOURNAL_KEEP_DAYS_ENV);
    std::env::remove_var(JOURNAL_EVENT_POLICY_ENV);

    assert_eq!(config.log_base_path, temp_dir.path());
    assert_eq!(config.purge_keep_days, 30);
    assert_eq!(config.event_policy, EventPolicy::Lenient);
    assert_eq!(config.log_filename, "wc_checkout_guard.log");
}
