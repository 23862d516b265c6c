//! End-to-end tests for the ingestion pipeline: fixture fold, scan
//! orchestration, dedup idempotence, and the live watcher.

use rubric_core::ingest::{fold_file, process_file, scan_directory};
use rubric_core::{Grade, ScoreStore, SessionWatcher, WatcherState};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/rollout-2025-11-24T10-00-00-e2e-sample.jsonl")
}

/// A minimal transcript: `tools` distinct tool calls plus enough message
/// events to pad the session to `extra_events` more lines.
fn write_transcript(path: &Path, tools: usize, extra_events: usize) {
    let mut body = String::new();
    for i in 0..tools {
        body.push_str(&format!(
            "{{\"timestamp\":\"2025-11-24T10:00:{:02}Z\",\"type\":\"response_item\",\"payload\":{{\"type\":\"function_call\",\"name\":\"tool-{}\"}}}}\n",
            i, i
        ));
    }
    for i in 0..extra_events {
        body.push_str(&format!(
            "{{\"timestamp\":\"2025-11-24T10:01:{:02}Z\",\"type\":\"response_item\",\"payload\":{{\"type\":\"message\",\"role\":\"assistant\"}}}}\n",
            i
        ));
    }
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn fixture_folds_into_expected_metrics() {
    let folded = fold_file(&fixture_path()).unwrap();
    let m = &folded.metrics;

    assert_eq!(m.total_events, 10);
    assert_eq!(m.tool_calls, 3);
    assert_eq!(m.distinct_tools(), 2);
    assert_eq!(m.tool_breakdown["shell"], 2);
    assert_eq!(m.tool_breakdown["read"], 1);
    assert_eq!(m.errors, 2);
    assert_eq!(m.reasoning_events, 1);
    assert_eq!(m.user_messages, 1);
    assert_eq!(m.assistant_messages, 1);
    assert_eq!(m.duration_ms, Some(10_000));
    assert_eq!(folded.skipped_lines, 1);
}

#[test]
fn fixture_scores_end_to_end() {
    let dir = TempDir::new().unwrap();
    let store = ScoreStore::new(dir.path().join("scores.json"));

    let score = process_file(&store, &fixture_path()).unwrap().unwrap();

    // 100 - 2*10 + min(3*2, 15) + min(5*1, 10) = 91
    assert_eq!(score.score, 91.0);
    assert_eq!(score.grade, Grade::A);
    assert_eq!(score.session_id, "2025-11-24T10-00-00-e2e-sample");
    assert_eq!(
        score.summary,
        "10 events, 3 tool calls, 2 errors, 1 reasoning steps"
    );

    let report = store.load().unwrap();
    assert_eq!(report.total_sessions, 1);
    assert!(report.contains_path(&fixture_path()));
}

#[test]
fn processing_the_same_path_twice_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let store = ScoreStore::new(dir.path().join("scores.json"));

    let first = process_file(&store, &fixture_path()).unwrap();
    assert!(first.is_some());
    let second = process_file(&store, &fixture_path()).unwrap();
    assert!(second.is_none());

    let report = store.load().unwrap();
    assert_eq!(report.total_sessions, 1);
    assert_eq!(report.scores.len(), 1);
}

#[test]
fn scan_appends_only_unseen_files() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sessions");
    let store = ScoreStore::new(dir.path().join("scores.json"));

    // Two files scored ahead of the scan.
    for name in ["rollout-old-1.jsonl", "rollout-old-2.jsonl"] {
        let path = root.join("2025/11/24").join(name);
        write_transcript(&path, 2, 4);
        process_file(&store, &path).unwrap();
    }

    // Three new files.
    for name in ["rollout-new-1.jsonl", "rollout-new-2.jsonl", "rollout-new-3.jsonl"] {
        write_transcript(&root.join("2025/11/25").join(name), 1, 5);
    }

    let before = store.load().unwrap();
    let outcome = scan_directory(&store, &root).unwrap();

    assert_eq!(outcome.files_seen, 5);
    assert_eq!(outcome.newly_scored, 3);
    assert_eq!(outcome.skipped_existing, 2);
    assert!(outcome.errors.is_empty());

    let after = store.load().unwrap();
    assert_eq!(after.total_sessions, before.total_sessions + 3);
}

#[test]
fn rescan_never_mutates_existing_entries() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sessions");
    let store = ScoreStore::new(dir.path().join("scores.json"));

    write_transcript(&root.join("rollout-a.jsonl"), 3, 6);
    scan_directory(&store, &root).unwrap();
    let first = store.load().unwrap();

    // The file changes on disk, but its entry is already committed.
    write_transcript(&root.join("rollout-a.jsonl"), 1, 1);
    let outcome = scan_directory(&store, &root).unwrap();
    assert_eq!(outcome.newly_scored, 0);

    let second = store.load().unwrap();
    assert_eq!(second.total_sessions, first.total_sessions);
    assert_eq!(second.scores[0].score, first.scores[0].score);
    assert_eq!(second.scores[0].created_at, first.scores[0].created_at);
    // lastScan moves forward; entries do not.
    assert!(second.last_scan >= first.last_scan);
}

#[test]
fn scan_survives_an_unreadable_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sessions");
    let store = ScoreStore::new(dir.path().join("scores.json"));

    write_transcript(&root.join("rollout-good.jsonl"), 2, 4);
    // A directory with a transcript extension reads as an error, not a file.
    fs::create_dir_all(root.join("rollout-bad.jsonl")).unwrap();

    let outcome = scan_directory(&store, &root).unwrap();
    assert_eq!(outcome.newly_scored, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(store.load().unwrap().total_sessions, 1);
}

fn wait_for<F: Fn() -> bool>(what: &str, timeout: Duration, check: F) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("timed out waiting for {}", what);
}

#[test]
fn watcher_scores_new_files_once() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("sessions");
    let nested = root.join("2025/11/26");
    fs::create_dir_all(&nested).unwrap();

    // One pre-existing file the initial scan must pick up.
    let preexisting = nested.join("rollout-preexisting.jsonl");
    write_transcript(&preexisting, 2, 4);

    let store = Arc::new(ScoreStore::new(dir.path().join("scores.json")));
    let watcher = Arc::new(SessionWatcher::new(
        Arc::clone(&store),
        root.clone(),
        Duration::from_millis(50),
    ));

    let runner = {
        let watcher = Arc::clone(&watcher);
        thread::spawn(move || watcher.run())
    };

    wait_for("watcher to reach Watching", Duration::from_secs(10), || {
        watcher.state() == WatcherState::Watching
    });
    assert!(store.exists(&preexisting).unwrap());

    // A new file written in two rapid bursts: several notifications, one
    // store entry after the debounce settles.
    let live = nested.join("rollout-live.jsonl");
    write_transcript(&live, 3, 3);
    thread::sleep(Duration::from_millis(10));
    let mut file = OpenOptions::new().append(true).open(&live).unwrap();
    writeln!(
        file,
        "{}",
        r#"{"timestamp":"2025-11-24T10:02:00Z","type":"response_item","payload":{"type":"reasoning"}}"#
    )
    .unwrap();
    drop(file);

    wait_for("live file to be scored", Duration::from_secs(10), || {
        store.exists(&live).unwrap()
    });

    // Let any straggler notifications drain, then check for duplicates.
    thread::sleep(Duration::from_millis(500));
    let report = store.load().unwrap();
    let live_entries = report
        .scores
        .iter()
        .filter(|s| s.source_path.as_deref() == Some(live.as_path()))
        .count();
    assert_eq!(live_entries, 1);
    assert_eq!(report.total_sessions, 2);

    watcher.stop();
    runner.join().unwrap().unwrap();
    assert_eq!(watcher.state(), WatcherState::Stopped);
}
