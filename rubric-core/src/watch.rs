//! Live directory watcher
//!
//! Watches the session root recursively and drives the same ingestion
//! pipeline as a scan. The lifecycle is explicit:
//!
//! ```text
//! Idle ──► Scanning ──► Watching ──► Debouncing ──► Processing ─┐
//!                          ▲                                    │
//!                          └────────────────────────────────────┘
//!                    (Stopped is reachable from every state)
//! ```
//!
//! The initial scan completes before the watch is registered, so files that
//! existed before startup are never lost. Each candidate notification gets
//! its own fixed quiet period (the producer may still be writing the file);
//! delays for different files run independently and feed one sequential
//! processing loop, where the dedup-on-reload check absorbs duplicate
//! notifications for the same path.

use crate::error::Result;
use crate::ingest;
use crate::store::ScoreStore;
use crate::types::SessionScore;
use notify::{EventKind as NotifyKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How long the event loop sleeps between shutdown checks.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Observable watcher lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WatcherState {
    Idle = 0,
    Scanning = 1,
    Watching = 2,
    Debouncing = 3,
    Processing = 4,
    Stopped = 5,
}

impl WatcherState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WatcherState::Idle,
            1 => WatcherState::Scanning,
            2 => WatcherState::Watching,
            3 => WatcherState::Debouncing,
            4 => WatcherState::Processing,
            _ => WatcherState::Stopped,
        }
    }
}

/// Progress notice delivered to an attached listener.
pub enum WatchNotice<'a> {
    /// The cold-start scan finished.
    ScanComplete { newly_scored: usize, skipped: usize },
    /// A watched file was scored.
    Scored(&'a SessionScore),
}

type NoticeListener = Box<dyn Fn(WatchNotice<'_>) + Send + Sync>;

/// Watches one root directory and scores new transcripts as they appear.
pub struct SessionWatcher {
    store: Arc<ScoreStore>,
    root: PathBuf,
    debounce: Duration,
    state: Arc<AtomicU8>,
    shutdown: Arc<AtomicBool>,
    listener: Option<NoticeListener>,
}

impl SessionWatcher {
    pub fn new(store: Arc<ScoreStore>, root: PathBuf, debounce: Duration) -> Self {
        Self {
            store,
            root,
            debounce,
            state: Arc::new(AtomicU8::new(WatcherState::Idle as u8)),
            shutdown: Arc::new(AtomicBool::new(false)),
            listener: None,
        }
    }

    /// Attach a listener for console output; tracing stays the source of
    /// record either way.
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(WatchNotice<'_>) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
        self
    }

    fn notify_listener(&self, notice: WatchNotice<'_>) {
        if let Some(listener) = &self.listener {
            listener(notice);
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WatcherState {
        WatcherState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Request a clean stop. Idempotent; the running loop finishes any
    /// in-flight file before releasing the watch handle.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Run until stopped. Blocks the calling thread.
    pub fn run(&self) -> Result<()> {
        let result = self.run_inner();
        self.set_state(WatcherState::Stopped);
        tracing::info!(root = %self.root.display(), "Watcher stopped");
        result
    }

    fn run_inner(&self) -> Result<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }

        // Cold start: score everything already on disk before the live
        // watch exists.
        self.set_state(WatcherState::Scanning);
        let scan = ingest::scan_directory(&self.store, &self.root)?;
        tracing::info!(
            newly_scored = scan.newly_scored,
            skipped = scan.skipped_existing,
            "Initial scan complete"
        );
        self.notify_listener(WatchNotice::ScanComplete {
            newly_scored: scan.newly_scored,
            skipped: scan.skipped_existing,
        });

        if self.shutdown.load(Ordering::SeqCst) {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<PathBuf>();
        let debounce = self.debounce;
        let state = Arc::clone(&self.state);

        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Watch backend error");
                        return;
                    }
                };

                if !matches!(event.kind, NotifyKind::Create(_) | NotifyKind::Modify(_)) {
                    return;
                }

                for path in event.paths {
                    if !ingest::is_transcript(&path) {
                        continue;
                    }

                    // Fixed per-event quiet period. Each candidate sleeps on
                    // its own thread so one slow file never delays another.
                    state.store(WatcherState::Debouncing as u8, Ordering::SeqCst);
                    let tx = tx.clone();
                    thread::spawn(move || {
                        thread::sleep(debounce);
                        let _ = tx.send(path);
                    });
                }
            })?;

        watcher.watch(&self.root, RecursiveMode::Recursive)?;
        self.set_state(WatcherState::Watching);
        tracing::info!(root = %self.root.display(), "Watching for transcripts");

        while !self.shutdown.load(Ordering::SeqCst) {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(path) => {
                    self.set_state(WatcherState::Processing);
                    // A bad file is logged and dropped; the watcher stays up.
                    match ingest::process_file(&self.store, &path) {
                        Ok(Some(score)) => {
                            tracing::info!(
                                session_id = %score.session_id,
                                score = score.score,
                                "Watched file scored"
                            );
                            self.notify_listener(WatchNotice::Scored(&score));
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::warn!(
                                path = %path.display(),
                                error = %e,
                                "Failed to process watched file"
                            );
                        }
                    }
                    self.set_state(WatcherState::Watching);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Dropping the handle releases the underlying watch.
        drop(watcher);
        Ok(())
    }

    fn set_state(&self, state: WatcherState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            WatcherState::Idle,
            WatcherState::Scanning,
            WatcherState::Watching,
            WatcherState::Debouncing,
            WatcherState::Processing,
            WatcherState::Stopped,
        ] {
            assert_eq!(WatcherState::from_u8(state as u8), state);
        }
    }

    #[test]
    fn stop_before_run_is_a_clean_noop() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ScoreStore::new(dir.path().join("scores.json")));
        let watcher = SessionWatcher::new(
            store,
            dir.path().to_path_buf(),
            Duration::from_millis(10),
        );

        watcher.stop();
        watcher.stop(); // idempotent
        watcher.run().unwrap();
        assert_eq!(watcher.state(), WatcherState::Stopped);
    }
}
