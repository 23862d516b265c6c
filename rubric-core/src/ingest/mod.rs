//! Ingestion pipeline: file discovery, parsing, scoring, persistence
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────────────┐     ┌─────────────┐
//! │  Session files   │ ──► │ parse → fold → score     │ ──► │ Score store │
//! │ (*.jsonl tree)   │     │ (per file, serialized)   │     │ (report)    │
//! └──────────────────┘     └──────────────────────────┘     └─────────────┘
//! ```
//!
//! Both entry points — the one-shot scan and the live watcher — feed files
//! through [`process_file`], which holds the store's ingest lock across the
//! whole load → dedup-check → parse → score → append sequence. Re-processing
//! an already-persisted path is a silent no-op, which is what makes the
//! pipeline idempotent under duplicate notifications and repeated scans.

pub mod event;
pub mod metrics;

pub use event::{parse_line, EventKind, LineOutcome, ParsedEvent};
pub use metrics::{fold_file, fold_lines, FoldedMetrics, MetricsAccumulator};

use crate::error::{Error, Result};
use crate::scoring;
use crate::store::ScoreStore;
use crate::types::{ScoreDetail, SessionScore};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// File extension of session transcripts.
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Prefix the producing CLI puts on every session file name.
const SESSION_FILE_PREFIX: &str = "rollout-";

/// Derive the session id from a transcript path: the file stem with the
/// fixed producer prefix stripped.
pub fn session_id_for(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    stem.strip_prefix(SESSION_FILE_PREFIX)
        .unwrap_or(stem)
        .to_string()
}

/// Whether a path looks like a session transcript.
pub fn is_transcript(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == TRANSCRIPT_EXTENSION)
        .unwrap_or(false)
}

/// Run one file through the full pipeline.
///
/// Returns the new score, or `None` when the path was already persisted
/// (the dedup invariant makes this a no-op, not an error). The store's
/// ingest lock is held for the whole section, so concurrent initiators
/// cannot double-insert the same path.
pub fn process_file(store: &ScoreStore, path: &Path) -> Result<Option<SessionScore>> {
    let _guard = store.lock_ingest();

    let report = store.load()?;
    if report.contains_path(path) {
        tracing::debug!(path = %path.display(), "Already scored, dropping");
        return Ok(None);
    }

    let folded = metrics::fold_file(path)?;
    if folded.skipped_lines > 0 {
        tracing::debug!(
            path = %path.display(),
            skipped = folded.skipped_lines,
            "Unusable lines skipped during fold"
        );
    }

    let outcome = scoring::score_metrics(&folded.metrics);
    let score = SessionScore {
        session_id: session_id_for(path),
        source_path: Some(path.to_path_buf()),
        created_at: Utc::now(),
        detail: ScoreDetail::Metrics(folded.metrics),
        score: outcome.score,
        grade: outcome.grade,
        summary: outcome.summary,
    };

    store.append(score.clone())?;

    tracing::info!(
        session_id = %score.session_id,
        score = score.score,
        grade = %score.grade,
        "Session scored"
    );

    Ok(Some(score))
}

/// Result of one full directory scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Transcripts found under the root
    pub files_seen: usize,
    /// New entries appended this scan
    pub newly_scored: usize,
    /// Files already present in the store
    pub skipped_existing: usize,
    /// Per-file failures (file path → error message)
    pub errors: Vec<(PathBuf, String)>,
}

/// Enumerate every transcript under the root, recursively.
pub fn discover_transcripts(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = root
        .join(format!("**/*.{}", TRANSCRIPT_EXTENSION))
        .to_string_lossy()
        .into_owned();

    let entries = glob::glob(&pattern)
        .map_err(|e| Error::Config(format!("invalid scan pattern {}: {}", pattern, e)))?;

    Ok(entries.flatten().collect())
}

/// Scan the root once, scoring every unseen transcript.
pub fn scan_directory(store: &ScoreStore, root: &Path) -> Result<ScanOutcome> {
    scan_directory_with_progress(store, root, |_, _, _| {})
}

/// Scan with a progress callback, invoked as `(index, total, path)` before
/// each file.
///
/// The report is loaded once for the seen-set; each unseen file then runs
/// through [`process_file`], which re-checks dedup under the ingest lock and
/// persists immediately. A crash mid-scan therefore loses at most the
/// in-flight file. Per-file failures are collected, never fatal.
pub fn scan_directory_with_progress<F>(
    store: &ScoreStore,
    root: &Path,
    mut on_progress: F,
) -> Result<ScanOutcome>
where
    F: FnMut(usize, usize, &Path),
{
    let files = discover_transcripts(root)?;
    if files.is_empty() {
        tracing::info!(root = %root.display(), "No transcripts found");
    }

    let seen = store.load()?;
    let total = files.len();
    let mut outcome = ScanOutcome {
        files_seen: total,
        ..Default::default()
    };

    for (i, path) in files.iter().enumerate() {
        on_progress(i, total, path);

        if seen.contains_path(path) {
            outcome.skipped_existing += 1;
            continue;
        }

        match process_file(store, path) {
            Ok(Some(_)) => outcome.newly_scored += 1,
            // Raced with the watcher between our load and its append.
            Ok(None) => outcome.skipped_existing += 1,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to score file");
                outcome.errors.push((path.clone(), e.to_string()));
            }
        }
    }

    store.stamp_last_scan()?;

    tracing::info!(
        files_seen = outcome.files_seen,
        newly_scored = outcome.newly_scored,
        skipped = outcome.skipped_existing,
        failures = outcome.errors.len(),
        "Scan complete"
    );

    Ok(outcome)
}
