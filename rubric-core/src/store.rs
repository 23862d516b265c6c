//! Durable score store
//!
//! The store is a single JSON document holding the full [`ScoreReport`].
//! Writes go to a sibling temp file, flush to disk, and rename over the
//! target, so a concurrent reader never sees a half-written report.
//!
//! The store also owns the serialization discipline for ingestion: every
//! read-check-process-append section must run under [`ScoreStore::lock_ingest`],
//! because `load` + `exists` + `append` are not atomic as separate steps.
//! `append` itself never rejects duplicates; callers check `exists` first
//! while holding the lock.

use crate::error::{Error, Result};
use crate::types::{ScoreReport, SessionScore};
use chrono::Utc;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub struct ScoreStore {
    path: PathBuf,
    ingest_lock: Mutex<()>,
}

impl ScoreStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ingest_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize a full ingestion step against this store.
    ///
    /// Hold the guard across load, dedup check, parse, score, and append.
    pub fn lock_ingest(&self) -> MutexGuard<'_, ()> {
        self.ingest_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load the persisted report.
    ///
    /// A missing store file is not an error: it loads as a fresh, empty,
    /// well-formed report.
    pub fn load(&self) -> Result<ScoreReport> {
        if !self.path.exists() {
            return Ok(ScoreReport::empty());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| self.store_err("read", e))?;
        let report: ScoreReport =
            serde_json::from_str(&content).map_err(|e| self.store_err("parse", e))?;
        Ok(report)
    }

    /// Whether a score for this file path is already persisted.
    pub fn exists(&self, file_path: &Path) -> Result<bool> {
        Ok(self.load()?.contains_path(file_path))
    }

    /// Append one score and persist.
    ///
    /// Fails only on store I/O; duplicate checking is the caller's job via
    /// [`Self::exists`] under the ingest lock.
    pub fn append(&self, score: SessionScore) -> Result<ScoreReport> {
        let mut report = self.load()?;
        report.push(score);
        report.last_scan = Utc::now();
        self.save(&report)?;
        Ok(report)
    }

    /// Persist a report atomically: temp file, flush, rename.
    pub fn save(&self, report: &ScoreReport) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.store_err("create dir for", e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let mut file = File::create(&tmp).map_err(|e| self.store_err("create temp for", e))?;
        let body =
            serde_json::to_vec_pretty(report).map_err(|e| self.store_err("serialize", e))?;
        file.write_all(&body)
            .and_then(|_| file.sync_all())
            .map_err(|e| self.store_err("write temp for", e))?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .map_err(|e| self.store_err("replace", e))?;
        Ok(())
    }

    /// Restamp `lastScan` without touching any entries.
    pub fn stamp_last_scan(&self) -> Result<ScoreReport> {
        let mut report = self.load()?;
        report.last_scan = Utc::now();
        self.save(&report)?;
        Ok(report)
    }

    fn store_err(&self, action: &str, cause: impl std::fmt::Display) -> Error {
        Error::Store {
            path: self.path.display().to_string(),
            message: format!("failed to {} score report: {}", action, cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Grade, ScoreDetail, SessionMetrics};
    use tempfile::TempDir;

    fn score_for(path: &str) -> SessionScore {
        SessionScore {
            session_id: "s".to_string(),
            source_path: Some(PathBuf::from(path)),
            created_at: Utc::now(),
            detail: ScoreDetail::Metrics(SessionMetrics::default()),
            score: 80.0,
            grade: Grade::B,
            summary: "2 events, 1 tool calls".to_string(),
        }
    }

    #[test]
    fn missing_store_loads_as_empty_report() {
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::new(dir.path().join("scores.json"));

        let report = store.load().unwrap();
        assert_eq!(report.total_sessions, 0);
        assert!(report.scores.is_empty());
    }

    #[test]
    fn append_round_trips_through_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::new(dir.path().join("scores.json"));

        store.append(score_for("/logs/a.jsonl")).unwrap();
        store.append(score_for("/logs/b.jsonl")).unwrap();

        let report = store.load().unwrap();
        assert_eq!(report.total_sessions, 2);
        assert_eq!(report.scores.len(), 2);
        assert!(store.exists(Path::new("/logs/a.jsonl")).unwrap());
        assert!(!store.exists(Path::new("/logs/c.jsonl")).unwrap());
        // Insertion order is processing order.
        assert_eq!(
            report.scores[0].source_path.as_deref(),
            Some(Path::new("/logs/a.jsonl"))
        );
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.json");
        let store = ScoreStore::new(path.clone());

        store.append(score_for("/logs/a.jsonl")).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn save_creates_missing_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::new(dir.path().join("nested/deeper/scores.json"));

        store.append(score_for("/logs/a.jsonl")).unwrap();
        assert_eq!(store.load().unwrap().total_sessions, 1);
    }

    #[test]
    fn append_does_not_police_duplicates() {
        // Dedup belongs to the caller, under the ingest lock.
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::new(dir.path().join("scores.json"));

        store.append(score_for("/logs/a.jsonl")).unwrap();
        store.append(score_for("/logs/a.jsonl")).unwrap();
        assert_eq!(store.load().unwrap().total_sessions, 2);
    }

    #[test]
    fn stamp_last_scan_preserves_entries() {
        let dir = TempDir::new().unwrap();
        let store = ScoreStore::new(dir.path().join("scores.json"));

        let before = store.append(score_for("/logs/a.jsonl")).unwrap();
        let after = store.stamp_last_scan().unwrap();
        assert_eq!(after.total_sessions, 1);
        assert!(after.last_scan >= before.last_scan);
    }
}
