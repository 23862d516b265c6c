//! Core domain types for rubric
//!
//! These types model one pass of the scoring pipeline: a session transcript
//! is folded into [`SessionMetrics`] (or checked against rules into
//! [`RuleCheck`] results), converted into a [`SessionScore`], and appended to
//! the durable [`ScoreReport`].
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One recorded transcript, identified by session id + source file path |
//! | **Event** | One parsed line of a session log (tool call, reasoning, message, error) |
//! | **Rule** | A static behavioral check with an id, pattern, and weight |
//! | **Score** | A bounded [0,100] number with a letter grade and summary |
//! | **Report** | The full store snapshot: every score in processing order |
//!
//! Serialized field names are camelCase (`lastScan`, `filePath`, ...) so the
//! score report document round-trips with stores written by earlier tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ============================================
// Session metrics
// ============================================

/// Per-session aggregate counts folded from one log file.
///
/// Mutated only while a file is being folded; treated as immutable once
/// scoring begins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    /// Every recognized event line, regardless of category
    pub total_events: u64,
    /// Tool invocation events
    pub tool_calls: u64,
    /// Invocation count per distinct tool name
    pub tool_breakdown: HashMap<String, u64>,
    /// Error events
    pub errors: u64,
    /// max(timestamp) - min(timestamp) across the file, in milliseconds.
    /// `None` when the file carried no timestamped events ("unknown" is
    /// distinct from a zero-length session).
    pub duration_ms: Option<i64>,
    /// Messages with a user role
    pub user_messages: u64,
    /// Messages with an assistant or developer role
    pub assistant_messages: u64,
    /// Reasoning events
    pub reasoning_events: u64,
}

impl SessionMetrics {
    /// Number of distinct tools invoked in the session.
    pub fn distinct_tools(&self) -> u64 {
        self.tool_breakdown.len() as u64
    }
}

// ============================================
// Grades
// ============================================

/// Letter grade derived from a numeric score at fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Map a score to its grade: >=90 A, >=80 B, >=70 C, >=60 D, else F.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Rules
// ============================================

/// Category a behavioral rule belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Startup,
    Response,
    Confidence,
    Safety,
    Communication,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleCategory::Startup => "startup",
            RuleCategory::Response => "response",
            RuleCategory::Confidence => "confidence",
            RuleCategory::Safety => "safety",
            RuleCategory::Communication => "communication",
        }
    }
}

/// Static descriptor of one behavioral rule.
///
/// Rules are configuration, not code: the built-in catalog can be replaced
/// wholesale from `config.toml`. `weight` is carried for display and future
/// use; the rule-based score itself is the unweighted pass ratio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Regex applied to the transcript text
    pub pattern: String,
    pub weight: f64,
    pub category: RuleCategory,
}

/// Outcome of evaluating one rule against a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCheck {
    pub rule_id: String,
    pub rule_name: String,
    pub description: String,
    pub passed: bool,
    /// First matching line, truncated, when the rule passed
    pub evidence: Option<String>,
    /// Improvement hint when the rule failed
    pub suggestion: Option<String>,
}

// ============================================
// Session scores
// ============================================

/// What the score was computed from.
///
/// File-discovered sessions carry their metrics snapshot; directly submitted
/// transcripts carry the rule-check list. Flattened in JSON so the document
/// has a `metrics` or `rules` key rather than a wrapper object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScoreDetail {
    #[serde(rename = "metrics")]
    Metrics(SessionMetrics),
    #[serde(rename = "rules")]
    Rules(Vec<RuleCheck>),
}

/// One scored session. Created once per (session id, file path) pair and
/// never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScore {
    pub session_id: String,
    /// Source log file. `None` for transcripts submitted directly; the store
    /// dedup invariant only applies to scores that have a path.
    #[serde(rename = "filePath")]
    pub source_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: ScoreDetail,
    /// Clamped to [0, 100]
    pub score: f64,
    pub grade: Grade,
    pub summary: String,
}

// ============================================
// Score report
// ============================================

/// The externally visible store snapshot: every persisted score in
/// processing order, plus when the directory was last looked at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub last_scan: DateTime<Utc>,
    pub total_sessions: usize,
    pub scores: Vec<SessionScore>,
}

impl ScoreReport {
    /// A fresh, well-formed report with zero sessions.
    pub fn empty() -> Self {
        Self {
            last_scan: Utc::now(),
            total_sessions: 0,
            scores: Vec::new(),
        }
    }

    /// Whether any persisted score came from this file path.
    pub fn contains_path(&self, path: &Path) -> bool {
        self.scores
            .iter()
            .any(|s| s.source_path.as_deref() == Some(path))
    }

    /// Append a score, keeping `total_sessions == scores.len()`.
    pub fn push(&mut self, score: SessionScore) {
        self.scores.push(score);
        self.total_sessions = self.scores.len();
    }

    /// Mean score across all sessions, `None` when the report is empty.
    pub fn average_score(&self) -> Option<f64> {
        if self.scores.is_empty() {
            return None;
        }
        let total: f64 = self.scores.iter().map(|s| s.score).sum();
        Some(total / self.scores.len() as f64)
    }

    /// Session count per grade, in A..F order.
    pub fn grade_distribution(&self) -> [(Grade, usize); 5] {
        let mut dist = [
            (Grade::A, 0),
            (Grade::B, 0),
            (Grade::C, 0),
            (Grade::D, 0),
            (Grade::F, 0),
        ];
        for score in &self.scores {
            for entry in dist.iter_mut() {
                if entry.0 == score.grade {
                    entry.1 += 1;
                }
            }
        }
        dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_with(path: Option<&str>, value: f64) -> SessionScore {
        SessionScore {
            session_id: "s1".to_string(),
            source_path: path.map(PathBuf::from),
            created_at: Utc::now(),
            detail: ScoreDetail::Metrics(SessionMetrics::default()),
            score: value,
            grade: Grade::from_score(value),
            summary: String::new(),
        }
    }

    #[test]
    fn grade_thresholds_are_exact_at_boundaries() {
        assert_eq!(Grade::from_score(100.0), Grade::A);
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.999), Grade::B);
        assert_eq!(Grade::from_score(80.0), Grade::B);
        assert_eq!(Grade::from_score(79.999), Grade::C);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(69.999), Grade::D);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.999), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn push_keeps_total_in_sync() {
        let mut report = ScoreReport::empty();
        assert_eq!(report.total_sessions, 0);

        report.push(score_with(Some("/logs/a.jsonl"), 95.0));
        report.push(score_with(Some("/logs/b.jsonl"), 50.0));
        assert_eq!(report.total_sessions, report.scores.len());
        assert_eq!(report.total_sessions, 2);
    }

    #[test]
    fn contains_path_ignores_pathless_scores() {
        let mut report = ScoreReport::empty();
        report.push(score_with(None, 75.0));
        report.push(score_with(Some("/logs/a.jsonl"), 75.0));

        assert!(report.contains_path(Path::new("/logs/a.jsonl")));
        assert!(!report.contains_path(Path::new("/logs/b.jsonl")));
    }

    #[test]
    fn report_aggregates() {
        let mut report = ScoreReport::empty();
        assert!(report.average_score().is_none());

        report.push(score_with(Some("/logs/a.jsonl"), 100.0));
        report.push(score_with(Some("/logs/b.jsonl"), 60.0));
        assert_eq!(report.average_score(), Some(80.0));

        let dist = report.grade_distribution();
        assert_eq!(dist[0], (Grade::A, 1));
        assert_eq!(dist[3], (Grade::D, 1));
    }

    #[test]
    fn report_serializes_with_camel_case_keys() {
        let mut report = ScoreReport::empty();
        report.push(score_with(Some("/logs/a.jsonl"), 88.0));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("lastScan").is_some());
        assert_eq!(json["totalSessions"], 1);
        assert_eq!(json["scores"][0]["filePath"], "/logs/a.jsonl");
        assert!(json["scores"][0].get("metrics").is_some());

        let back: ScoreReport = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_sessions, 1);
        assert!(back.contains_path(Path::new("/logs/a.jsonl")));
    }
}
