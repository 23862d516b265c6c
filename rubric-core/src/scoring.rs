//! Score calculation
//!
//! Two independent strategies produce the same shape of result: a bounded
//! numeric score, a letter grade, and a one-line summary. Which strategy runs
//! is decided by the entry point (file discovery folds metrics; direct
//! transcript submission evaluates rules), never by inspecting the data.
//! Both are pure functions.

use crate::types::{Grade, RuleCheck, SessionMetrics};

/// Caps on the additive bonuses in the metrics strategy.
const MAX_TOOL_BONUS: u64 = 15;
const MAX_REASONING_BONUS: u64 = 10;

/// Result of either scoring strategy.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    /// Clamped to [0, 100]
    pub score: f64,
    pub grade: Grade,
    pub summary: String,
}

/// Score a session from its folded metrics.
///
/// Starts at 100, subtracts 10 per error, rewards tool variety and
/// reasoning (capped), and penalizes very small sessions and sessions that
/// never invoked a tool.
pub fn score_metrics(metrics: &SessionMetrics) -> ScoreOutcome {
    let mut score = 100.0;

    score -= 10.0 * metrics.errors as f64;
    score += (3 * metrics.distinct_tools()).min(MAX_TOOL_BONUS) as f64;
    score += (5 * metrics.reasoning_events).min(MAX_REASONING_BONUS) as f64;

    if metrics.total_events < 5 {
        score -= 20.0;
    }
    if metrics.tool_calls == 0 {
        score -= 15.0;
    }

    let score = score.clamp(0.0, 100.0);

    ScoreOutcome {
        score,
        grade: Grade::from_score(score),
        summary: metrics_summary(metrics),
    }
}

/// Score a session from its rule-check results.
///
/// The score is the unweighted pass ratio. When the caller supplies no
/// summary, one is derived from the failed rules' suggestions.
pub fn score_rules(checks: &[RuleCheck], summary: Option<String>) -> ScoreOutcome {
    let total = checks.len();
    let passed = checks.iter().filter(|c| c.passed).count();

    let score = if total == 0 {
        0.0
    } else {
        100.0 * passed as f64 / total as f64
    };
    let score = score.clamp(0.0, 100.0);

    ScoreOutcome {
        score,
        grade: Grade::from_score(score),
        summary: summary.unwrap_or_else(|| rules_summary(checks, passed, total)),
    }
}

/// Comma-joined facts in fixed order: events, tool calls, then errors and
/// reasoning only when present.
fn metrics_summary(metrics: &SessionMetrics) -> String {
    let mut parts = vec![
        format!("{} events", metrics.total_events),
        format!("{} tool calls", metrics.tool_calls),
    ];
    if metrics.errors > 0 {
        parts.push(format!("{} errors", metrics.errors));
    }
    if metrics.reasoning_events > 0 {
        parts.push(format!("{} reasoning steps", metrics.reasoning_events));
    }
    parts.join(", ")
}

fn rules_summary(checks: &[RuleCheck], passed: usize, total: usize) -> String {
    let suggestions: Vec<&str> = checks
        .iter()
        .filter(|c| !c.passed)
        .filter_map(|c| c.suggestion.as_deref())
        .take(3)
        .collect();

    if suggestions.is_empty() {
        format!("All {} rules passed", total)
    } else {
        format!("{}/{} rules passed. {}", passed, total, suggestions.join(" "))
    }
}
