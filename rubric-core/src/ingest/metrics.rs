//! Metrics accumulation
//!
//! Folds the per-line parser's output for one file into a single
//! [`SessionMetrics`] value. Files are streamed line by line; a transcript
//! never has to fit in memory. The fold is deterministic: identical bytes
//! always produce identical metrics.

use crate::error::Result;
use crate::ingest::event::{parse_line, EventKind, LineOutcome, ParsedEvent};
use crate::types::SessionMetrics;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Running fold over one session's events.
#[derive(Debug, Default)]
pub struct MetricsAccumulator {
    metrics: SessionMetrics,
    skipped_lines: usize,
    first_timestamp: Option<DateTime<Utc>>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Completed fold: the metrics plus how many lines were unusable.
#[derive(Debug)]
pub struct FoldedMetrics {
    pub metrics: SessionMetrics,
    pub skipped_lines: usize,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one parsed line into the running totals.
    pub fn observe(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Event(event) => self.observe_event(event),
            LineOutcome::Skip => self.skipped_lines += 1,
        }
    }

    fn observe_event(&mut self, event: ParsedEvent) {
        self.metrics.total_events += 1;

        if let Some(ts) = event.timestamp {
            if self.first_timestamp.map_or(true, |first| ts < first) {
                self.first_timestamp = Some(ts);
            }
            if self.last_timestamp.map_or(true, |last| ts > last) {
                self.last_timestamp = Some(ts);
            }
        }

        match event.kind {
            EventKind::ToolCall { tool } => {
                self.metrics.tool_calls += 1;
                *self.metrics.tool_breakdown.entry(tool).or_insert(0) += 1;
            }
            EventKind::Reasoning => self.metrics.reasoning_events += 1,
            EventKind::UserMessage => self.metrics.user_messages += 1,
            EventKind::AssistantMessage => self.metrics.assistant_messages += 1,
            EventKind::Error => self.metrics.errors += 1,
            EventKind::Other => {}
        }
    }

    /// Finish the fold. Duration is max - min over observed timestamps;
    /// a file with no timestamped events has no duration at all.
    pub fn finish(mut self) -> FoldedMetrics {
        self.metrics.duration_ms = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => Some((last - first).num_milliseconds()),
            _ => None,
        };

        FoldedMetrics {
            metrics: self.metrics,
            skipped_lines: self.skipped_lines,
        }
    }
}

/// Stream a transcript file through the parser and fold it.
///
/// Unreadable files are the only error here; individual bad lines are
/// counted and skipped, so a corrupt file still yields partial metrics from
/// its valid lines.
pub fn fold_file(path: &Path) -> Result<FoldedMetrics> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    fold_lines(reader)
}

/// Fold any line source (used directly by tests).
pub fn fold_lines<R: BufRead>(reader: R) -> Result<FoldedMetrics> {
    let mut acc = MetricsAccumulator::new();

    for line in reader.lines() {
        let line = line?;
        acc.observe(parse_line(&line));
    }

    Ok(acc.finish())
}
