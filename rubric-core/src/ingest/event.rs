//! Per-line event parsing
//!
//! One raw log line becomes either a [`ParsedEvent`] or an explicit
//! [`LineOutcome::Skip`]. Skipping is a named outcome rather than a swallowed
//! error so callers can count how much of a file was unusable. Malformed
//! JSON, blank lines, and lines without a string `type` field are skipped;
//! everything else is an event, even when its category is unrecognized, so
//! that its timestamp still participates in duration tracking.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Outcome of parsing one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Event(ParsedEvent),
    /// Line contributed nothing: malformed, blank, or untyped.
    Skip,
}

/// One structured event from a session log.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub kind: EventKind,
    /// Present whenever the line carried a parseable RFC 3339 timestamp,
    /// regardless of the event's category.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Classified event categories.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// `response_item` / `function_call`
    ToolCall { tool: String },
    /// `response_item` / `reasoning`
    Reasoning,
    /// `response_item` / `message` with a user role
    UserMessage,
    /// `response_item` / `message` with an assistant or developer role
    AssistantMessage,
    /// `event_msg` with an error event type
    Error,
    /// Typed line that matched no category (session metadata, turn context,
    /// tool output, ...). Counts toward the event total and duration only.
    Other,
}

// ============================================
// Raw JSONL record types (serde deserialization)
// ============================================

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEvent {
    timestamp: Option<String>,
    #[serde(rename = "type")]
    event_type: Option<String>,
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ResponseItemPayload {
    #[serde(rename = "type")]
    item_type: Option<String>,
    role: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct EventMsgPayload {
    event_type: Option<String>,
}

/// Parse one line of a session log.
///
/// Pure: no side effects, no clock access. Identical input always yields an
/// identical outcome.
pub fn parse_line(line: &str) -> LineOutcome {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skip;
    }

    let event: RawEvent = match serde_json::from_str(trimmed) {
        Ok(event) => event,
        Err(_) => return LineOutcome::Skip,
    };

    // A line without a recognizable type is noise, not an event.
    let Some(event_type) = event.event_type else {
        return LineOutcome::Skip;
    };

    let timestamp = event
        .timestamp
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    let kind = match event_type.as_str() {
        "response_item" => {
            let payload: ResponseItemPayload =
                serde_json::from_value(event.payload).unwrap_or_default();

            match payload.item_type.as_deref() {
                Some("function_call") => EventKind::ToolCall {
                    tool: payload.name.unwrap_or_else(|| "unknown".to_string()),
                },
                Some("reasoning") => EventKind::Reasoning,
                Some("message") => match payload.role.as_deref() {
                    Some("user") => EventKind::UserMessage,
                    Some("assistant") | Some("developer") => EventKind::AssistantMessage,
                    _ => EventKind::Other,
                },
                _ => EventKind::Other,
            }
        }
        "event_msg" => {
            let payload: EventMsgPayload =
                serde_json::from_value(event.payload).unwrap_or_default();

            match payload.event_type.as_deref() {
                Some("error") | Some("tool_error") => EventKind::Error,
                _ => EventKind::Other,
            }
        }
        _ => EventKind::Other,
    };

    LineOutcome::Event(ParsedEvent { kind, timestamp })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind_of(line: &str) -> EventKind {
        match parse_line(line) {
            LineOutcome::Event(event) => event.kind,
            LineOutcome::Skip => panic!("expected event for line: {}", line),
        }
    }

    #[test]
    fn tool_call_carries_tool_name() {
        let line = r#"{"type":"response_item","payload":{"type":"function_call","name":"shell"}}"#;
        assert_eq!(
            kind_of(line),
            EventKind::ToolCall {
                tool: "shell".to_string()
            }
        );
    }

    #[test]
    fn tool_call_without_name_defaults_to_unknown() {
        let line = r#"{"type":"response_item","payload":{"type":"function_call"}}"#;
        assert_eq!(
            kind_of(line),
            EventKind::ToolCall {
                tool: "unknown".to_string()
            }
        );
    }

    #[test]
    fn message_roles_are_classified() {
        let user = r#"{"type":"response_item","payload":{"type":"message","role":"user"}}"#;
        assert_eq!(kind_of(user), EventKind::UserMessage);

        let assistant =
            r#"{"type":"response_item","payload":{"type":"message","role":"assistant"}}"#;
        assert_eq!(kind_of(assistant), EventKind::AssistantMessage);

        let developer =
            r#"{"type":"response_item","payload":{"type":"message","role":"developer"}}"#;
        assert_eq!(kind_of(developer), EventKind::AssistantMessage);

        // Other roles are kept as uncategorized events.
        let system = r#"{"type":"response_item","payload":{"type":"message","role":"system"}}"#;
        assert_eq!(kind_of(system), EventKind::Other);
    }

    #[test]
    fn reasoning_and_errors() {
        let reasoning = r#"{"type":"response_item","payload":{"type":"reasoning"}}"#;
        assert_eq!(kind_of(reasoning), EventKind::Reasoning);

        let error = r#"{"type":"event_msg","payload":{"event_type":"error"}}"#;
        assert_eq!(kind_of(error), EventKind::Error);

        let tool_error = r#"{"type":"event_msg","payload":{"event_type":"tool_error"}}"#;
        assert_eq!(kind_of(tool_error), EventKind::Error);

        let benign = r#"{"type":"event_msg","payload":{"event_type":"token_count"}}"#;
        assert_eq!(kind_of(benign), EventKind::Other);
    }

    #[test]
    fn unusable_lines_are_skipped() {
        assert_eq!(parse_line(""), LineOutcome::Skip);
        assert_eq!(parse_line("   \t "), LineOutcome::Skip);
        assert_eq!(parse_line("{not json"), LineOutcome::Skip);
        assert_eq!(parse_line(r#"{"payload":{}}"#), LineOutcome::Skip);
    }

    #[test]
    fn any_typed_line_keeps_its_timestamp() {
        let line = r#"{"type":"session_meta","timestamp":"2025-11-24T19:33:35Z","payload":{}}"#;
        match parse_line(line) {
            LineOutcome::Event(event) => {
                assert_eq!(event.kind, EventKind::Other);
                assert!(event.timestamp.is_some());
            }
            LineOutcome::Skip => panic!("typed line must not be skipped"),
        }
    }

    #[test]
    fn unparseable_timestamp_is_dropped_not_fatal() {
        let line = r#"{"type":"response_item","timestamp":"yesterday","payload":{"type":"reasoning"}}"#;
        match parse_line(line) {
            LineOutcome::Event(event) => {
                assert_eq!(event.kind, EventKind::Reasoning);
                assert!(event.timestamp.is_none());
            }
            LineOutcome::Skip => panic!("expected event"),
        }
    }
}
