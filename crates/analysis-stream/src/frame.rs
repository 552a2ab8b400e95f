//! Classification of raw stream messages into typed frames.
//!
//! Data frames follow the chat-completion chunk envelope
//! (`{"choices":[{"delta":{"content":"..."}}]}`), errors arrive as
//! `{"error":{"message":"..."}}`, and the literal `[DONE]` ends the stream.
//! The backend's named-event dialect (`event: content|error|complete`) is
//! accepted as well.
use tracing::{debug, warn};

use crate::model::CorrelationId;

/// Literal body that terminates a stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";
const DEFAULT_END_NOTE: &str = "stream completed";

/// One message as delivered by a transport, before classification.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct RawMessage {
    /// SSE `event:` name, when the server set one.
    pub event: Option<String>,
    /// Joined `data:` lines.
    pub data: String,
}

impl RawMessage {
    /// Creates an unnamed message with the given body.
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// Creates a named message with the given body.
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
        }
    }
}

/// A classified stream message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Fragment of analysis text to append.
    Delta { text: String },
    /// Terminal error reported by the producer.
    StreamError { message: String },
    /// Successful termination.
    StreamEnd {
        correlation_id: Option<CorrelationId>,
        note: String,
        /// Id of the stored analysis, when the backend reports one.
        record_id: Option<u64>,
    },
}

/// Classifies one raw message.
///
/// Returns `None` for messages that carry nothing actionable: keep-alives,
/// malformed JSON, or well-formed envelopes without content or error.
pub fn parse_frame(
    message: &RawMessage,
    correlation_id: Option<CorrelationId>,
) -> Option<StreamFrame> {
    let body = message.data.trim();
    if body == DONE_SENTINEL {
        return Some(StreamFrame::StreamEnd {
            correlation_id,
            note: DEFAULT_END_NOTE.to_string(),
            record_id: None,
        });
    }

    match message.event.as_deref() {
        Some("content") => {
            return Some(StreamFrame::Delta {
                text: message.data.clone(),
            });
        }
        Some("error") => {
            let message = if body.is_empty() {
                DEFAULT_ERROR_MESSAGE
            } else {
                body
            };
            return Some(StreamFrame::StreamError {
                message: message.to_string(),
            });
        }
        Some("complete") => return Some(parse_complete_event(body, correlation_id)),
        Some("start") => {
            debug!(data = body, "stream start event");
            return None;
        }
        _ => {}
    }

    if body.is_empty() {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, data = body, "skipping malformed stream frame");
            return None;
        }
    };
    classify_envelope(&value)
}

fn classify_envelope(value: &serde_json::Value) -> Option<StreamFrame> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|v| v.as_str())
            .or_else(|| error.as_str())
            .unwrap_or(DEFAULT_ERROR_MESSAGE);
        return Some(StreamFrame::StreamError {
            message: message.to_string(),
        });
    }

    let content = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|v| v.as_str())?;
    Some(StreamFrame::Delta {
        text: content.to_string(),
    })
}

fn parse_complete_event(body: &str, correlation_id: Option<CorrelationId>) -> StreamFrame {
    let value = serde_json::from_str::<serde_json::Value>(body).unwrap_or_else(|e| {
        debug!(error = %e, data = body, "complete event without JSON payload");
        serde_json::Value::Null
    });
    let note = value
        .get("message")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_END_NOTE)
        .to_string();
    StreamFrame::StreamEnd {
        correlation_id,
        note,
        record_id: value.get("id").and_then(|v| v.as_u64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u64) -> Option<CorrelationId> {
        CorrelationId::new(value)
    }

    #[test]
    fn done_sentinel_ends_stream_with_session_id() {
        let frame = parse_frame(&RawMessage::data("[DONE]"), id(42));
        assert_eq!(
            frame,
            Some(StreamFrame::StreamEnd {
                correlation_id: id(42),
                note: "stream completed".into(),
                record_id: None,
            })
        );
    }

    #[test]
    fn done_sentinel_wins_over_event_name() {
        let frame = parse_frame(&RawMessage::named("content", "[DONE]"), None);
        assert!(matches!(frame, Some(StreamFrame::StreamEnd { .. })));
    }

    #[test]
    fn maps_chat_completion_delta() {
        let raw = RawMessage::data(r#"{"id":"x","choices":[{"index":0,"delta":{"content":"Hello"}}]}"#);
        assert_eq!(
            parse_frame(&raw, None),
            Some(StreamFrame::Delta {
                text: "Hello".into()
            })
        );
    }

    #[test]
    fn maps_error_envelope_and_defaults_missing_message() {
        let raw = RawMessage::data(r#"{"error":{"message":"rate limited"}}"#);
        assert_eq!(
            parse_frame(&raw, None),
            Some(StreamFrame::StreamError {
                message: "rate limited".into()
            })
        );

        let raw = RawMessage::data(r#"{"error":{"code":500}}"#);
        assert_eq!(
            parse_frame(&raw, None),
            Some(StreamFrame::StreamError {
                message: "An error occurred".into()
            })
        );

        let raw = RawMessage::data(r#"{"error":"Invalid processed_id parameter"}"#);
        assert_eq!(
            parse_frame(&raw, None),
            Some(StreamFrame::StreamError {
                message: "Invalid processed_id parameter".into()
            })
        );
    }

    #[test]
    fn error_takes_precedence_over_content() {
        let raw = RawMessage::data(
            r#"{"error":{"message":"boom"},"choices":[{"delta":{"content":"x"}}]}"#,
        );
        assert!(matches!(
            parse_frame(&raw, None),
            Some(StreamFrame::StreamError { .. })
        ));
    }

    #[test]
    fn ignores_malformed_and_contentless_frames() {
        assert_eq!(parse_frame(&RawMessage::data("not-json"), None), None);
        assert_eq!(parse_frame(&RawMessage::data(""), None), None);
        assert_eq!(parse_frame(&RawMessage::data(r#"{"choices":[]}"#), None), None);
        assert_eq!(
            parse_frame(
                &RawMessage::data(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
                None
            ),
            None
        );
        assert_eq!(parse_frame(&RawMessage::data(r#"{"error":null}"#), None), None);
    }

    #[test]
    fn maps_named_backend_events() {
        assert_eq!(
            parse_frame(&RawMessage::named("content", " partial "), None),
            Some(StreamFrame::Delta {
                text: " partial ".into()
            })
        );
        assert_eq!(
            parse_frame(&RawMessage::named("error", "OpenAI API request failed"), None),
            Some(StreamFrame::StreamError {
                message: "OpenAI API request failed".into()
            })
        );
        assert_eq!(
            parse_frame(
                &RawMessage::named("complete", r#"{"id": 7, "message": "Analysis completed"}"#),
                id(3)
            ),
            Some(StreamFrame::StreamEnd {
                correlation_id: id(3),
                note: "Analysis completed".into(),
                record_id: Some(7),
            })
        );
        assert_eq!(
            parse_frame(&RawMessage::named("start", "Starting analysis"), None),
            None
        );
    }
}
