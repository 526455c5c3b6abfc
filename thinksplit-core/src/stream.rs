//! Stream events flowing into and out of the reasoning extractor.
//!
//! Contract:
//! - A text run is bracketed by `TextStart` / `TextEnd` with the same `id`.
//! - `TextDelta` carries incremental output; the extractor may rewrite it into
//!   `ReasoningDelta` with the same `id`.
//! - Every other variant is opaque to the extractor and forwarded unchanged.
//!
//! On the wire each event is a JSON object with a kebab-case `type` field,
//! e.g. `{"type":"text-delta","id":"t1","delta":"hi"}`.

use serde::{Deserialize, Serialize};

use crate::model::StopReason;

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Opens a text run.
    TextStart { id: String },
    /// Partial output text. Empty strings are legal and ignored by the extractor.
    TextDelta { id: String, delta: String },
    /// Closes a text run.
    TextEnd { id: String },
    /// Partial reasoning text, produced by the extractor.
    ReasoningDelta { id: String, delta: String },
    /// Optional token usage updates mid-stream.
    Usage {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completion: Option<u32>,
    },
    /// Provider has decided to stop (with reason).
    Finish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<StopReason>,
    },
    /// Transport/parse error surfaced mid-stream; stream ends after this.
    Error { message: String },
}

impl StreamEvent {
    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    pub fn reasoning_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        Self::ReasoningDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    /// Returns true if this event terminates the stream (`Finish` or `Error`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish { .. } | Self::Error { .. })
    }

    /// Convenience accessor for `TextDelta` contents.
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            Self::TextDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        }
    }

    /// Convenience accessor for `ReasoningDelta` contents.
    pub fn as_reasoning_delta(&self) -> Option<&str> {
        match self {
            Self::ReasoningDelta { delta, .. } => Some(delta.as_str()),
            _ => None,
        }
    }
}

/// Boxed stream of streaming events. Providers and the extractor both produce this.
pub type BoxStreamEv = futures::stream::BoxStream<'static, StreamEvent>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn helpers_work() {
        let d = StreamEvent::text_delta("t1", "hi");
        assert!(!d.is_terminal());
        assert_eq!(d.as_text_delta(), Some("hi"));
        assert_eq!(d.as_reasoning_delta(), None);

        let r = StreamEvent::reasoning_delta("t1", "hmm");
        assert_eq!(r.as_reasoning_delta(), Some("hmm"));

        let s = StreamEvent::Finish { reason: None };
        assert!(s.is_terminal());
        assert_eq!(s.as_text_delta(), None);
    }

    #[test]
    fn wire_shape_uses_kebab_case_type() {
        let v = serde_json::to_value(StreamEvent::reasoning_delta("a", "x")).unwrap();
        assert_eq!(v, json!({"type": "reasoning-delta", "id": "a", "delta": "x"}));

        let v = serde_json::to_value(StreamEvent::TextEnd { id: "a".into() }).unwrap();
        assert_eq!(v, json!({"type": "text-end", "id": "a"}));

        let v = serde_json::to_value(StreamEvent::Finish { reason: None }).unwrap();
        assert_eq!(v, json!({"type": "finish"}));
    }

    #[test]
    fn parses_events_from_json() {
        let ev: StreamEvent =
            serde_json::from_str(r#"{"type":"text-delta","id":"t","delta":"<think>"}"#).unwrap();
        assert_eq!(ev, StreamEvent::text_delta("t", "<think>"));

        let ev: StreamEvent = serde_json::from_str(r#"{"type":"finish","reason":"stop"}"#).unwrap();
        assert_eq!(ev, StreamEvent::Finish { reason: Some(StopReason::Stop) });

        assert!(serde_json::from_str::<StreamEvent>(r#"{"type":"tool-call","id":"x"}"#).is_err());
    }
}
