//! Canonical event protocol for a chat run.
//!
//! `ChatEvent` is the single source of truth for everything the orchestrator
//! emits. The HTTP layer serializes each event as one SSE `data:` payload.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Result of one executed tool invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub id: String,
    pub name: String,
    pub output: String,
    pub is_error: bool,
}

/// Events emitted by the orchestrator.
///
/// Every run ends with exactly one terminal event: `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    // ── Streaming ──────────────────────────────────────────────────────
    /// Text content delta from the model, relayed as it arrives.
    TextDelta { delta: String },

    // ── Tool lifecycle ─────────────────────────────────────────────────
    /// The model started a tool call (arguments not yet complete).
    ToolCallStart { id: String, name: String },

    /// Tool call arguments fully received and parsed.
    ToolCallComplete {
        id: String,
        name: String,
        arguments: Value,
    },

    /// Tool call arguments could not be parsed; the call will not run.
    ToolCallDropped {
        id: String,
        name: String,
        error: String,
    },

    /// Every pending tool call of the round has been executed.
    ToolsExecuted { results: Vec<ToolOutcome> },

    /// Tool calls requested after the round limit was reached.
    ToolCallsSkipped { ids: Vec<String> },

    // ── Run lifecycle ──────────────────────────────────────────────────
    /// The run finished normally.
    Done { stop_reason: String },

    /// The run failed; partial output already sent is not retracted.
    Error { error: String },
}

impl ChatEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done { .. } | ChatEvent::Error { .. })
    }
}

/// Bounded event channel to the client.
///
/// A failed send means the receiver is gone (client disconnected) and the
/// run should stop.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<ChatEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<ChatEvent>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the receiver has been dropped
    pub async fn send(&self, event: ChatEvent) -> bool {
        self.tx.send(event).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_snake_case_type_tag() {
        let event = ChatEvent::ToolCallComplete {
            id: "toolu_1".to_string(),
            name: "staff_lookup".to_string(),
            arguments: json!({"name": "Dana"}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool_call_complete");
        assert_eq!(value["arguments"]["name"], "Dana");

        let done = serde_json::to_value(ChatEvent::Done {
            stop_reason: "end_turn".to_string(),
        })
        .unwrap();
        assert_eq!(done, json!({"type": "done", "stop_reason": "end_turn"}));
    }

    #[tokio::test]
    async fn sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        drop(rx);

        assert!(sink.is_closed());
        assert!(
            !sink
                .send(ChatEvent::TextDelta {
                    delta: "hi".to_string()
                })
                .await
        );
    }
}
