//! Stream processing for the orchestrator.
//!
//! Consumes `StreamPart` events from `ChatProvider::call_streaming()` and:
//! - Reassembles content blocks keyed by block index
//! - Buffers raw tool-input fragments and parses them once per block
//! - Emits `ChatEvent`s for each meaningful state change
//! - Handles stream idle timeout

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::ai::streaming::{BlockKind, StreamPart};
use crate::ai::types::{collect_text, AiToolCall, Content, FinishReason, Usage};

use super::loop_events::{ChatEvent, EventSink};

/// Content block still receiving fragments
enum OpenBlock {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: String,
    },
}

/// Result of one complete model message.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StreamResult {
    /// Closed blocks in block-index order; dropped tool calls are absent
    pub content: Vec<Content>,
    pub tool_calls: Vec<AiToolCall>,
    pub stop_reason: FinishReason,
    pub usage: Usage,
}

impl StreamResult {
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }
}

/// How a stream ended
#[derive(Debug)]
pub(crate) enum StreamOutcome {
    Completed(StreamResult),
    Failed(String),
    /// The client went away mid-stream
    Cancelled,
}

/// Parse an accumulated tool-input buffer. No fragments at all means an
/// argumentless call.
fn parse_tool_input(buffer: &str) -> Result<serde_json::Value, serde_json::Error> {
    if buffer.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(buffer)
}

/// Turns stream parts into content blocks and client events.
#[derive(Default)]
pub(crate) struct BlockAssembler {
    open: HashMap<usize, OpenBlock>,
    closed: BTreeMap<usize, Content>,
    tool_calls: BTreeMap<usize, AiToolCall>,
    stop_reason: Option<FinishReason>,
    usage: Usage,
}

impl BlockAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one non-terminal part, returning the events to relay
    pub fn apply(&mut self, part: StreamPart) -> Vec<ChatEvent> {
        match part {
            StreamPart::BlockStart { index, kind } => match kind {
                BlockKind::Text => {
                    self.open.insert(index, OpenBlock::Text(String::new()));
                    Vec::new()
                }
                BlockKind::ToolUse { id, name } => {
                    debug!(index, tool = %name, "Tool call block started");
                    self.open.insert(
                        index,
                        OpenBlock::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: String::new(),
                        },
                    );
                    vec![ChatEvent::ToolCallStart { id, name }]
                }
            },

            StreamPart::TextDelta { index, delta } => {
                match self
                    .open
                    .entry(index)
                    .or_insert_with(|| OpenBlock::Text(String::new()))
                {
                    OpenBlock::Text(text) => text.push_str(&delta),
                    OpenBlock::ToolUse { .. } => {
                        warn!(index, "Text delta for a tool-use block, ignoring");
                        return Vec::new();
                    }
                }
                vec![ChatEvent::TextDelta { delta }]
            }

            StreamPart::ToolInputDelta {
                index,
                partial_json,
            } => {
                match self.open.get_mut(&index) {
                    Some(OpenBlock::ToolUse { input, .. }) => input.push_str(&partial_json),
                    _ => warn!(index, "Tool input delta without an open tool block, ignoring"),
                }
                Vec::new()
            }

            StreamPart::BlockStop { index } => self.close_block(index),

            StreamPart::Usage { usage } => {
                if usage.prompt_tokens > 0 {
                    self.usage.prompt_tokens = usage.prompt_tokens;
                }
                self.usage.completion_tokens = usage.completion_tokens;
                Vec::new()
            }

            StreamPart::Finish { reason } => {
                self.stop_reason = Some(reason);
                self.close_all()
            }

            // Error parts are terminal and handled by the caller
            StreamPart::Error { .. } => Vec::new(),
        }
    }

    /// Close every block still open, in index order
    pub fn close_all(&mut self) -> Vec<ChatEvent> {
        let mut indexes: Vec<usize> = self.open.keys().copied().collect();
        indexes.sort_unstable();
        indexes
            .into_iter()
            .flat_map(|index| self.close_block(index))
            .collect()
    }

    fn close_block(&mut self, index: usize) -> Vec<ChatEvent> {
        let Some(block) = self.open.remove(&index) else {
            debug!(index, "Stop for unknown block, ignoring");
            return Vec::new();
        };

        match block {
            OpenBlock::Text(text) => {
                if !text.is_empty() {
                    self.closed.insert(index, Content::Text { text });
                }
                Vec::new()
            }
            OpenBlock::ToolUse { id, name, input } => match parse_tool_input(&input) {
                Ok(arguments) => {
                    self.closed.insert(
                        index,
                        Content::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: arguments.clone(),
                        },
                    );
                    self.tool_calls.insert(
                        index,
                        AiToolCall {
                            id: id.clone(),
                            name: name.clone(),
                            arguments: arguments.clone(),
                        },
                    );
                    vec![ChatEvent::ToolCallComplete {
                        id,
                        name,
                        arguments,
                    }]
                }
                Err(e) => {
                    warn!(
                        tool = %name,
                        id = %id,
                        buffer_len = input.len(),
                        "Dropping tool call with malformed arguments: {}",
                        e
                    );
                    vec![ChatEvent::ToolCallDropped {
                        id,
                        name,
                        error: format!("Malformed tool arguments: {}", e),
                    }]
                }
            },
        }
    }

    pub fn finish(self) -> StreamResult {
        StreamResult {
            content: self.closed.into_values().collect(),
            tool_calls: self.tool_calls.into_values().collect(),
            stop_reason: self.stop_reason.unwrap_or(FinishReason::Stop),
            usage: self.usage,
        }
    }
}

/// Drive one provider stream to completion, relaying events as parts arrive.
pub(crate) async fn process_stream(
    mut api_rx: mpsc::UnboundedReceiver<StreamPart>,
    events: &EventSink,
    idle_timeout: Duration,
) -> StreamOutcome {
    let mut assembler = BlockAssembler::new();

    loop {
        let part = match tokio::time::timeout(idle_timeout, api_rx.recv()).await {
            Ok(Some(part)) => part,
            Ok(None) => {
                return StreamOutcome::Failed("AI stream ended before message_stop".to_string());
            }
            Err(_) => {
                return StreamOutcome::Failed(format!(
                    "AI stream timeout: no data received for {} seconds",
                    idle_timeout.as_secs()
                ));
            }
        };

        if let StreamPart::Error { error } = part {
            return StreamOutcome::Failed(error);
        }

        let finished = matches!(part, StreamPart::Finish { .. });
        for event in assembler.apply(part) {
            if !events.send(event).await {
                return StreamOutcome::Cancelled;
            }
        }
        if finished {
            break;
        }
    }

    for event in assembler.close_all() {
        if !events.send(event).await {
            return StreamOutcome::Cancelled;
        }
    }

    StreamOutcome::Completed(assembler.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_start(index: usize, id: &str, name: &str) -> StreamPart {
        StreamPart::BlockStart {
            index,
            kind: BlockKind::ToolUse {
                id: id.to_string(),
                name: name.to_string(),
            },
        }
    }

    fn input(index: usize, fragment: &str) -> StreamPart {
        StreamPart::ToolInputDelta {
            index,
            partial_json: fragment.to_string(),
        }
    }

    fn text(index: usize, delta: &str) -> StreamPart {
        StreamPart::TextDelta {
            index,
            delta: delta.to_string(),
        }
    }

    fn run_parts(parts: Vec<StreamPart>) -> (Vec<ChatEvent>, StreamResult) {
        let mut assembler = BlockAssembler::new();
        let mut events = Vec::new();
        for part in parts {
            events.extend(assembler.apply(part));
        }
        events.extend(assembler.close_all());
        (events, assembler.finish())
    }

    #[test]
    fn fragments_concatenate_into_one_parsed_call() {
        let (events, result) = run_parts(vec![
            tool_start(0, "toolu_1", "business_calculator"),
            input(0, "{\"operation\": \"perc"),
            input(0, "entage\", \"values\": {\"amount\": 50000,"),
            input(0, " \"percentage\": 15}}"),
            StreamPart::BlockStop { index: 0 },
        ]);

        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(
            result.tool_calls[0].arguments,
            json!({"operation": "percentage", "values": {"amount": 50000, "percentage": 15}})
        );
        assert!(matches!(events[0], ChatEvent::ToolCallStart { .. }));
        assert!(matches!(events[1], ChatEvent::ToolCallComplete { .. }));
    }

    #[test]
    fn interleaved_blocks_keep_index_order() {
        let (events, result) = run_parts(vec![
            StreamPart::BlockStart {
                index: 0,
                kind: BlockKind::Text,
            },
            text(0, "Checking "),
            tool_start(1, "a", "staff_lookup"),
            input(1, "{\"name\":"),
            text(0, "now."),
            tool_start(2, "b", "business_calculator"),
            input(2, "{\"operation\":\"roi\","),
            input(1, "\"Dana\"}"),
            input(2, "\"values\":{\"gain\":2,\"cost\":1}}"),
            StreamPart::BlockStop { index: 2 },
            StreamPart::BlockStop { index: 0 },
            StreamPart::BlockStop { index: 1 },
        ]);

        assert_eq!(result.text(), "Checking now.");
        let ids: Vec<&str> = result.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(result.tool_calls[0].arguments, json!({"name": "Dana"}));
        assert!(matches!(result.content[0], Content::Text { .. }));
        assert!(matches!(&result.content[1], Content::ToolUse { id, .. } if id == "a"));
        assert!(matches!(&result.content[2], Content::ToolUse { id, .. } if id == "b"));

        let deltas: Vec<&ChatEvent> = events
            .iter()
            .filter(|e| matches!(e, ChatEvent::TextDelta { .. }))
            .collect();
        assert_eq!(deltas.len(), 2);
    }

    #[test]
    fn malformed_arguments_drop_only_that_call() {
        let (events, result) = run_parts(vec![
            tool_start(0, "good", "business_calculator"),
            input(0, "{\"operation\":\"roi\",\"values\":{\"gain\":2,\"cost\":1}}"),
            StreamPart::BlockStop { index: 0 },
            tool_start(1, "bad", "staff_lookup"),
            input(1, "{\"name\": \"Da"),
            StreamPart::BlockStop { index: 1 },
        ]);

        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].id, "good");
        assert!(events
            .iter()
            .any(|e| matches!(e, ChatEvent::ToolCallDropped { id, .. } if id == "bad")));
        assert_eq!(result.content.len(), 1);
    }

    #[test]
    fn empty_input_buffer_is_an_empty_object() {
        let (_, result) = run_parts(vec![
            tool_start(0, "t", "staff_lookup"),
            StreamPart::BlockStop { index: 0 },
        ]);
        assert_eq!(result.tool_calls[0].arguments, json!({}));
    }

    #[test]
    fn finish_closes_open_blocks_and_records_reason() {
        let (_, result) = run_parts(vec![
            text(0, "partial"),
            StreamPart::Finish {
                reason: FinishReason::Length,
            },
        ]);
        assert_eq!(result.text(), "partial");
        assert_eq!(result.stop_reason, FinishReason::Length);
    }

    #[tokio::test]
    async fn error_part_fails_the_stream() {
        let (api_tx, api_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::channel(16);
        api_tx.send(text(0, "Hel")).unwrap();
        api_tx
            .send(StreamPart::Error {
                error: "API error: Overloaded".to_string(),
            })
            .unwrap();

        let outcome = process_stream(api_rx, &EventSink::new(tx), Duration::from_secs(5)).await;

        assert!(matches!(outcome, StreamOutcome::Failed(ref e) if e.contains("Overloaded")));
        assert_eq!(
            rx.recv().await,
            Some(ChatEvent::TextDelta {
                delta: "Hel".to_string()
            })
        );
    }

    #[tokio::test]
    async fn idle_stream_times_out() {
        let (_api_tx, api_rx) = mpsc::unbounded_channel::<StreamPart>();
        let (tx, _rx) = mpsc::channel(16);

        let outcome =
            process_stream(api_rx, &EventSink::new(tx), Duration::from_millis(20)).await;

        assert!(matches!(outcome, StreamOutcome::Failed(ref e) if e.contains("timeout")));
    }

    #[tokio::test]
    async fn dropped_client_cancels() {
        let (api_tx, api_rx) = mpsc::unbounded_channel();
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        api_tx.send(text(0, "hello")).unwrap();

        let outcome = process_stream(api_rx, &EventSink::new(tx), Duration::from_secs(5)).await;
        assert!(matches!(outcome, StreamOutcome::Cancelled));
    }

    #[tokio::test]
    async fn stream_closed_before_finish_fails() {
        let (api_tx, api_rx) = mpsc::unbounded_channel();
        let (tx, mut rx) = mpsc::channel(16);
        api_tx.send(text(0, "Half")).unwrap();
        drop(api_tx);

        let outcome = process_stream(api_rx, &EventSink::new(tx), Duration::from_secs(5)).await;

        assert!(matches!(outcome, StreamOutcome::Failed(ref e) if e.contains("ended before")));
        assert_eq!(
            rx.recv().await,
            Some(ChatEvent::TextDelta {
                delta: "Half".to_string()
            })
        );
    }
}
