//! Anthropic-specific SSE parser

use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info};

use crate::ai::sse::SseParser;
use crate::ai::streaming::{BlockKind, StreamPart};
use crate::ai::types::{FinishReason, Usage};

/// Anthropic Messages API stream parser
///
/// Maps wire events one-to-one onto `StreamPart`s. The only state kept is
/// the `stop_reason` from `message_delta`, which is reported with the
/// `message_stop` that follows it.
pub struct AnthropicParser {
    stop_reason: Mutex<Option<FinishReason>>,
}

impl AnthropicParser {
    pub fn new() -> Self {
        Self {
            stop_reason: Mutex::new(None),
        }
    }

    fn lock_stop_reason(&self) -> Result<MutexGuard<'_, Option<FinishReason>>> {
        self.stop_reason
            .lock()
            .map_err(|e| anyhow::anyhow!("Stop reason lock poisoned: {}", e))
    }
}

impl Default for AnthropicParser {
    fn default() -> Self {
        Self::new()
    }
}

fn block_index(json: &Value) -> usize {
    json.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as usize
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn usage_field(usage: &Value, key: &str) -> usize {
    usage.get(key).and_then(|t| t.as_u64()).unwrap_or(0) as usize
}

impl SseParser for AnthropicParser {
    fn parse_event(&self, json: &Value) -> Result<Option<StreamPart>> {
        let event_type = json.get("type").and_then(|t| t.as_str()).unwrap_or("");

        match event_type {
            "message_start" => {
                let Some(usage) = json.get("message").and_then(|m| m.get("usage")) else {
                    return Ok(None);
                };
                let input_tokens = usage_field(usage, "input_tokens")
                    + usage_field(usage, "cache_creation_input_tokens")
                    + usage_field(usage, "cache_read_input_tokens");
                Ok(Some(StreamPart::Usage {
                    usage: Usage {
                        prompt_tokens: input_tokens,
                        completion_tokens: usage_field(usage, "output_tokens"),
                    },
                }))
            }

            "content_block_start" => {
                let index = block_index(json);
                let Some(block) = json.get("content_block") else {
                    return Ok(None);
                };

                match block.get("type").and_then(|t| t.as_str()) {
                    Some("text") => Ok(Some(StreamPart::BlockStart {
                        index,
                        kind: BlockKind::Text,
                    })),
                    Some("tool_use") => Ok(Some(StreamPart::BlockStart {
                        index,
                        kind: BlockKind::ToolUse {
                            id: str_field(block, "id"),
                            name: str_field(block, "name"),
                        },
                    })),
                    other => {
                        debug!(index, block_type = ?other, "Ignoring unsupported content block");
                        Ok(None)
                    }
                }
            }

            "content_block_delta" => {
                let index = block_index(json);
                let Some(delta) = json.get("delta") else {
                    return Ok(None);
                };

                match delta.get("type").and_then(|t| t.as_str()) {
                    Some("text_delta") => Ok(Some(StreamPart::TextDelta {
                        index,
                        delta: str_field(delta, "text"),
                    })),
                    Some("input_json_delta") => Ok(Some(StreamPart::ToolInputDelta {
                        index,
                        partial_json: str_field(delta, "partial_json"),
                    })),
                    _ => Ok(None),
                }
            }

            "content_block_stop" => Ok(Some(StreamPart::BlockStop {
                index: block_index(json),
            })),

            "message_delta" => {
                if let Some(stop_reason) = json
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(|s| s.as_str())
                {
                    *self.lock_stop_reason()? = Some(FinishReason::from_stop_reason(stop_reason));
                }

                match json.get("usage") {
                    Some(usage) => {
                        let output_tokens = usage_field(usage, "output_tokens");
                        if output_tokens == 0 {
                            return Ok(None);
                        }
                        Ok(Some(StreamPart::Usage {
                            usage: Usage {
                                prompt_tokens: usage_field(usage, "input_tokens"),
                                completion_tokens: output_tokens,
                            },
                        }))
                    }
                    None => Ok(None),
                }
            }

            "message_stop" => {
                let reason = self.lock_stop_reason()?.take().unwrap_or(FinishReason::Stop);
                info!(stop_reason = reason.as_str(), "Anthropic message complete");
                Ok(Some(StreamPart::Finish { reason }))
            }

            "error" => {
                let error_msg = json
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error");
                Err(anyhow::anyhow!("API error: {}", error_msg))
            }

            // "ping" and future event types
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_use_block_start_carries_id_and_name() {
        let parser = AnthropicParser::new();
        let part = parser
            .parse_event(&json!({
                "type": "content_block_start",
                "index": 1,
                "content_block": {"type": "tool_use", "id": "toolu_01", "name": "staff_lookup", "input": {}}
            }))
            .unwrap();

        assert_eq!(
            part,
            Some(StreamPart::BlockStart {
                index: 1,
                kind: BlockKind::ToolUse {
                    id: "toolu_01".to_string(),
                    name: "staff_lookup".to_string()
                }
            })
        );
    }

    #[test]
    fn input_json_delta_is_forwarded_raw() {
        let parser = AnthropicParser::new();
        let part = parser
            .parse_event(&json!({
                "type": "content_block_delta",
                "index": 1,
                "delta": {"type": "input_json_delta", "partial_json": "{\"name\": \"Da"}
            }))
            .unwrap();

        assert_eq!(
            part,
            Some(StreamPart::ToolInputDelta {
                index: 1,
                partial_json: "{\"name\": \"Da".to_string()
            })
        );
    }

    #[test]
    fn stop_reason_from_message_delta_is_reported_at_message_stop() {
        let parser = AnthropicParser::new();
        let usage = parser
            .parse_event(&json!({
                "type": "message_delta",
                "delta": {"stop_reason": "tool_use", "stop_sequence": null},
                "usage": {"output_tokens": 42}
            }))
            .unwrap();
        assert_eq!(
            usage,
            Some(StreamPart::Usage {
                usage: Usage {
                    prompt_tokens: 0,
                    completion_tokens: 42
                }
            })
        );

        let finish = parser.parse_event(&json!({"type": "message_stop"})).unwrap();
        assert_eq!(
            finish,
            Some(StreamPart::Finish {
                reason: FinishReason::ToolUse
            })
        );
    }

    #[test]
    fn ping_is_skipped_and_error_fails() {
        let parser = AnthropicParser::new();
        assert_eq!(parser.parse_event(&json!({"type": "ping"})).unwrap(), None);

        let err = parser
            .parse_event(&json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            }))
            .unwrap_err();
        assert!(err.to_string().contains("Overloaded"));
    }
}
