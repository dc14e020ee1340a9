//! Anthropic API format handler
//!
//! Handles message alternation, content normalization, and tool conversion
//! for the Anthropic Messages API.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use super::{needs_role_alternation_filler, FormatHandler, RequestOptions};
use crate::ai::types::{AiTool, Content, ModelMessage};

/// Text used wherever the API requires a non-empty text block but the
/// conversation has none. The API rejects empty and whitespace-only text.
pub const PLACEHOLDER_TEXT: &str = "(no text)";

/// Anthropic format handler
pub struct AnthropicFormat {
    endpoint: String,
}

impl AnthropicFormat {
    pub fn new() -> Self {
        Self {
            endpoint: "/v1/messages".to_string(),
        }
    }
}

impl Default for AnthropicFormat {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatHandler for AnthropicFormat {
    /// Convert domain messages to Anthropic format
    ///
    /// The API requires user/assistant turns to strictly alternate, starting
    /// with a user turn, and rejects turns with an empty content list. Both
    /// are repaired here rather than forwarded.
    fn convert_messages(&self, messages: &[ModelMessage]) -> Vec<Value> {
        let mut result: Vec<Value> = Vec::with_capacity(messages.len());
        let mut last_role: Option<&str> = None;

        for msg in messages {
            let role = msg.role.as_str();

            if let Some(filler_role) = needs_role_alternation_filler(last_role, role) {
                debug!(
                    "Inserting filler {} message to maintain alternation",
                    filler_role
                );
                result.push(serde_json::json!({
                    "role": filler_role,
                    "content": [placeholder_block()]
                }));
            }

            let mut content: Vec<Value> = msg.content.iter().filter_map(convert_content).collect();
            if content.is_empty() {
                debug!(role, "Empty content list, inserting placeholder text block");
                content.push(placeholder_block());
            }

            result.push(serde_json::json!({
                "role": role,
                "content": content
            }));

            last_role = Some(role);
        }

        sanitize_tool_results(&mut result);

        result
    }

    /// Tools sorted by name so identical registries produce identical requests
    fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value> {
        let mut sorted: Vec<&AiTool> = tools.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        sorted
            .into_iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect()
    }

    fn build_request_body(
        &self,
        model: &str,
        messages: Vec<Value>,
        options: &RequestOptions,
    ) -> Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "max_tokens": options.max_tokens,
        });

        if options.streaming {
            body["stream"] = serde_json::json!(true);
        }

        if let Some(system) = options.system_prompt.filter(|s| !s.is_empty()) {
            body["system"] = serde_json::json!(system);
        }

        if let Some(temp) = options.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        if let Some(tools) = options.tools {
            if !tools.is_empty() {
                body["tools"] = serde_json::json!(self.convert_tools(tools));
            }
        }

        body
    }

    fn endpoint_path(&self) -> &str {
        &self.endpoint
    }
}

fn placeholder_block() -> Value {
    serde_json::json!({
        "type": "text",
        "text": PLACEHOLDER_TEXT
    })
}

/// Convert a single content block to Anthropic JSON format.
/// Blank text blocks are dropped.
fn convert_content(content: &Content) -> Option<Value> {
    match content {
        Content::Text { text } if text.trim().is_empty() => None,
        Content::Text { text } => Some(serde_json::json!({
            "type": "text",
            "text": text
        })),
        Content::ToolUse { id, name, input } => Some(serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input
        })),
        Content::ToolResult {
            tool_use_id,
            output,
            is_error,
        } => Some(serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": output,
            "is_error": is_error.unwrap_or(false)
        })),
    }
}

/// Repair tool_use / tool_result pairing in the message array.
///
/// The Anthropic API requires:
/// 1. Every tool_result must reference a tool_use_id from the preceding assistant message.
/// 2. Every tool_use in an assistant message must have a corresponding tool_result in
///    the immediately following user message.
///
/// Orphaned tool_results are stripped and stub results are injected for
/// tool_uses that have none (for example a dropped invocation in history
/// replayed by a client).
fn sanitize_tool_results(messages: &mut Vec<Value>) {
    let mut i = 0;

    while i < messages.len() {
        if messages[i]["role"].as_str() != Some("assistant") {
            i += 1;
            continue;
        }

        let mut tool_use_ids: Vec<String> = Vec::new();
        let mut tool_use_lookup: HashSet<String> = HashSet::new();
        if let Some(content) = messages[i]["content"].as_array() {
            for block in content {
                if block["type"].as_str() == Some("tool_use") {
                    if let Some(id) = block["id"].as_str() {
                        if tool_use_lookup.insert(id.to_string()) {
                            tool_use_ids.push(id.to_string());
                        }
                    }
                }
            }
        }

        if tool_use_ids.is_empty() {
            i += 1;
            continue;
        }

        let next_is_user =
            i + 1 < messages.len() && messages[i + 1]["role"].as_str() == Some("user");

        if next_is_user {
            let user_msg = &mut messages[i + 1];
            let content = user_msg["content"].as_array().cloned().unwrap_or_default();

            let mut filtered: Vec<Value> = Vec::with_capacity(content.len() + tool_use_ids.len());
            let mut result_ids: HashSet<String> = HashSet::with_capacity(tool_use_ids.len());
            for block in content {
                if block["type"].as_str() == Some("tool_result") {
                    let id = block["tool_use_id"].as_str().unwrap_or("");
                    if tool_use_lookup.contains(id) {
                        result_ids.insert(id.to_string());
                        filtered.push(block);
                    } else {
                        debug!("Stripping orphaned tool_result for tool_use_id={}", id);
                    }
                } else {
                    filtered.push(block);
                }
            }

            for id in &tool_use_ids {
                if !result_ids.contains(id) {
                    debug!("Injecting stub tool_result for missing tool_use_id={}", id);
                    filtered.push(stub_tool_result(id));
                }
            }

            // tool_result blocks must lead the user turn
            filtered.sort_by_key(|block| block["type"].as_str() != Some("tool_result"));
            filtered.retain(|block| {
                !(block["type"].as_str() == Some("text")
                    && block["text"].as_str() == Some(PLACEHOLDER_TEXT))
            });
            user_msg["content"] = Value::Array(filtered);
        } else {
            debug!(
                "Injecting user message with {} stub tool_results",
                tool_use_ids.len()
            );
            let stubs: Vec<Value> = tool_use_ids.iter().map(|id| stub_tool_result(id)).collect();
            messages.insert(
                i + 1,
                serde_json::json!({
                    "role": "user",
                    "content": stubs
                }),
            );
        }

        i += 1;
    }
}

fn stub_tool_result(tool_use_id: &str) -> Value {
    serde_json::json!({
        "type": "tool_result",
        "tool_use_id": tool_use_id,
        "content": "Tool was not executed",
        "is_error": true
    })
}
