//! AI SDK types for provider communication
//!
//! These mirror the Anthropic Messages API content model. The orchestrator
//! builds conversations out of them and the format handler serializes them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition advertised to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A fully assembled tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Message role in a conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Content blocks that can appear in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        output: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }
}

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: Vec<Content>,
}

impl ModelMessage {
    /// A user turn carrying a single text block
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Content::text(text)],
        }
    }

    /// An assistant turn carrying a single text block
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![Content::text(text)],
        }
    }

    /// Concatenated text of every text block, in order
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }
}

/// Concatenate the text blocks of a content list
pub fn collect_text(content: &[Content]) -> String {
    let mut text = String::new();
    for block in content {
        if let Content::Text { text: chunk } = block {
            text.push_str(chunk);
        }
    }
    text
}

/// Why the model stopped generating
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    StopSequence,
    Other(String),
}

impl FinishReason {
    /// Map an Anthropic `stop_reason` string
    pub fn from_stop_reason(reason: &str) -> Self {
        match reason {
            "end_turn" => FinishReason::Stop,
            "max_tokens" => FinishReason::Length,
            "tool_use" => FinishReason::ToolUse,
            "stop_sequence" => FinishReason::StopSequence,
            other => FinishReason::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "end_turn",
            FinishReason::Length => "max_tokens",
            FinishReason::ToolUse => "tool_use",
            FinishReason::StopSequence => "stop_sequence",
            FinishReason::Other(reason) => reason,
        }
    }
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A complete, non-streamed model response
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResponse {
    pub content: Vec<Content>,
    pub stop_reason: FinishReason,
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(&self) -> String {
        collect_text(&self.content)
    }

    /// Tool invocations in the order the model issued them
    pub fn tool_calls(&self) -> Vec<AiToolCall> {
        self.content
            .iter()
            .filter_map(|c| match c {
                Content::ToolUse { id, name, input } => Some(AiToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: input.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn content_serializes_with_type_tag() {
        let block = Content::ToolUse {
            id: "toolu_1".to_string(),
            name: "business_calculator".to_string(),
            input: json!({"operation": "percentage"}),
        };
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["input"]["operation"], "percentage");
    }

    #[test]
    fn finish_reason_maps_anthropic_strings() {
        assert_eq!(FinishReason::from_stop_reason("tool_use"), FinishReason::ToolUse);
        assert_eq!(FinishReason::from_stop_reason("end_turn"), FinishReason::Stop);
        assert_eq!(
            FinishReason::from_stop_reason("refusal"),
            FinishReason::Other("refusal".to_string())
        );
        assert_eq!(FinishReason::ToolUse.as_str(), "tool_use");
    }

    #[test]
    fn response_collects_text_and_tool_calls_in_order() {
        let response = ModelResponse {
            content: vec![
                Content::text("Let me check. "),
                Content::ToolUse {
                    id: "a".to_string(),
                    name: "staff_lookup".to_string(),
                    input: json!({"name": "Dana"}),
                },
                Content::text("Done."),
            ],
            stop_reason: FinishReason::ToolUse,
            usage: Usage::default(),
        };

        assert_eq!(response.text(), "Let me check. Done.");
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "staff_lookup");
    }
}
