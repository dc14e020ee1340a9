//! Request and response types for the API

use serde::{Deserialize, Serialize};

use assist_core::ai::types::{Content, ModelMessage, Role};

// ============================================================================
// Chat Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Full conversation, oldest first; the last message must be from the user
    pub messages: Vec<IncomingMessage>,
    /// Stream the response as server-sent events
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Message content: a plain string or a list of content blocks
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// Any other block type is accepted and ignored
    #[serde(other)]
    Unsupported,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Blocks(blocks) => blocks
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text),
                    ContentBlock::Unsupported => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl ChatRequest {
    /// Validate and normalize into a conversation; each turn becomes a
    /// single text block.
    pub fn into_conversation(self) -> Result<Vec<ModelMessage>, String> {
        if self.messages.is_empty() {
            return Err("messages must not be empty".to_string());
        }

        let mut conversation = Vec::with_capacity(self.messages.len());
        for (i, message) in self.messages.into_iter().enumerate() {
            let role = match message.role.as_str() {
                "user" => Role::User,
                "assistant" => Role::Assistant,
                other => {
                    return Err(format!(
                        "messages[{}]: unknown role '{}' (expected 'user' or 'assistant')",
                        i, other
                    ))
                }
            };
            conversation.push(ModelMessage {
                role,
                content: vec![Content::text(message.content.into_text())],
            });
        }

        if conversation.last().map(|m| m.role) != Some(Role::User) {
            return Err("the last message must be from the user".to_string());
        }
        Ok(conversation)
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
}
