//! Request formatting for provider APIs

pub mod anthropic;

use serde_json::Value;

use crate::ai::types::{AiTool, ModelMessage};

pub use anthropic::{AnthropicFormat, PLACEHOLDER_TEXT};

/// Options that shape a request body
#[derive(Debug, Clone, Copy)]
pub struct RequestOptions<'a> {
    pub max_tokens: usize,
    pub system_prompt: Option<&'a str>,
    pub temperature: Option<f32>,
    pub tools: Option<&'a [AiTool]>,
    pub streaming: bool,
}

/// Converts domain messages into a provider wire format
pub trait FormatHandler: Send + Sync {
    fn convert_messages(&self, messages: &[ModelMessage]) -> Vec<Value>;

    fn convert_tools(&self, tools: &[AiTool]) -> Vec<Value>;

    fn build_request_body(&self, model: &str, messages: Vec<Value>, options: &RequestOptions)
        -> Value;

    fn endpoint_path(&self) -> &str;
}

/// Role to insert between two turns so roles strictly alternate.
///
/// The conversation must also open with a user turn, so an assistant turn
/// with no predecessor needs a user filler.
pub(crate) fn needs_role_alternation_filler(
    last_role: Option<&str>,
    role: &str,
) -> Option<&'static str> {
    match (last_role, role) {
        (None, "assistant") => Some("user"),
        (Some("user"), "user") => Some("assistant"),
        (Some("assistant"), "assistant") => Some("user"),
        _ => None,
    }
}
