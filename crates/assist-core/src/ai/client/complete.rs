//! Non-streaming API calls

use std::time::Instant;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info};

use super::config::CallOptions;
use super::core::{AiClient, ChatError};
use crate::ai::types::{Content, FinishReason, ModelMessage, ModelResponse, Usage};

impl AiClient {
    /// Make a single non-streaming call and return the structured response
    pub async fn call(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<ModelResponse> {
        let start = Instant::now();
        let body = self.build_body(&messages, options, false);
        let request = self
            .build_request(&self.messages_url())
            .timeout(self.config().request_timeout);

        info!(
            model = %self.config().model,
            messages = messages.len(),
            "API call starting"
        );

        let response = match request.json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, elapsed_ms = start.elapsed().as_millis() as u64, "API request failed");
                return Err(anyhow::anyhow!("API request failed: {}", e));
            }
        };

        let status = response.status();
        info!(status = %status, elapsed_ms = start.elapsed().as_millis() as u64, "API response received");

        let response = self.handle_error_response(response).await?;
        let json: Value = response.json().await?;
        parse_message_response(&json)
    }
}

/// Convert an Anthropic `message` object into a `ModelResponse`
pub(crate) fn parse_message_response(json: &Value) -> Result<ModelResponse> {
    let blocks = json
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| ChatError::MalformedResponse("missing content array".to_string()))?;

    let mut content = Vec::with_capacity(blocks.len());
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                let text = block.get("text").and_then(|t| t.as_str()).unwrap_or("");
                content.push(Content::text(text));
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(|v| v.as_str()).unwrap_or("");
                let name = block.get("name").and_then(|v| v.as_str()).unwrap_or("");
                let input = block
                    .get("input")
                    .cloned()
                    .unwrap_or_else(|| serde_json::json!({}));
                content.push(Content::ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input,
                });
            }
            other => debug!(block_type = ?other, "Ignoring unsupported content block"),
        }
    }

    let stop_reason = json
        .get("stop_reason")
        .and_then(|s| s.as_str())
        .map(FinishReason::from_stop_reason)
        .unwrap_or(FinishReason::Stop);

    let usage = json
        .get("usage")
        .map(|u| Usage {
            prompt_tokens: u.get("input_tokens").and_then(|t| t.as_u64()).unwrap_or(0) as usize,
            completion_tokens: u.get("output_tokens").and_then(|t| t.as_u64()).unwrap_or(0)
                as usize,
        })
        .unwrap_or_default();

    Ok(ModelResponse {
        content,
        stop_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::ai::client::AiClientConfig;

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let response = parse_message_response(&json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Let me calculate that."},
                {"type": "tool_use", "id": "toolu_1", "name": "business_calculator",
                 "input": {"operation": "percentage", "values": {"amount": 50000, "percentage": 15}}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 30, "output_tokens": 12}
        }))
        .unwrap();

        assert_eq!(response.stop_reason, FinishReason::ToolUse);
        assert_eq!(response.text(), "Let me calculate that.");
        assert_eq!(response.tool_calls()[0].arguments["values"]["amount"], 50000);
        assert_eq!(response.usage.completion_tokens, 12);
    }

    #[test]
    fn missing_content_is_malformed() {
        let err = parse_message_response(&json!({"type": "message"})).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn call_posts_non_streaming_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "Hello! How can I help?"}],
                "stop_reason": "end_turn",
                "usage": {"input_tokens": 5, "output_tokens": 6}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = AiClientConfig {
            base_url: server.uri(),
            ..Default::default()
        };
        let client = AiClient::new(config, "test_api_key").unwrap();
        let response = client
            .call(vec![ModelMessage::user("Hello?")], &CallOptions::default())
            .await
            .unwrap();

        assert_eq!(response.text(), "Hello! How can I help?");
        assert_eq!(response.stop_reason, FinishReason::Stop);
    }
}
