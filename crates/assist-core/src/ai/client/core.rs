//! AI client core: HTTP plumbing shared by streaming and non-streaming calls

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use super::config::{AiClientConfig, CallOptions};
use crate::ai::format::{AnthropicFormat, FormatHandler, RequestOptions};
use crate::ai::types::ModelMessage;

/// Failure reported by the provider itself, as opposed to transport errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
}

/// Anthropic Messages API client
pub struct AiClient {
    http: reqwest::Client,
    config: AiClientConfig,
    api_key: String,
    format: AnthropicFormat,
}

impl AiClient {
    pub fn new(config: AiClientConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            config,
            api_key: api_key.into(),
            format: AnthropicFormat::new(),
        })
    }

    pub fn config(&self) -> &AiClientConfig {
        &self.config
    }

    pub(crate) fn messages_url(&self) -> String {
        self.config.api_url(self.format.endpoint_path())
    }

    /// POST request with authentication and version headers applied
    pub(crate) fn build_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header("content-type", "application/json")
    }

    pub(crate) fn build_body(
        &self,
        messages: &[ModelMessage],
        options: &CallOptions,
        streaming: bool,
    ) -> Value {
        let converted = self.format.convert_messages(messages);
        let request_options = RequestOptions {
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
            system_prompt: options.system_prompt.as_deref(),
            temperature: options.temperature,
            tools: options.tools.as_deref(),
            streaming,
        };
        self.format
            .build_request_body(&self.config.model, converted, &request_options)
    }

    /// Pass successful responses through, turn anything else into `ChatError::Api`
    pub(crate) async fn handle_error_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let message = extract_error_message(&body);
        error!(status = status.as_u16(), "API request failed: {}", message);

        Err(ChatError::Api {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

/// Pull `error.message` out of an Anthropic error body, falling back to the raw text
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
