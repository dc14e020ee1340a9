//! AI Client configuration

use std::time::Duration;

use crate::ai::types::AiTool;
use crate::constants;

/// Configuration for the AI client
#[derive(Debug, Clone)]
pub struct AiClientConfig {
    /// Model ID to use for API calls
    pub model: String,
    /// Maximum output tokens
    pub max_tokens: usize,
    /// API base URL, without the `/v1/messages` path
    pub base_url: String,
    /// Value of the `anthropic-version` header
    pub api_version: String,
    /// Whole-request timeout for non-streaming calls
    pub request_timeout: Duration,
    /// TCP connect timeout for every call
    pub connect_timeout: Duration,
}

impl Default for AiClientConfig {
    fn default() -> Self {
        Self {
            model: constants::ai::DEFAULT_MODEL.to_string(),
            max_tokens: constants::ai::MAX_OUTPUT_TOKENS,
            base_url: constants::ai::ANTHROPIC_BASE_URL.to_string(),
            api_version: constants::ai::ANTHROPIC_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(constants::ai::REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(constants::ai::CONNECT_TIMEOUT_SECS),
        }
    }
}

impl AiClientConfig {
    /// Full URL for an endpoint path such as `/v1/messages`
    pub fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), endpoint)
    }
}

/// Call options for API requests
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub tools: Option<Vec<AiTool>>,
    pub system_prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_double_slash() {
        let config = AiClientConfig {
            base_url: "http://localhost:8080/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.api_url("/v1/messages"),
            "http://localhost:8080/v1/messages"
        );
    }
}
