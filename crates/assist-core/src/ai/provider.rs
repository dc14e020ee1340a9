//! Chat completion seam
//!
//! The orchestrator only talks to `ChatProvider`, so tests can drive it with
//! scripted responses instead of a live API.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::ai::client::{AiClient, CallOptions};
use crate::ai::streaming::StreamPart;
use crate::ai::types::{ModelMessage, ModelResponse};

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn model(&self) -> &str;

    /// Start a streamed completion. Parts arrive in wire order; the channel
    /// closes after a terminal part or when the transport ends.
    async fn call_streaming(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>>;

    /// Single non-streamed completion
    async fn call(&self, messages: Vec<ModelMessage>, options: &CallOptions)
        -> Result<ModelResponse>;
}

#[async_trait]
impl ChatProvider for AiClient {
    fn model(&self) -> &str {
        &self.config().model
    }

    async fn call_streaming(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        AiClient::call_streaming(self, messages, options).await
    }

    async fn call(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<ModelResponse> {
        AiClient::call(self, messages, options).await
    }
}
