//! Streaming API calls
//!
//! Sends a `stream: true` request and hands the SSE body to a background
//! reader task that forwards `StreamPart`s over an unbounded channel.

use std::time::Instant;

use anyhow::Result;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::config::CallOptions;
use super::core::{AiClient, ChatError};
use crate::ai::parsers::AnthropicParser;
use crate::ai::sse::{SseParser, SseStreamProcessor};
use crate::ai::streaming::StreamPart;
use crate::ai::types::ModelMessage;

/// Spawn a stream processing task for an HTTP SSE response.
///
/// Reads bytes from the response stream, parses SSE events, and forwards
/// them through the channel. Sends an explicit error part if the stream
/// fails or ends without a terminal event. The task
/// stops reading as soon as the receiver is dropped.
fn spawn_sse_stream_task<S, P>(
    stream: S,
    mut processor: SseStreamProcessor,
    parser: P,
    tx_err: mpsc::UnboundedSender<StreamPart>,
    label: &'static str,
) where
    S: futures::Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
    P: SseParser + 'static,
{
    tokio::spawn(async move {
        tokio::pin!(stream);
        let mut chunk_count: u64 = 0;
        let mut had_error = false;

        while let Some(chunk) = stream.next().await {
            if tx_err.is_closed() {
                info!("{} receiver dropped after {} chunks, aborting read", label, chunk_count);
                return;
            }

            chunk_count += 1;
            match chunk {
                Ok(bytes) => {
                    if let Err(e) = processor.process_chunk(bytes, &parser) {
                        warn!("{} chunk #{} parse error: {}", label, chunk_count, e);
                        let _ = tx_err.send(StreamPart::Error {
                            error: e.to_string(),
                        });
                        had_error = true;
                        break;
                    }
                }
                Err(e) => {
                    error!("{} read error at chunk #{}: {}", label, chunk_count, e);
                    let _ = tx_err.send(StreamPart::Error {
                        error: format!("{} read error: {}", label, e),
                    });
                    had_error = true;
                    break;
                }
            }
        }

        if had_error {
            return;
        }

        info!("{} stream ended after {} chunks", label, chunk_count);
        if let Err(e) = processor.finish(&parser) {
            let _ = tx_err.send(StreamPart::Error {
                error: e.to_string(),
            });
            return;
        }

        if !processor.saw_terminal() {
            warn!("{} stream ended without message_stop", label);
            let _ = tx_err.send(StreamPart::Error {
                error: format!("{} stream ended before message_stop", label),
            });
        }
    });
}

async fn ensure_success_stream_response(
    client: &AiClient,
    response: reqwest::Response,
    call_start: Instant,
) -> Result<reqwest::Response> {
    info!(
        status = %response.status(),
        elapsed_ms = call_start.elapsed().as_millis() as u64,
        "Streaming response received"
    );
    client.handle_error_response(response).await
}

impl AiClient {
    /// Call the API with streaming response
    ///
    /// Errors before the first byte (connect failure, non-2xx status) are
    /// returned directly; later failures arrive as `StreamPart::Error`.
    pub async fn call_streaming(
        &self,
        messages: Vec<ModelMessage>,
        options: &CallOptions,
    ) -> Result<mpsc::UnboundedReceiver<StreamPart>> {
        let call_start = Instant::now();
        info!(
            model = %self.config().model,
            messages = messages.len(),
            tools = options.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            "Streaming API call start"
        );

        let body = self.build_body(&messages, options, true);
        let request = self.build_request(&self.messages_url());
        let response = request.json(&body).send().await.map_err(|e| {
            error!(error = %e, "Streaming API request failed");
            anyhow::anyhow!("API request failed: {}", e)
        })?;
        let response = ensure_success_stream_response(self, response, call_start).await?;

        if !is_event_stream(&response) {
            return Err(ChatError::MalformedResponse(
                "expected text/event-stream response".to_string(),
            )
            .into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let processor = SseStreamProcessor::new(tx.clone());
        spawn_sse_stream_task(
            response.bytes_stream(),
            processor,
            AnthropicParser::new(),
            tx,
            "Anthropic",
        );

        Ok(rx)
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/event-stream"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::ai::client::AiClientConfig;
    use crate::ai::streaming::BlockKind;
    use crate::ai::types::FinishReason;

    const SSE_BODY: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":10,\"output_tokens\":1}}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_1\",\"name\":\"business_calculator\",\"input\":{}}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"operation\\\":\"}}\n\n\
event: content_block_stop\n\
data: {\"type\":\"content_block_stop\",\"index\":0}\n\n\
event: message_delta\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":20}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n\n";

    async fn client_for(server: &MockServer) -> AiClient {
        let config = AiClientConfig {
            base_url: server.uri(),
            model: "claude-test".to_string(),
            ..Default::default()
        };
        AiClient::new(config, "test_api_key").unwrap()
    }

    #[tokio::test]
    async fn streams_parts_in_wire_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mut rx = client
            .call_streaming(vec![ModelMessage::user("What is 15% of 50000?")], &CallOptions::default())
            .await
            .unwrap();

        let mut parts = Vec::new();
        while let Some(part) = rx.recv().await {
            parts.push(part);
        }

        assert!(matches!(parts[0], StreamPart::Usage { .. }));
        assert_eq!(
            parts[1],
            StreamPart::BlockStart {
                index: 0,
                kind: BlockKind::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "business_calculator".to_string()
                }
            }
        );
        assert_eq!(
            parts[2],
            StreamPart::ToolInputDelta {
                index: 0,
                partial_json: "{\"operation\":".to_string()
            }
        );
        assert_eq!(parts[3], StreamPart::BlockStop { index: 0 });
        assert_eq!(
            parts.last(),
            Some(&StreamPart::Finish {
                reason: FinishReason::ToolUse
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_json(serde_json::json!({
                "type": "error",
                "error": {"type": "overloaded_error", "message": "Overloaded"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .call_streaming(vec![ModelMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap_err();

        match err.downcast_ref::<ChatError>() {
            Some(ChatError::Api { status, message }) => {
                assert_eq!(*status, 529);
                assert_eq!(message, "Overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_event_mid_stream_becomes_error_part() {
        let body = "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n";
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mut rx = client
            .call_streaming(vec![ModelMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(StreamPart::BlockStart { .. })));
        match rx.recv().await {
            Some(StreamPart::Error { error }) => assert!(error.contains("Overloaded")),
            other => panic!("unexpected part: {:?}", other),
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn body_ending_without_message_stop_becomes_error_part() {
        let body = "data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Half\"}}\n\n";
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let mut rx = client
            .call_streaming(vec![ModelMessage::user("hi")], &CallOptions::default())
            .await
            .unwrap();

        let mut parts = Vec::new();
        while let Some(part) = rx.recv().await {
            parts.push(part);
        }

        assert_eq!(
            parts[1],
            StreamPart::TextDelta {
                index: 0,
                delta: "Half".to_string()
            }
        );
        assert!(matches!(
            parts.last(),
            Some(StreamPart::Error { error }) if error.contains("ended before message_stop")
        ));
    }
}
