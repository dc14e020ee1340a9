//! Chat endpoint
//!
//! `POST /api/chat` with `stream: false` answers with `{"response": ...}`.
//! With `stream: true` it answers with server-sent events: one JSON
//! `ChatEvent` per `data:` line, then a literal `data: [DONE]`.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::post,
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};
use uuid::Uuid;

use assist_core::agent::{ChatEvent, Orchestrator};
use assist_core::constants::server::SSE_CHANNEL_BUFFER;

use crate::error::AppError;
use crate::types::{ChatRequest, ChatResponse};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(chat))
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let stream = request.stream;
    let conversation = request
        .into_conversation()
        .map_err(AppError::BadRequest)?;

    let provider = state.chat.require("Chat")?;
    let orchestrator = Orchestrator::new(
        Arc::clone(provider),
        state.tool_registry.clone(),
        state.orchestrator_config.clone(),
    );

    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        messages = conversation.len(),
        stream,
        "Chat request"
    );

    if stream {
        let events = orchestrator.spawn(conversation, SSE_CHANNEL_BUFFER);
        return Ok(sse_response(events).into_response());
    }

    let response = orchestrator.respond(conversation).await.map_err(|e| {
        error!(%request_id, "Chat request failed: {:#}", e);
        AppError::Upstream(e.to_string())
    })?;
    Ok(Json(ChatResponse { response }).into_response())
}

/// Relay orchestrator events, then the `[DONE]` sentinel. Dropping the
/// response body drops the receiver, which cancels the run.
fn sse_response(
    events: mpsc::Receiver<ChatEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(events)
        .map(|event| Ok(to_sse_event(&event)))
        .chain(stream::once(async {
            Ok(Event::default().data("[DONE]"))
        }));

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(event: &ChatEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|e| {
        error!("Failed to serialize chat event: {}", e);
        Event::default().data(r#"{"type":"error","error":"event serialization failed"}"#)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use assist_core::ai::ChatProvider;
    use assist_core::Capability;

    use crate::test_support::*;

    fn post_chat(body: Value) -> Request<Body> {
        Request::post("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn available(provider: FixedProvider) -> (axum::Router, Arc<FixedProvider>) {
        let provider = Arc::new(provider);
        let chat: Arc<dyn ChatProvider> = provider.clone();
        (app(state_with(Capability::Available(chat)).await), provider)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_string(response.into_body()).await).unwrap()
    }

    #[tokio::test]
    async fn non_streaming_returns_response_text() {
        let (app, provider) = available(FixedProvider::replying("Dana runs finance.")).await;

        let response = app
            .oneshot(post_chat(json!({
                "messages": [{"role": "user", "content": "Who runs finance?"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"response": "Dana runs finance."}));
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn streaming_emits_events_then_done_sentinel() {
        let (app, _) = available(FixedProvider::replying("Hello there")).await;

        let response = app
            .oneshot(post_chat(json!({
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/event-stream"));

        let body = body_string(response.into_body()).await;
        let data: Vec<&str> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .collect();

        assert_eq!(data.last(), Some(&"[DONE]"));
        let events: Vec<Value> = data[..data.len() - 1]
            .iter()
            .map(|d| serde_json::from_str(d).unwrap())
            .collect();
        assert_eq!(events[0], json!({"type": "text_delta", "delta": "Hello there"}));
        assert_eq!(events.last().unwrap()["type"], "done");
    }

    #[tokio::test]
    async fn streaming_provider_failure_is_an_error_event() {
        let (app, _) = available(FixedProvider::failing()).await;

        let response = app
            .oneshot(post_chat(json!({
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response.into_body()).await;
        assert!(body.contains(r#""type":"error""#));
        assert!(body.trim_end().ends_with("data: [DONE]"));
    }

    #[tokio::test]
    async fn non_streaming_provider_failure_is_bad_gateway() {
        let (app, _) = available(FixedProvider::failing()).await;

        let response = app
            .oneshot(post_chat(json!({
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["code"], "UPSTREAM_ERROR");
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_the_provider() {
        let (app, provider) = available(FixedProvider::replying("unused")).await;

        for body in [
            json!({"messages": []}),
            json!({"messages": [{"role": "assistant", "content": "hi"}]}),
            json!({"messages": [{"role": "tool", "content": "hi"}]}),
            json!({"prompt": "hi"}),
        ] {
            let response = app.clone().oneshot(post_chat(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["code"], "BAD_REQUEST");
        }
        assert!(provider.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_chat_credentials_are_service_unavailable() {
        let app = app(state_with(Capability::Unavailable(
            "ANTHROPIC_API_KEY is not set".to_string(),
        ))
        .await);

        let response = app
            .oneshot(post_chat(json!({
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body = json_body(response).await;
        assert_eq!(body["code"], "UNAVAILABLE");
        assert!(body["error"].as_str().unwrap().contains("ANTHROPIC_API_KEY"));
    }
}
