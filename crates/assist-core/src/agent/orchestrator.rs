//! Tool-use orchestrator: the single canonical chat loop.
//!
//! `Orchestrator` runs one user request end to end: stream the model
//! response, execute any tool calls, feed the results back, and relay
//! `ChatEvent`s for every state change.
//!
//! ```text
//!  ┌──────────────┐   StreamPart   ┌──────────────┐   ChatEvent   ┌──────────┐
//!  │ ChatProvider │ ─────────────► │ Orchestrator │ ────────────► │  Client  │
//!  └──────────────┘                └──────┬───────┘               └──────────┘
//!                                         │ execute
//!                                         ▼
//!                                  ┌──────────────┐
//!                                  │ ToolRegistry │
//!                                  └──────────────┘
//! ```
//!
//! States: `Idle → StreamingFirstPass → (ExecutingTools → StreamingFollowUp)*
//! → Done`, with `Errored` reachable from any non-terminal state.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ai::client::CallOptions;
use crate::ai::format::PLACEHOLDER_TEXT;
use crate::ai::provider::ChatProvider;
use crate::ai::types::{Content, FinishReason, ModelMessage, Role};
use crate::config::AgentSettings;
use crate::tools::registry::ToolRegistry;

use super::executor;
use super::loop_events::{ChatEvent, EventSink, ToolOutcome};
use super::stream::{self, StreamOutcome};

/// Configuration for orchestrator runs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub system_prompt: String,
    /// Tool rounds allowed per user message
    pub max_tool_rounds: usize,
    pub stream_idle_timeout: Duration,
    /// Overrides the client's configured max tokens when set
    pub max_tokens: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for OrchestratorConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            system_prompt: settings.system_prompt.clone(),
            max_tool_rounds: settings.max_tool_rounds,
            stream_idle_timeout: settings.stream_idle_timeout,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrchestratorState {
    Idle,
    StreamingFirstPass,
    ExecutingTools,
    StreamingFollowUp,
    Done,
    Errored,
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::StreamingFirstPass => "streaming_first_pass",
            Self::ExecutingTools => "executing_tools",
            Self::StreamingFollowUp => "streaming_follow_up",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

fn transition(state: &mut OrchestratorState, next: OrchestratorState) {
    debug!(from = %state, to = %next, "Orchestrator state change");
    *state = next;
}

/// How a streamed run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed {
        final_text: String,
        stop_reason: FinishReason,
    },
    Failed(String),
    /// The client disconnected before the run finished
    Cancelled,
}

/// Runs chat requests against a provider and a tool registry.
#[derive(Clone)]
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    async fn call_options(&self) -> CallOptions {
        let tools = self.tools.describe().await;
        CallOptions {
            max_tokens: self.config.max_tokens,
            temperature: None,
            tools: if tools.is_empty() { None } else { Some(tools) },
            system_prompt: Some(self.config.system_prompt.clone()),
        }
    }

    /// Start a streamed run in its own task.
    ///
    /// The returned receiver yields every `ChatEvent` and closes after the
    /// terminal one. Dropping it cancels the run.
    pub fn spawn(
        self,
        conversation: Vec<ModelMessage>,
        buffer: usize,
    ) -> mpsc::Receiver<ChatEvent> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        tokio::spawn(async move {
            let outcome = self.run(conversation, EventSink::new(tx)).await;
            debug!(?outcome, "Chat run finished");
        });
        rx
    }

    /// Run one streamed request, relaying events to `events`.
    ///
    /// Emits exactly one terminal event (`Done` or `Error`) unless the
    /// client disconnects first.
    pub async fn run(&self, mut conversation: Vec<ModelMessage>, events: EventSink) -> RunOutcome {
        let options = self.call_options().await;
        let idle_timeout = self.config.stream_idle_timeout;
        let mut state = OrchestratorState::Idle;
        let mut rounds = 0usize;

        info!(
            model = self.provider.model(),
            messages = conversation.len(),
            tools = options.tools.as_ref().map_or(0, Vec::len),
            "Starting chat run"
        );

        loop {
            let next = if rounds == 0 {
                OrchestratorState::StreamingFirstPass
            } else {
                OrchestratorState::StreamingFollowUp
            };
            transition(&mut state, next);

            let api_rx = match self
                .provider
                .call_streaming(conversation.clone(), &options)
                .await
            {
                Ok(rx) => rx,
                Err(e) => {
                    return fail(&mut state, &events, format!("AI error: {}", e)).await;
                }
            };

            let result = match stream::process_stream(api_rx, &events, idle_timeout).await {
                StreamOutcome::Completed(result) => result,
                StreamOutcome::Failed(error) => return fail(&mut state, &events, error).await,
                StreamOutcome::Cancelled => {
                    info!(round = rounds, "Client disconnected, stopping run");
                    return RunOutcome::Cancelled;
                }
            };

            debug!(
                round = rounds,
                tool_calls = result.tool_calls.len(),
                stop_reason = result.stop_reason.as_str(),
                output_tokens = result.usage.completion_tokens,
                "Model message complete"
            );

            let requested = !result.tool_calls.is_empty();
            let runnable = requested && wants_tools(&result.stop_reason);
            let within_limit = rounds < self.config.max_tool_rounds;

            if requested && !(runnable && within_limit) {
                let ids: Vec<String> = result.tool_calls.iter().map(|c| c.id.clone()).collect();
                if runnable {
                    warn!(
                        round = rounds,
                        max_tool_rounds = self.config.max_tool_rounds,
                        skipped = ids.len(),
                        "Tool round limit reached, not executing requested tools"
                    );
                } else {
                    warn!(
                        stop_reason = result.stop_reason.as_str(),
                        skipped = ids.len(),
                        "Message did not stop for tool use, not executing requested tools"
                    );
                }
                if !events.send(ChatEvent::ToolCallsSkipped { ids }).await {
                    return RunOutcome::Cancelled;
                }
            }

            if !(runnable && within_limit) {
                transition(&mut state, OrchestratorState::Done);
                let stop_reason = result.stop_reason.clone();
                let done = ChatEvent::Done {
                    stop_reason: stop_reason.as_str().to_string(),
                };
                if !events.send(done).await {
                    return RunOutcome::Cancelled;
                }
                info!(rounds, "Chat run complete");
                return RunOutcome::Completed {
                    final_text: result.text(),
                    stop_reason,
                };
            }

            if events.is_closed() {
                info!(round = rounds, "Client disconnected, skipping tool execution");
                return RunOutcome::Cancelled;
            }

            transition(&mut state, OrchestratorState::ExecutingTools);
            let outcomes = executor::execute_tools(&result.tool_calls, &self.tools).await;
            if !events
                .send(ChatEvent::ToolsExecuted {
                    results: outcomes.clone(),
                })
                .await
            {
                return RunOutcome::Cancelled;
            }

            conversation.extend(build_follow_up(&result.content, &outcomes));
            rounds += 1;
        }
    }

    /// Non-streamed request: returns the final assistant text.
    pub async fn respond(&self, mut conversation: Vec<ModelMessage>) -> anyhow::Result<String> {
        let options = self.call_options().await;
        let mut rounds = 0usize;

        loop {
            let response = self.provider.call(conversation.clone(), &options).await?;
            let tool_calls = response.tool_calls();

            if tool_calls.is_empty() || !wants_tools(&response.stop_reason) {
                return Ok(response.text());
            }
            if rounds >= self.config.max_tool_rounds {
                warn!(
                    round = rounds,
                    skipped = tool_calls.len(),
                    "Tool round limit reached, returning text without executing tools"
                );
                return Ok(response.text());
            }

            let outcomes = executor::execute_tools(&tool_calls, &self.tools).await;
            conversation.extend(build_follow_up(&response.content, &outcomes));
            rounds += 1;
        }
    }
}

async fn fail(state: &mut OrchestratorState, events: &EventSink, error: String) -> RunOutcome {
    transition(state, OrchestratorState::Errored);
    warn!(error = %error, "Chat run failed");
    let _ = events
        .send(ChatEvent::Error {
            error: error.clone(),
        })
        .await;
    RunOutcome::Failed(error)
}

/// Tools run only when the model stopped to wait for their results
fn wants_tools(stop_reason: &FinishReason) -> bool {
    *stop_reason == FinishReason::ToolUse
}

/// The assistant turn that requested tools plus the user turn answering it.
///
/// Blocks keep the order the model produced them in. Blank text blocks are
/// dropped, and a placeholder leads the turn when no text remains. Only
/// calls that have an outcome are echoed back so every tool use has its
/// result.
fn build_follow_up(content: &[Content], outcomes: &[ToolOutcome]) -> [ModelMessage; 2] {
    let mut assistant_content: Vec<Content> = content
        .iter()
        .filter(|block| match block {
            Content::Text { text } => !text.trim().is_empty(),
            Content::ToolUse { id, .. } => outcomes.iter().any(|o| &o.id == id),
            Content::ToolResult { .. } => false,
        })
        .cloned()
        .collect();

    if !assistant_content
        .iter()
        .any(|block| matches!(block, Content::Text { .. }))
    {
        assistant_content.insert(0, Content::text(PLACEHOLDER_TEXT));
    }

    [
        ModelMessage {
            role: Role::Assistant,
            content: assistant_content,
        },
        ModelMessage {
            role: Role::User,
            content: executor::tool_result_blocks(outcomes),
        },
    ]
}
