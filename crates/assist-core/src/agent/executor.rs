//! Tool execution for the orchestrator.
//!
//! Calls run one after another in request order. Each call runs in its own
//! task so a panicking tool becomes an error result instead of taking the
//! whole run down.

use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::types::{AiToolCall, Content};
use crate::constants::tools::MAX_OUTPUT_BYTES;
use crate::tools::registry::{ToolError, ToolRegistry, ToolResult};

use super::loop_events::ToolOutcome;

/// Execute a batch of tool calls, returning one outcome per call in order.
pub(crate) async fn execute_tools(
    tool_calls: &[AiToolCall],
    tool_registry: &Arc<ToolRegistry>,
) -> Vec<ToolOutcome> {
    let mut outcomes = Vec::with_capacity(tool_calls.len());

    for call in tool_calls {
        let result = execute_one(call, tool_registry).await;
        let output = truncate_output(&result.output);

        outcomes.push(ToolOutcome {
            id: call.id.clone(),
            name: call.name.clone(),
            output,
            is_error: result.is_error,
        });
    }

    info!(
        count = outcomes.len(),
        errors = outcomes.iter().filter(|o| o.is_error).count(),
        "Tool round executed"
    );
    outcomes
}

async fn execute_one(call: &AiToolCall, tool_registry: &Arc<ToolRegistry>) -> ToolResult {
    let registry = tool_registry.clone();
    let name = call.name.clone();
    let arguments = call.arguments.clone();

    let handle = tokio::spawn(async move { registry.execute(&name, arguments).await });

    match handle.await {
        Ok(Ok(result)) => result,
        Ok(Err(ToolError::UnknownTool(name))) => {
            warn!(tool = %name, "Model requested an unknown tool");
            ToolResult::error_with_code("unknown_tool", format!("Unknown tool: {}", name))
        }
        Ok(Err(e)) => ToolResult::error(e),
        Err(join_error) => {
            warn!(tool = %call.name, error = %join_error, "Tool task failed");
            ToolResult::error_with_code(
                "tool_error",
                format!("Tool '{}' failed unexpectedly", call.name),
            )
        }
    }
}

/// Tool-result blocks for the follow-up user turn, in call order.
pub(crate) fn tool_result_blocks(outcomes: &[ToolOutcome]) -> Vec<Content> {
    outcomes
        .iter()
        .map(|outcome| Content::ToolResult {
            tool_use_id: outcome.id.clone(),
            output: outcome.output.clone(),
            is_error: if outcome.is_error { Some(true) } else { None },
        })
        .collect()
}

pub(crate) fn truncate_output(output: &str) -> String {
    if output.len() <= MAX_OUTPUT_BYTES {
        return output.to_string();
    }

    let truncated_len = floor_char_boundary(output, MAX_OUTPUT_BYTES);
    let truncated = &output[..truncated_len];
    let break_point = truncated.rfind('\n').unwrap_or(truncated_len);
    let clean = &output[..break_point];
    format!(
        "{}\n\n[... OUTPUT TRUNCATED: {} chars -> {} chars ...]",
        clean,
        output.len(),
        clean.len()
    )
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut boundary = index.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}
