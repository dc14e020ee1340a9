//! Streaming event types
//!
//! `StreamPart` is the provider-neutral unit delivered over the channel
//! returned by `ChatProvider::call_streaming`. Parts arrive strictly in
//! wire order. Tool arguments are NOT assembled here: the raw
//! `partial_json` fragments are forwarded and the consumer owns buffering.

use serde::Serialize;

use crate::ai::types::{FinishReason, Usage};

/// Kind of content block opened by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
}

/// One lifecycle event of a streamed model response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamPart {
    /// A content block opened at `index`
    BlockStart { index: usize, kind: BlockKind },
    /// Text appended to the text block at `index`
    TextDelta { index: usize, delta: String },
    /// Raw JSON fragment appended to the tool-use block at `index`
    ToolInputDelta { index: usize, partial_json: String },
    /// The block at `index` is complete
    BlockStop { index: usize },
    /// Token usage update
    Usage { usage: Usage },
    /// The message is complete
    Finish { reason: FinishReason },
    /// Provider or transport error; no further parts follow
    Error { error: String },
}

impl StreamPart {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamPart::Finish { .. } | StreamPart::Error { .. })
    }
}
