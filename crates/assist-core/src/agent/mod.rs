//! Agent system for assist
//!
//! ## Orchestrator (the canonical chat loop)
//! - `Orchestrator` - Streaming and non-streaming tool-use loop
//! - `ChatEvent` - Event protocol between orchestrator and consumers
//! - `OrchestratorConfig` - Prompt, tool round limit, timeouts
//!
//! ## Internals
//! - `stream` - Reassembles content blocks from `StreamPart`s
//! - `executor` - Runs tool calls with per-call isolation

mod executor;
pub mod loop_events;
pub mod orchestrator;
mod stream;

pub use loop_events::{ChatEvent, EventSink, ToolOutcome};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunOutcome};
