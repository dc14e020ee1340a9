//! AI provider layer
//!
//! Handles communication with the Anthropic Messages API: wire format,
//! SSE parsing, and the `ChatProvider` seam the orchestrator drives.

pub mod client;
pub mod format;
pub mod parsers;
pub mod provider;
pub mod sse;
pub mod streaming;
pub mod types;

pub use client::{AiClient, AiClientConfig, CallOptions, ChatError};
pub use provider::ChatProvider;
