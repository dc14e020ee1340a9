//! Assist core library
//!
//! Shared between the HTTP server and the CLI:
//! - `ai` - Anthropic Messages API client, wire format, SSE parsing
//! - `agent` - Streaming tool-use orchestrator
//! - `tools` - Tool registry and built-in tools
//! - `retrieval` - Embeddings and vector store clients
//! - `ingest` - Markdown chunking and vector upload
//! - `config` - Settings read from the environment

pub mod agent;
pub mod ai;
pub mod config;
pub mod constants;
pub mod ingest;
pub mod retrieval;
pub mod tools;

pub use config::{Capability, Settings};
