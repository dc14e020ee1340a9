//! SSE parser implementations for AI providers

mod anthropic;

pub use anthropic::AnthropicParser;
