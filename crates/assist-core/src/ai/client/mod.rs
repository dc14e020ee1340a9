//! Anthropic Messages API client

mod complete;
mod config;
mod core;
mod streaming;

pub use config::{AiClientConfig, CallOptions};
pub use self::core::{AiClient, ChatError};
