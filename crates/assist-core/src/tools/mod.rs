//! Tools the model can call
//!
//! Provides the tool registry and all built-in tool implementations.

pub mod implementations;
pub mod registry;

pub use implementations::{register_builtin_tools, register_search_tool};
pub use registry::{parse_params, Tool, ToolError, ToolRegistry, ToolResult};
