//! Tool implementations
//!
//! Built-in tools:
//! - staff_lookup: Search the staff directory
//! - business_calculator: Percentages, margins, ROI, growth, break-even, compound interest
//! - search_documents: Semantic search over a vector index (needs embeddings + vector store)

pub mod calculator;
pub mod search;
pub mod staff;

use std::sync::Arc;

use anyhow::Result;

pub use calculator::BusinessCalculatorTool;
pub use search::SearchDocumentsTool;
pub use staff::{StaffLookupTool, StaffMember};

use crate::retrieval::{Embedder, VectorStore};
use crate::tools::ToolRegistry;

/// Register the tools that need no external service
pub async fn register_builtin_tools(registry: &ToolRegistry) -> Result<()> {
    registry.register(Arc::new(StaffLookupTool::new()?)).await?;
    registry.register(Arc::new(BusinessCalculatorTool)).await?;
    Ok(())
}

/// Register the search tool
///
/// Only call this when both retrieval collaborators are configured.
pub async fn register_search_tool(
    registry: &ToolRegistry,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
) -> Result<()> {
    registry
        .register(Arc::new(SearchDocumentsTool::new(embedder, store)))
        .await?;
    Ok(())
}
