//! Retrieval collaborators
//!
//! Document search is delegated to hosted services: an `Embedder` turns text
//! into vectors and a `VectorStore` ranks stored vectors against a query.
//! `InMemoryVectorStore` implements the same seam locally.

mod memory;
mod openai;
mod pinecone;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

pub use memory::{cosine_similarity, InMemoryVectorStore};
pub use openai::OpenAiEmbedder;
pub use pinecone::PineconeStore;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder produces
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Similarity query against one index
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub namespace: Option<String>,
    pub filter: Option<Value>,
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

/// A vector with its id and metadata, as written by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Value,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<String>>;

    async fn create_index(&self, name: &str, dimension: usize) -> Result<()>;

    /// Matches ordered by descending score, at most `top_k`
    async fn query(&self, index: &str, request: &QueryRequest) -> Result<Vec<QueryMatch>>;

    /// Returns the number of records written
    async fn upsert(
        &self,
        index: &str,
        namespace: Option<&str>,
        records: &[VectorRecord],
    ) -> Result<usize>;
}

/// Pass successful responses through, turn anything else into a labelled error
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    label: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    error!(status = status.as_u16(), "{} request failed: {}", label, body);
    Err(anyhow::anyhow!("{} API error: {} - {}", label, status, body))
}
