//! OpenAI embeddings client

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{ensure_success, Embedder};
use crate::config::EmbeddingSettings;
use crate::constants;

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            dimension: constants::retrieval::EMBEDDING_DIMENSION,
        })
    }

    async fn request(&self, input: serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Embeddings request failed")?;
        let response = ensure_success(response, "Embeddings").await?;
        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Malformed embeddings response")?;

        if parsed.data.len() != expected {
            anyhow::bail!(
                "Embeddings response had {} vectors, expected {}",
                parsed.data.len(),
                expected
            );
        }

        parsed.data.sort_by_key(|d| d.index);
        debug!(count = parsed.data.len(), model = %self.model, "Embeddings generated");
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(serde_json::json!(text), 1).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Embeddings response was empty"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(serde_json::json!(texts), texts.len()).await
    }
}
