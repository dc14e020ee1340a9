//! In-process vector store with brute-force cosine ranking

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{QueryMatch, QueryRequest, VectorRecord, VectorStore};

/// Calculate cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

struct MemoryIndex {
    dimension: usize,
    /// namespace -> id -> record
    namespaces: HashMap<String, HashMap<String, VectorRecord>>,
}

#[derive(Default)]
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in one namespace of an index
    pub async fn count(&self, index: &str, namespace: Option<&str>) -> usize {
        let indexes = self.indexes.read().await;
        indexes
            .get(index)
            .and_then(|i| i.namespaces.get(namespace.unwrap_or("")))
            .map(|ns| ns.len())
            .unwrap_or(0)
    }
}

/// Subset of the Pinecone metadata filter language: plain equality,
/// `$eq`, `$ne`, `$in`, and `$nin`, combined with AND across keys
fn matches_filter(metadata: &Value, filter: &Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return true;
    };

    conditions.iter().all(|(key, condition)| {
        let actual = metadata.get(key);
        match condition.as_object() {
            Some(ops) => ops.iter().all(|(op, expected)| match op.as_str() {
                "$eq" => actual == Some(expected),
                "$ne" => actual != Some(expected),
                "$in" => expected
                    .as_array()
                    .map(|vals| actual.is_some_and(|a| vals.contains(a)))
                    .unwrap_or(false),
                "$nin" => expected
                    .as_array()
                    .map(|vals| !actual.is_some_and(|a| vals.contains(a)))
                    .unwrap_or(true),
                _ => false,
            }),
            None => actual == Some(condition),
        }
    })
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let indexes = self.indexes.read().await;
        let mut names: Vec<String> = indexes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(name) {
            anyhow::bail!("Index already exists: {}", name);
        }
        indexes.insert(
            name.to_string(),
            MemoryIndex {
                dimension,
                namespaces: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn query(&self, index: &str, request: &QueryRequest) -> Result<Vec<QueryMatch>> {
        let indexes = self.indexes.read().await;
        let idx = indexes
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("Index not found: {}", index))?;

        let Some(records) = idx
            .namespaces
            .get(request.namespace.as_deref().unwrap_or(""))
        else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<QueryMatch> = records
            .values()
            .filter(|r| {
                request
                    .filter
                    .as_ref()
                    .map(|f| matches_filter(&r.metadata, f))
                    .unwrap_or(true)
            })
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: cosine_similarity(&request.vector, &r.values),
                metadata: r.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(request.top_k);
        Ok(scored)
    }

    async fn upsert(
        &self,
        index: &str,
        namespace: Option<&str>,
        records: &[VectorRecord],
    ) -> Result<usize> {
        let mut indexes = self.indexes.write().await;
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("Index not found: {}", index))?;

        if let Some(bad) = records.iter().find(|r| r.values.len() != idx.dimension) {
            anyhow::bail!(
                "Vector dimension {} does not match index dimension {} (id {})",
                bad.values.len(),
                idx.dimension,
                bad.id
            );
        }

        let ns = idx
            .namespaces
            .entry(namespace.unwrap_or("").to_string())
            .or_default();
        for record in records {
            ns.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }
}
