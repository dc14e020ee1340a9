//! Document search tool - semantic retrieval over a vector index

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::constants::tools::{SEARCH_DEFAULT_TOP_K, SEARCH_MAX_TOP_K};
use crate::retrieval::{Embedder, QueryRequest, VectorStore};
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolResult};

pub struct SearchDocumentsTool {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
}

impl SearchDocumentsTool {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn VectorStore>) -> Self {
        Self { embedder, store }
    }
}

#[derive(Deserialize)]
struct Params {
    query: String,
    index_name: String,
    #[serde(default)]
    top_k: Option<i64>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    filter: Option<Value>,
}

/// Requested result count clamped to `1..=SEARCH_MAX_TOP_K`
fn clamp_top_k(requested: Option<i64>) -> usize {
    match requested {
        Some(k) => k.clamp(1, SEARCH_MAX_TOP_K as i64) as usize,
        None => SEARCH_DEFAULT_TOP_K as usize,
    }
}

#[async_trait]
impl Tool for SearchDocumentsTool {
    fn name(&self) -> &str {
        "search_documents"
    }

    fn description(&self) -> &str {
        "Search indexed documents by meaning. Embeds the query, finds the closest chunks in the given vector index, and returns them ranked by similarity score with their metadata (including the chunk text)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for, in natural language"
                },
                "index_name": {
                    "type": "string",
                    "description": "Name of the vector index to search"
                },
                "top_k": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": SEARCH_MAX_TOP_K,
                    "description": "Number of results to return (default: 5)"
                },
                "namespace": {
                    "type": "string",
                    "description": "Namespace within the index, e.g. a patient id"
                },
                "filter": {
                    "type": "object",
                    "description": "Metadata filter, e.g. {\"type\": {\"$eq\": \"lab_results\"}}"
                }
            },
            "required": ["query", "index_name"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, params: Value) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if params.query.trim().is_empty() {
            return ToolResult::invalid_parameters("query must not be empty");
        }
        if params.filter.as_ref().is_some_and(|f| !f.is_object()) {
            return ToolResult::invalid_parameters("filter must be an object");
        }

        let vector = match self.embedder.embed(&params.query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Query embedding failed");
                return ToolResult::error_with_code("upstream_error", e);
            }
        };

        let request = QueryRequest {
            vector,
            top_k: clamp_top_k(params.top_k),
            namespace: params.namespace.clone(),
            filter: params.filter.clone(),
        };

        let matches = match self.store.query(&params.index_name, &request).await {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, index = %params.index_name, "Vector query failed");
                return ToolResult::error_with_code("upstream_error", e);
            }
        };

        let results: Vec<Value> = matches
            .into_iter()
            .map(|m| {
                json!({
                    "score": m.score,
                    "id": m.id,
                    "metadata": m.metadata,
                })
            })
            .collect();

        ToolResult::success_data(json!({
            "query": params.query,
            "matches_found": results.len(),
            "results": results,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::Result;

    use super::*;
    use crate::retrieval::{QueryMatch, VectorRecord};

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            2
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }
    }

    /// Records every query it receives and answers with one match per slot
    #[derive(Default)]
    struct RecordingStore {
        queries: Mutex<Vec<QueryRequest>>,
    }

    #[async_trait]
    impl VectorStore for RecordingStore {
        async fn list_indexes(&self) -> Result<Vec<String>> {
            Ok(vec!["medical".to_string()])
        }

        async fn create_index(&self, _name: &str, _dimension: usize) -> Result<()> {
            Ok(())
        }

        async fn query(&self, _index: &str, request: &QueryRequest) -> Result<Vec<QueryMatch>> {
            self.queries.lock().unwrap().push(request.clone());
            Ok((0..request.top_k)
                .map(|i| QueryMatch {
                    id: format!("doc_{}", i),
                    score: 1.0 - i as f32 * 0.01,
                    metadata: json!({"text": format!("chunk {}", i)}),
                })
                .collect())
        }

        async fn upsert(
            &self,
            _index: &str,
            _namespace: Option<&str>,
            records: &[VectorRecord],
        ) -> Result<usize> {
            Ok(records.len())
        }
    }

    #[test]
    fn top_k_is_clamped() {
        assert_eq!(clamp_top_k(Some(25)), 20);
        assert_eq!(clamp_top_k(Some(0)), 1);
        assert_eq!(clamp_top_k(Some(-3)), 1);
        assert_eq!(clamp_top_k(Some(7)), 7);
        assert_eq!(clamp_top_k(None), 5);
    }

    #[tokio::test]
    async fn requested_top_k_above_limit_returns_twenty() {
        let store = Arc::new(RecordingStore::default());
        let tool = SearchDocumentsTool::new(Arc::new(FixedEmbedder), store.clone());

        let result = tool
            .execute(json!({"query": "cholesterol", "index_name": "medical", "top_k": 25}))
            .await;

        assert!(!result.is_error);
        let value: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(value["query"], "cholesterol");
        assert_eq!(value["matches_found"], 20);
        assert_eq!(value["results"][0]["id"], "doc_0");
        assert_eq!(store.queries.lock().unwrap()[0].top_k, 20);
    }

    #[tokio::test]
    async fn namespace_and_filter_are_forwarded() {
        let store = Arc::new(RecordingStore::default());
        let tool = SearchDocumentsTool::new(Arc::new(FixedEmbedder), store.clone());

        tool.execute(json!({
            "query": "blood pressure",
            "index_name": "medical",
            "namespace": "1001",
            "filter": {"type": "vital_signs"}
        }))
        .await;

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries[0].namespace.as_deref(), Some("1001"));
        assert_eq!(queries[0].filter, Some(json!({"type": "vital_signs"})));
        assert_eq!(queries[0].top_k, 5);
    }

    #[tokio::test]
    async fn embedding_failure_is_an_error_result() {
        let tool =
            SearchDocumentsTool::new(Arc::new(FailingEmbedder), Arc::new(RecordingStore::default()));

        let result = tool
            .execute(json!({"query": "anything", "index_name": "medical"}))
            .await;

        assert!(result.is_error);
        let value: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(value["error"]["code"], "upstream_error");
    }
}
