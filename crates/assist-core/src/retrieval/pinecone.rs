//! Pinecone REST client
//!
//! Index management goes to the control plane; queries and upserts go to
//! the per-index data-plane host, which is looked up once and cached.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{ensure_success, QueryMatch, QueryRequest, VectorRecord, VectorStore};
use crate::config::VectorStoreSettings;
use crate::constants;

const API_VERSION: &str = "2024-07";

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexDescription>,
}

#[derive(Deserialize)]
struct IndexDescription {
    name: String,
    #[serde(default)]
    host: Option<String>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

pub struct PineconeStore {
    http: reqwest::Client,
    api_key: String,
    control_url: String,
    hosts: RwLock<HashMap<String, String>>,
}

impl PineconeStore {
    pub fn new(settings: &VectorStoreSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            api_key: settings.api_key.clone(),
            control_url: settings.control_url.trim_end_matches('/').to_string(),
            hosts: RwLock::new(HashMap::new()),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// Data-plane base URL for an index
    async fn host_for(&self, index: &str) -> Result<String> {
        if let Some(host) = self.hosts.read().await.get(index) {
            return Ok(host.clone());
        }

        let url = format!("{}/indexes/{}", self.control_url, index);
        let response = self
            .get(&url)
            .send()
            .await
            .context("Pinecone describe index request failed")?;
        let response = ensure_success(response, "Pinecone").await?;
        let description: IndexDescription = response.json().await?;
        let host = description
            .host
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Index {} has no host yet", description.name))?;

        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host
        } else {
            format!("https://{}", host)
        };
        let base = base.trim_end_matches('/').to_string();

        debug!(index, host = %base, "Resolved index host");
        self.hosts
            .write()
            .await
            .insert(index.to_string(), base.clone());
        Ok(base)
    }
}

#[async_trait]
impl VectorStore for PineconeStore {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let url = format!("{}/indexes", self.control_url);
        let response = self
            .get(&url)
            .send()
            .await
            .context("Pinecone list indexes request failed")?;
        let response = ensure_success(response, "Pinecone").await?;
        let list: IndexList = response.json().await?;
        Ok(list.indexes.into_iter().map(|i| i.name).collect())
    }

    async fn create_index(&self, name: &str, dimension: usize) -> Result<()> {
        let url = format!("{}/indexes", self.control_url);
        let body = json!({
            "name": name,
            "dimension": dimension,
            "metric": "cosine",
            "spec": {
                "serverless": {
                    "cloud": constants::retrieval::PINECONE_CLOUD,
                    "region": constants::retrieval::PINECONE_REGION
                }
            }
        });

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Pinecone create index request failed")?;
        ensure_success(response, "Pinecone").await?;
        info!(index = name, dimension, "Created Pinecone index");
        Ok(())
    }

    async fn query(&self, index: &str, request: &QueryRequest) -> Result<Vec<QueryMatch>> {
        let host = self.host_for(index).await?;
        let mut body = json!({
            "vector": request.vector,
            "topK": request.top_k,
            "includeMetadata": true,
        });
        if let Some(namespace) = request.namespace.as_deref().filter(|n| !n.is_empty()) {
            body["namespace"] = json!(namespace);
        }
        if let Some(filter) = &request.filter {
            body["filter"] = filter.clone();
        }

        let response = self
            .post(&format!("{}/query", host))
            .json(&body)
            .send()
            .await
            .context("Pinecone query request failed")?;
        let response = ensure_success(response, "Pinecone").await?;
        let parsed: QueryResponse = response.json().await?;
        Ok(parsed.matches)
    }

    async fn upsert(
        &self,
        index: &str,
        namespace: Option<&str>,
        records: &[VectorRecord],
    ) -> Result<usize> {
        let host = self.host_for(index).await?;
        let mut body = json!({ "vectors": records });
        if let Some(namespace) = namespace.filter(|n| !n.is_empty()) {
            body["namespace"] = Value::String(namespace.to_string());
        }

        let response = self
            .post(&format!("{}/vectors/upsert", host))
            .json(&body)
            .send()
            .await
            .context("Pinecone upsert request failed")?;
        let response = ensure_success(response, "Pinecone").await?;
        let parsed: UpsertResponse = response.json().await?;
        Ok(parsed.upserted_count)
    }
}
