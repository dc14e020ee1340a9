//! Embedding and vector upsert for document chunks

use anyhow::Result;
use serde_json::json;
use tracing::info;

use super::documents::DocumentChunk;
use crate::constants::ingest::UPSERT_BATCH_SIZE;
use crate::retrieval::{Embedder, VectorRecord, VectorStore};

/// Create the index if it does not exist yet. Returns `true` when created.
pub async fn ensure_index(store: &dyn VectorStore, name: &str, dimension: usize) -> Result<bool> {
    let existing = store.list_indexes().await?;
    if existing.iter().any(|index| index == name) {
        info!(index = name, "Index already exists");
        return Ok(false);
    }

    store.create_index(name, dimension).await?;
    Ok(true)
}

fn record_for(chunk: &DocumentChunk, values: Vec<f32>) -> VectorRecord {
    VectorRecord {
        id: chunk.doc_id.clone(),
        values,
        metadata: json!({
            "patient_id": chunk.patient_id,
            "type": chunk.doc_type,
            "text": chunk.text,
            "source_file": chunk.source_file,
            "chunk_index": chunk.chunk_index,
            "timestamp": chunk.timestamp.to_rfc3339(),
        }),
    }
}

/// Embed every chunk and upsert it under its `doc_id`, in batches.
///
/// Returns the number of vectors the store reports as written. The first
/// failing batch aborts the upload.
pub async fn embed_and_upsert(
    chunks: &[DocumentChunk],
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    index: &str,
    namespace: Option<&str>,
) -> Result<usize> {
    let mut written = 0;

    for (batch_number, batch) in chunks.chunks(UPSERT_BATCH_SIZE).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != batch.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                batch.len()
            );
        }

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| record_for(chunk, values))
            .collect();

        written += store.upsert(index, namespace, &records).await?;
        info!(
            index,
            batch = batch_number + 1,
            vectors = records.len(),
            "Upserted batch"
        );
    }

    Ok(written)
}
