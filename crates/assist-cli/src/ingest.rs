//! `assist ingest` and `assist tokens`

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::Local;

use assist_core::constants::ingest::INDEX_READY_WAIT_SECS;
use assist_core::ingest::{
    count_tokens_in_folder, embed_and_upsert, ensure_index, process_folder, write_review_report,
    ChunkOptions,
};
use assist_core::retrieval::{Embedder, OpenAiEmbedder, PineconeStore, VectorStore};
use assist_core::Settings;

pub struct IngestArgs {
    pub folder: PathBuf,
    pub index: String,
    pub namespace: Option<String>,
    pub patient_id: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub report: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
pub struct IngestSummary {
    pub chunks: usize,
    pub upserted: usize,
    pub namespace: Option<String>,
    pub index_created: bool,
}

/// `processed_documents_YYYYmmdd_HHMMSS.md` in the current directory
pub fn default_report_path() -> PathBuf {
    PathBuf::from(format!(
        "processed_documents_{}.md",
        Local::now().format("%Y%m%d_%H%M%S")
    ))
}

/// Run the ingest command against the configured embedder and vector store.
pub async fn run(args: IngestArgs) -> Result<()> {
    let settings = Settings::from_env()?;
    let embeddings = settings.embeddings.require("Embeddings")?;
    let vector_store = settings.vector_store.require("Vector store")?;

    let embedder = OpenAiEmbedder::new(embeddings)?;
    let store = PineconeStore::new(vector_store)?;

    let summary = ingest_documents(
        &args,
        &embedder,
        &store,
        Duration::from_secs(INDEX_READY_WAIT_SECS),
    )
    .await?;

    println!();
    println!("  Chunks processed:  {}", summary.chunks);
    println!("  Vectors upserted:  {}", summary.upserted);
    println!("  Index:             {}", args.index);
    println!(
        "  Namespace:         {}",
        summary.namespace.as_deref().unwrap_or("(default)")
    );
    if let Some(report) = &args.report {
        println!("  Review report:     {}", report.display());
    }
    println!();

    Ok(())
}

pub async fn ingest_documents(
    args: &IngestArgs,
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    ready_wait: Duration,
) -> Result<IngestSummary> {
    let options = ChunkOptions {
        chunk_size: args.chunk_size,
        chunk_overlap: args.chunk_overlap,
    };
    let chunks = process_folder(&args.folder, args.patient_id.as_deref(), &options)?;
    if chunks.is_empty() {
        bail!("No markdown documents found in {}", args.folder.display());
    }

    let index_created = ensure_index(store, &args.index, embedder.dimension()).await?;
    if index_created && !ready_wait.is_zero() {
        tracing::info!(index = %args.index, "Waiting for new index to become ready");
        tokio::time::sleep(ready_wait).await;
    }

    let namespace = args
        .namespace
        .clone()
        .or_else(|| chunks.first().map(|c| c.patient_id.clone()));

    let upserted =
        embed_and_upsert(&chunks, embedder, store, &args.index, namespace.as_deref()).await?;

    if let Some(report) = &args.report {
        write_review_report(&chunks, report)?;
    }

    Ok(IngestSummary {
        chunks: chunks.len(),
        upserted,
        namespace,
        index_created,
    })
}

/// Run the tokens command
pub fn print_token_counts(folder: &Path) -> Result<()> {
    let counts = count_tokens_in_folder(folder)?;
    if counts.is_empty() {
        println!("No markdown files found in {}", folder.display());
        return Ok(());
    }

    let width = counts
        .keys()
        .map(|path| display_name(path).len())
        .max()
        .unwrap_or(0);

    for (path, tokens) in &counts {
        println!("  {:<width$}  {:>8} tokens", display_name(path), tokens, width = width);
    }
    let total: usize = counts.values().sum();
    println!("  {:<width$}  {:>8} tokens", "TOTAL", total, width = width);

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
