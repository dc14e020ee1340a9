//! Document ingestion
//!
//! Markdown files are chunked, embedded, and upserted into a vector index so
//! the `search_documents` tool can retrieve them.
//!
//! - `tokens` - cl100k-style token counting
//! - `splitter` - Markdown-aware chunking with overlap
//! - `documents` - Files to `DocumentChunk` records
//! - `upload` - Index provisioning, embedding, and batched upsert
//! - `report` - Markdown review report of processed chunks

pub mod documents;
pub mod report;
pub mod splitter;
pub mod tokens;
pub mod upload;

pub use documents::{
    doc_type_from_filename, markdown_files, patient_id_from_filename, process_folder,
    process_markdown_file, ChunkOptions, DocumentChunk,
};
pub use report::{render_review_report, write_review_report};
pub use splitter::split_markdown;
pub use tokens::{count_tokens, count_tokens_in_folder};
pub use upload::{embed_and_upsert, ensure_index};
