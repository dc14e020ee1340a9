//! Markdown review report for processed chunks

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use super::documents::DocumentChunk;
use crate::constants::ingest::PREVIEW_CHARS;

/// Render the review report: a per-file summary then every chunk in full.
pub fn render_review_report(chunks: &[DocumentChunk], generated_at: DateTime<Local>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# PROCESSED DOCUMENTS SUMMARY\n");
    let _ = writeln!(out, "**Total document chunks:** {}  ", chunks.len());
    let _ = writeln!(
        out,
        "**Generated on:** {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );

    let mut by_file: BTreeMap<&str, Vec<&DocumentChunk>> = BTreeMap::new();
    for chunk in chunks {
        by_file.entry(chunk.source_file.as_str()).or_default().push(chunk);
    }

    let _ = writeln!(out, "## FILES SUMMARY\n");
    for (file, file_chunks) in &by_file {
        let tokens: usize = file_chunks.iter().map(|c| c.token_count).sum();
        let _ = writeln!(
            out,
            "📄 **{}:** {} chunks, {} total tokens  ",
            file,
            file_chunks.len(),
            tokens
        );
        if file_chunks.len() == 1 && file_chunks[0].is_complete_document {
            let _ = writeln!(out, "└── Single complete document\n");
        } else {
            let _ = writeln!(out, "└── Split into {} chunks\n", file_chunks.len());
        }
    }

    let _ = writeln!(out, "---\n");
    let _ = writeln!(out, "## DETAILED DOCUMENT CHUNKS\n");

    for (i, chunk) in chunks.iter().enumerate() {
        let preview: String = chunk.text.chars().take(PREVIEW_CHARS).collect();

        let _ = writeln!(out, "### CHUNK {}\n", i + 1);
        let _ = writeln!(out, "- **ID:** {}", chunk.doc_id);
        let _ = writeln!(out, "- **Patient ID:** {}", chunk.patient_id);
        let _ = writeln!(out, "- **Type:** {}", chunk.doc_type);
        let _ = writeln!(out, "- **Source File:** {}", chunk.source_file);
        let _ = writeln!(out, "- **Token Count:** {}", chunk.token_count);
        let _ = writeln!(
            out,
            "- **Chunk Index:** {} of {}",
            chunk.chunk_index + 1,
            chunk.total_chunks
        );
        let _ = writeln!(out, "- **Complete Document:** {}", chunk.is_complete_document);
        let _ = writeln!(out, "- **Timestamp:** {}\n", chunk.timestamp.to_rfc3339());
        let _ = writeln!(out, "**Text Preview (first {} chars):**", PREVIEW_CHARS);
        let _ = writeln!(out, "```\n{}...\n```\n", preview);
        let _ = writeln!(out, "**Full Text:**");
        let _ = writeln!(out, "```\n{}\n```\n", chunk.text);
        let _ = writeln!(out, "---\n");
    }

    out
}

pub fn write_review_report(chunks: &[DocumentChunk], path: &Path) -> Result<()> {
    let report = render_review_report(chunks, Local::now());
    std::fs::write(path, report)
        .with_context(|| format!("Failed to write review report to {}", path.display()))
}
