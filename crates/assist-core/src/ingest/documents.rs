//! Markdown documents to chunk records

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::splitter::split_markdown;
use super::tokens::count_tokens;
use crate::constants::ingest::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

static PATIENT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Filename keyword to document type, first match wins
const DOC_TYPE_KEYWORDS: &[(&str, &str)] = &[
    ("intake", "patient_information"),
    ("vitals", "vital_signs"),
    ("lab", "lab_results"),
    ("imaging", "diagnostic_imaging"),
    ("history", "past_medical_history"),
    ("transcript", "transcript"),
];

const DEFAULT_DOC_TYPE: &str = "medical_document";
const UNKNOWN_PATIENT: &str = "unknown";

/// One chunk of a source document, ready to embed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentChunk {
    pub patient_id: String,
    pub doc_id: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub token_count: usize,
    pub timestamp: DateTime<Utc>,
    pub source_file: String,
    pub is_complete_document: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Token budget for a single-chunk document, and character size of split chunks
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// First run of digits in the filename, or `"unknown"`
pub fn patient_id_from_filename(filename: &str) -> String {
    PATIENT_ID_RE
        .find(filename)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_PATIENT.to_string())
}

pub fn doc_type_from_filename(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    DOC_TYPE_KEYWORDS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or(DEFAULT_DOC_TYPE)
}

fn doc_id(patient_id: &str, doc_type: &str, index: usize) -> String {
    format!(
        "{}_{}_{}",
        patient_id,
        doc_type.replace(' ', "_").to_uppercase(),
        index
    )
}

/// Markdown files directly inside `folder`, sorted by path
pub fn markdown_files(folder: &Path) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        anyhow::bail!("Not a directory: {}", folder.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder).min_depth(1).max_depth(1) {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_file()
                    && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
                {
                    files.push(path.to_path_buf());
                }
            }
            Err(e) => warn!("Error accessing directory entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// Chunk one markdown file.
///
/// Documents within `chunk_size` tokens become a single complete chunk;
/// larger ones are split.
pub fn process_markdown_file(
    path: &Path,
    patient_id: Option<&str>,
    doc_type: Option<&str>,
    options: &ChunkOptions,
) -> Result<Vec<DocumentChunk>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let patient_id = patient_id
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| patient_id_from_filename(&filename));
    let doc_type = doc_type
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| doc_type_from_filename(&filename))
        .to_string();

    let token_count = count_tokens(&content);
    let timestamp = Utc::now();

    if token_count <= options.chunk_size {
        debug!(file = %filename, tokens = token_count, "Single chunk document");
        return Ok(vec![DocumentChunk {
            doc_id: doc_id(&patient_id, &doc_type, 0),
            patient_id,
            doc_type,
            text: content.trim().to_string(),
            chunk_index: 0,
            total_chunks: 1,
            token_count,
            timestamp,
            source_file: filename,
            is_complete_document: true,
        }]);
    }

    let pieces = split_markdown(&content, options.chunk_size, options.chunk_overlap);
    let total_chunks = pieces.len();
    debug!(file = %filename, tokens = token_count, chunks = total_chunks, "Splitting document");

    Ok(pieces
        .into_iter()
        .enumerate()
        .map(|(index, text)| DocumentChunk {
            patient_id: patient_id.clone(),
            doc_id: doc_id(&patient_id, &doc_type, index),
            doc_type: doc_type.clone(),
            token_count: count_tokens(&text),
            text,
            chunk_index: index,
            total_chunks,
            timestamp,
            source_file: filename.clone(),
            is_complete_document: false,
        })
        .collect())
}

/// Chunk every markdown file in `folder`. Files that fail are logged and skipped.
pub fn process_folder(
    folder: &Path,
    patient_id: Option<&str>,
    options: &ChunkOptions,
) -> Result<Vec<DocumentChunk>> {
    let files = markdown_files(folder)?;
    info!(folder = %folder.display(), files = files.len(), "Processing documents");

    let mut chunks = Vec::new();
    for path in &files {
        match process_markdown_file(path, patient_id, None, options) {
            Ok(file_chunks) => {
                debug!(file = %path.display(), chunks = file_chunks.len(), "Processed file");
                chunks.extend(file_chunks);
            }
            Err(e) => warn!(file = %path.display(), error = %e, "Skipping file"),
        }
    }

    info!(files = files.len(), chunks = chunks.len(), "Document processing complete");
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_heuristics() {
        assert_eq!(patient_id_from_filename("patient_6789_intake.md"), "6789");
        assert_eq!(patient_id_from_filename("notes.md"), "unknown");
        assert_eq!(doc_type_from_filename("6789_Vitals.md"), "vital_signs");
        assert_eq!(doc_type_from_filename("lab_panel.md"), "lab_results");
        assert_eq!(doc_type_from_filename("family_history.md"), "past_medical_history");
        assert_eq!(doc_type_from_filename("misc.md"), "medical_document");
    }

    #[test]
    fn small_file_is_one_complete_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patient_1001_labs.md");
        std::fs::write(&path, "\n# Labs\n\nLDL 130 mg/dL\n").unwrap();

        let chunks = process_markdown_file(&path, None, None, &ChunkOptions::default()).unwrap();

        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.doc_id, "1001_LAB_RESULTS_0");
        assert_eq!(chunk.text, "# Labs\n\nLDL 130 mg/dL");
        assert!(chunk.is_complete_document);
        assert_eq!(chunk.source_file, "patient_1001_labs.md");
    }

    #[test]
    fn large_file_is_split_with_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visit_transcript.md");
        let body = (0..40)
            .map(|i| format!("## Section {}\n\n{}", i, "The patient reports mild symptoms. ".repeat(3)))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, body).unwrap();

        let options = ChunkOptions {
            chunk_size: 200,
            chunk_overlap: 20,
        };
        let chunks = process_markdown_file(&path, Some("42"), Some("visit note"), &options).unwrap();

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.doc_id, format!("42_VISIT_NOTE_{}", i));
            assert_eq!(chunk.total_chunks, chunks.len());
            assert!(!chunk.is_complete_document);
            assert!(chunk.text.chars().count() <= 200);
        }
    }

    #[test]
    fn folder_processing_is_sorted_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_vitals.md"), "BP 120/80").unwrap();
        std::fs::write(dir.path().join("a_intake.md"), "Chief complaint").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "skip").unwrap();

        let chunks = process_folder(dir.path(), Some("7"), &ChunkOptions::default()).unwrap();

        let sources: Vec<&str> = chunks.iter().map(|c| c.source_file.as_str()).collect();
        assert_eq!(sources, vec!["a_intake.md", "b_vitals.md"]);
        assert!(chunks.iter().all(|c| c.patient_id == "7"));
    }

    #[test]
    fn missing_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(process_folder(&dir.path().join("nope"), None, &ChunkOptions::default()).is_err());
    }
}
