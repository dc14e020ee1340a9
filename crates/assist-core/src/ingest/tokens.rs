//! Token counting for ingestion budgeting
//!
//! Counts use the cl100k_base encoding, the same vocabulary the embedding
//! model was trained against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use tiktoken_rs::CoreBPE;
use tracing::{info, warn};

use super::documents::markdown_files;

static CL100K: LazyLock<CoreBPE> =
    LazyLock::new(|| tiktoken_rs::cl100k_base().expect("embedded cl100k_base vocabulary"));

/// cl100k_base token count of `text`
pub fn count_tokens(text: &str) -> usize {
    CL100K.encode_with_special_tokens(text).len()
}

/// Token count of every markdown file directly inside `folder`.
///
/// Unreadable files are logged and skipped.
pub fn count_tokens_in_folder(folder: &Path) -> Result<BTreeMap<PathBuf, usize>> {
    let files = markdown_files(folder)?;
    info!(folder = %folder.display(), files = files.len(), "Counting tokens");

    let mut counts = BTreeMap::new();
    for path in files {
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                counts.insert(path, count_tokens(&content));
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to read file"),
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_match_cl100k() {
        assert_eq!(count_tokens(""), 0);
        assert_eq!(count_tokens("Hello, how are you?"), 6);
        assert_eq!(count_tokens("50000"), 2);
    }

    #[test]
    fn non_latin_text_is_not_undercounted() {
        assert_eq!(count_tokens("你好世界，这是一个测试。"), 11);
    }

    #[test]
    fn long_clinical_words_split_into_subwords() {
        assert_eq!(
            count_tokens("Hyperlipidemia antidisestablishmentarianism echocardiogram"),
            14
        );
    }

    #[test]
    fn folder_counts_only_markdown() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_intake.md"), "Chief complaint: cough").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let counts = count_tokens_in_folder(dir.path()).unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(
            counts.values().next().copied(),
            Some(count_tokens("Chief complaint: cough"))
        );
    }
}
