//! Token counting used for prompt budgeting

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tracing::{info, warn};
use unicode_segmentation::UnicodeSegmentation;

/// Counts tokens for budgeting purposes.
///
/// Counts only need to be stable and roughly proportional to what the model sees;
/// they never affect the content of a prompt beyond where packing stops.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Counts Unicode word-boundary segments, ignoring pure whitespace.
///
/// Punctuation and symbols count as their own tokens, which keeps the estimate
/// close to BPE tokenizers on table-formatted report text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenCounter;

impl WordTokenCounter {
    pub fn new() -> Self {
        Self
    }
}

impl TokenCounter for WordTokenCounter {
    fn count(&self, text: &str) -> usize {
        text.split_word_bounds()
            .filter(|segment| !segment.chars().all(char::is_whitespace))
            .count()
    }
}

/// Counts tokens with a HuggingFace tokenizer loaded from `tokenizer.json`.
///
/// Text the tokenizer rejects is counted by word boundaries instead.
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file(tokenizer_path: &Path) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            Error::config(format!(
                "Failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;
        Ok(Self { tokenizer })
    }
}

impl TokenCounter for HfTokenCounter {
    fn count(&self, text: &str) -> usize {
        match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding.len(),
            Err(e) => {
                warn!(error = %e, "Tokenizer failed to encode text, using word count");
                WordTokenCounter.count(text)
            }
        }
    }
}

/// Build the counter selected by `search.tokenizer_path`
pub fn create_token_counter(config: &SearchConfig) -> Result<Arc<dyn TokenCounter>> {
    match &config.tokenizer_path {
        Some(path) => {
            let counter = HfTokenCounter::from_file(path)?;
            info!("Counting tokens with tokenizer at {}", path.display());
            Ok(Arc::new(counter))
        }
        None => Ok(Arc::new(WordTokenCounter::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Character-level BPE: every character outside the vocabulary is its own [UNK] token
    const CHAR_TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "BPE",
            "dropout": null,
            "unk_token": "[UNK]",
            "continuing_subword_prefix": null,
            "end_of_word_suffix": null,
            "fuse_unk": false,
            "byte_fallback": false,
            "ignore_merges": false,
            "vocab": {"[UNK]": 0, "a": 1, "b": 2},
            "merges": []
        }
    }"#;

    fn write_tokenizer(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, CHAR_TOKENIZER_JSON).expect("write tokenizer");
        path
    }

    #[test]
    fn test_counts_words_and_punctuation() {
        let counter = WordTokenCounter::new();
        assert_eq!(counter.count("hello world"), 2);
        assert_eq!(counter.count("Importance Score: 10"), 4);
        assert_eq!(counter.count("a|b|c"), 5);
    }

    #[test]
    fn test_whitespace_only_is_zero() {
        let counter = WordTokenCounter::new();
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("  \n\t "), 0);
    }

    #[test]
    fn test_non_latin_text() {
        let counter = WordTokenCounter::new();
        assert_eq!(counter.count("Привет, мир"), 3);
    }

    #[test]
    fn test_hf_counter_counts_model_tokens() {
        let dir = TempDir::new().expect("tempdir");
        let counter = HfTokenCounter::from_file(&write_tokenizer(&dir)).expect("load tokenizer");

        let phrase = "Межрегиональное сотрудничество правоохранительных органов";
        let letters = phrase.chars().filter(|c| !c.is_whitespace()).count();
        assert_eq!(counter.count(phrase), letters);
        assert_eq!(WordTokenCounter::new().count(phrase), 4);
        assert_eq!(counter.count("ab ba"), 4);
    }

    #[test]
    fn test_missing_tokenizer_file_is_config_error() {
        let dir = TempDir::new().expect("tempdir");
        let config = SearchConfig {
            tokenizer_path: Some(dir.path().join("absent.json")),
            ..SearchConfig::default()
        };
        let err = create_token_counter(&config)
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_configured_tokenizer_is_used() {
        let dir = TempDir::new().expect("tempdir");
        let config = SearchConfig {
            tokenizer_path: Some(write_tokenizer(&dir)),
            ..SearchConfig::default()
        };
        let counter = create_token_counter(&config).expect("counter");
        assert_eq!(counter.count("органов"), 7);
    }

    #[test]
    fn test_unset_path_falls_back_to_word_count() {
        let counter = create_token_counter(&SearchConfig::default()).expect("counter");
        assert_eq!(counter.count("органов правоохранительных"), 2);
    }
}
