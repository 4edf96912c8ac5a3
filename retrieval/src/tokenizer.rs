//! Pluggable text tokenization for lexical scoring.

use crate::config::TokenizerConfig;
use std::collections::HashSet;
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "what", "which", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Splits text into terms. Must be deterministic.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Lowercases and splits on non-alphanumeric characters.
#[derive(Debug, Clone, Default)]
pub struct SimpleTokenizer {
    config: TokenizerConfig,
}

impl SimpleTokenizer {
    pub fn new(config: TokenizerConfig) -> Self {
        Self { config }
    }

    fn keep(&self, token: &str) -> bool {
        token.chars().count() >= self.config.min_token_len
            && !(self.config.remove_stop_words && STOP_WORDS.contains(token))
    }
}

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty() && self.keep(token))
            .map(str::to_string)
            .collect()
    }
}

/// Splits on whitespace only, preserving case and punctuation.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}
