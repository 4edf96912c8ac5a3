use crate::error::{Result, RetrievalError};
use crate::vector::VectorMetric;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Strategy for combining normalized scorer outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// Weighted sum of min-max normalized scores
    #[default]
    WeightedScore,
    /// Reciprocal Rank Fusion over each scorer's ranking
    ReciprocalRank,
}

/// Okapi BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Config {
    /// Term-frequency saturation (typical 1.2 - 2.0)
    #[serde(default = "default_k1")]
    pub k1: f32,
    /// Length normalization strength (typical 0.75)
    #[serde(default = "default_b")]
    pub b: f32,
}

fn default_k1() -> f32 {
    1.5
}

fn default_b() -> f32 {
    0.75
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

/// Options for the default tokenizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub remove_stop_words: bool,
    #[serde(default = "default_min_token_len")]
    pub min_token_len: usize,
}

fn default_min_token_len() -> usize {
    1
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            remove_stop_words: false,
            min_token_len: default_min_token_len(),
        }
    }
}

/// Reranking stage limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Maximum judge calls in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Timeout applied to each judge call independently
    #[serde(default = "default_judge_timeout_ms")]
    pub judge_timeout_ms: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_judge_timeout_ms() -> u64 {
    30_000
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            judge_timeout_ms: default_judge_timeout_ms(),
        }
    }
}

impl RerankConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(RetrievalError::InvalidK {
                name: "max_concurrency",
                value: 0,
            });
        }
        if self.judge_timeout_ms == 0 {
            return Err(RetrievalError::InvalidConfig(
                "judge_timeout_ms must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for hybrid retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Fusion strategy for combining scorer outputs
    #[serde(default)]
    pub fusion_strategy: FusionStrategy,

    /// α: weight of the vector score; the lexical score gets 1 - α
    #[serde(default = "default_fusion_weight")]
    pub fusion_weight: f32,

    /// Number of fused candidates handed to the reranker
    #[serde(default = "default_initial_k")]
    pub initial_k: usize,

    /// Number of documents returned to the caller
    #[serde(default = "default_final_k")]
    pub final_k: usize,

    /// Apply the pairwise reranker after fusion
    #[serde(default)]
    pub rerank_enabled: bool,

    /// Metric the corpus embeddings were produced for
    #[serde(default)]
    pub vector_metric: VectorMetric,

    /// Guard added to the min-max denominator
    #[serde(default = "default_normalization_epsilon")]
    pub normalization_epsilon: f32,

    /// RRF constant k (higher = less emphasis on top results)
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,

    #[serde(default)]
    pub bm25: Bm25Config,

    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    #[serde(default)]
    pub rerank: RerankConfig,

    /// Cache lexical indexes per corpus
    #[serde(default = "default_true")]
    pub enable_cache: bool,

    /// Number of corpora whose lexical index is kept
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
}

fn default_fusion_weight() -> f32 {
    0.5
}

fn default_initial_k() -> usize {
    20
}

fn default_final_k() -> usize {
    5
}

fn default_normalization_epsilon() -> f32 {
    1e-8
}

fn default_rrf_k() -> f32 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_cache_size() -> usize {
    16
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            fusion_strategy: FusionStrategy::default(),
            fusion_weight: default_fusion_weight(),
            initial_k: default_initial_k(),
            final_k: default_final_k(),
            rerank_enabled: false,
            vector_metric: VectorMetric::default(),
            normalization_epsilon: default_normalization_epsilon(),
            rrf_k: default_rrf_k(),
            bm25: Bm25Config::default(),
            tokenizer: TokenizerConfig::default(),
            rerank: RerankConfig::default(),
            enable_cache: true,
            cache_size: default_cache_size(),
        }
    }
}

/// Check that a fusion weight is a finite value in [0, 1].
pub(crate) fn validate_weight(name: &str, value: f32) -> Result<()> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(RetrievalError::InvalidWeight {
            name: name.to_string(),
            value,
        });
    }
    Ok(())
}

pub(crate) fn validate_k(name: &'static str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(RetrievalError::InvalidK { name, value });
    }
    Ok(())
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_weight("fusion_weight", self.fusion_weight)?;
        validate_k("initial_k", self.initial_k)?;
        validate_k("final_k", self.final_k)?;

        if !(self.normalization_epsilon > 0.0 && self.normalization_epsilon.is_finite()) {
            return Err(RetrievalError::InvalidConfig(format!(
                "normalization_epsilon must be > 0, got {}",
                self.normalization_epsilon
            )));
        }

        if !(self.rrf_k > 0.0 && self.rrf_k.is_finite()) {
            return Err(RetrievalError::InvalidConfig(format!(
                "rrf_k must be > 0, got {}",
                self.rrf_k
            )));
        }

        if !(self.bm25.k1 >= 0.0 && self.bm25.k1.is_finite()) {
            return Err(RetrievalError::InvalidConfig(format!(
                "bm25.k1 must be >= 0, got {}",
                self.bm25.k1
            )));
        }

        if !(0.0..=1.0).contains(&self.bm25.b) {
            return Err(RetrievalError::InvalidConfig(format!(
                "bm25.b must be in [0.0, 1.0], got {}",
                self.bm25.b
            )));
        }

        if self.enable_cache {
            validate_k("cache_size", self.cache_size)?;
        }

        self.rerank.validate()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RetrievalError::InvalidConfig(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RetrievalError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Create config optimized for speed: fusion only
    pub fn fast() -> Self {
        Self {
            rerank_enabled: false,
            initial_k: 10,
            final_k: 5,
            ..Default::default()
        }
    }

    /// Create config optimized for accuracy: wide shortlist, reranked
    pub fn accurate() -> Self {
        Self {
            rerank_enabled: true,
            initial_k: 30,
            final_k: 5,
            ..Default::default()
        }
    }

    /// Create config that leans on exact term overlap
    pub fn lexical_heavy() -> Self {
        Self {
            fusion_weight: 0.3,
            tokenizer: TokenizerConfig {
                remove_stop_words: true,
                min_token_len: 2,
            },
            ..Default::default()
        }
    }
}
