use crate::error::{EmbeddingError, Result};
use fastembed::{RerankInitOptions, RerankerModel, TextRerank};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Supported cross-encoder reranking models
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum RerankModelType {
    /// BAAI bge-reranker-base
    BgeRerankerBase,
    /// Jina reranker v1 turbo (English)
    JinaRerankerV1TurboEn,
}

impl RerankModelType {
    fn to_fastembed_model(self) -> RerankerModel {
        match self {
            RerankModelType::BgeRerankerBase => RerankerModel::BGERerankerBase,
            RerankModelType::JinaRerankerV1TurboEn => RerankerModel::JINARerankerV1TurboEn,
        }
    }
}

/// Configuration for the cross-encoder service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankModelConfig {
    pub model: RerankModelType,
    pub batch_size: usize,
    pub show_download_progress: bool,
}

impl Default for RerankModelConfig {
    fn default() -> Self {
        Self {
            model: RerankModelType::BgeRerankerBase,
            batch_size: 16,
            show_download_progress: false,
        }
    }
}

/// Joint query-document encoder producing unbounded relevance logits.
///
/// Only the relative order of scores for one query is meaningful.
pub struct RerankService {
    model: TextRerank,
    config: RerankModelConfig,
}

impl RerankService {
    pub async fn new() -> Result<Self> {
        Self::with_config(RerankModelConfig::default()).await
    }

    pub async fn with_config(config: RerankModelConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(EmbeddingError::InvalidInput(
                "batch_size must be > 0".to_string(),
            ));
        }

        info!("Initializing cross-encoder with model {:?}", config.model);

        let init_options = RerankInitOptions::new(config.model.to_fastembed_model())
            .with_show_download_progress(config.show_download_progress);
        let model = TextRerank::try_new(init_options)
            .map_err(|e| EmbeddingError::ModelInitialization(e.to_string()))?;

        Ok(Self { model, config })
    }

    /// Score each document against `query`, returning scores in input order.
    pub fn score_pairs(&self, query: &str, documents: &[&str]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Cross-encoding {} documents", documents.len());

        let ranked = self
            .model
            .rerank(query, documents.to_vec(), false, Some(self.config.batch_size))
            .map_err(|e| EmbeddingError::Scoring(e.to_string()))?;

        // fastembed returns results sorted by score; map them back to input order.
        let mut scores = vec![None; documents.len()];
        for result in ranked {
            if let Some(slot) = scores.get_mut(result.index) {
                *slot = Some(result.score);
            }
        }
        scores
            .into_iter()
            .enumerate()
            .map(|(idx, score)| {
                score.ok_or_else(|| {
                    EmbeddingError::Scoring(format!("no score returned for document {idx}"))
                })
            })
            .collect()
    }

    pub fn config(&self) -> &RerankModelConfig {
        &self.config
    }
}
