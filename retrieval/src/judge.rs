//! Relevance judges for the reranking stage.
//!
//! A judge scores one (query, document) pair. Two variants exist: a
//! cross-encoder with unbounded logits and an LLM asked for a rating on a
//! fixed scale. The reranker only relies on the relative order of scores.

use crate::document::{Document, Query};
use async_trait::async_trait;
use log::debug;
use ragfuse_embeddings::RerankService;
use ragfuse_llm::LlmClient;
use regex_lite::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;

/// Why a single judge call produced no usable score
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgeError {
    #[error("Judge output is not a number: {raw:?}")]
    Parse { raw: String },

    #[error("Judge call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Judge unavailable: {0}")]
    Unavailable(String),
}

/// Scores the relevance of one document to a query.
///
/// Calls for different documents are independent and may run concurrently.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    async fn score(&self, query: &Query, document: &Document) -> Result<f32, JudgeError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Synchronous joint query-document encoder.
pub trait CrossEncoderModel: Send + Sync {
    fn score_pairs(&self, query: &str, documents: &[&str]) -> ragfuse_embeddings::Result<Vec<f32>>;
}

impl CrossEncoderModel for RerankService {
    fn score_pairs(&self, query: &str, documents: &[&str]) -> ragfuse_embeddings::Result<Vec<f32>> {
        RerankService::score_pairs(self, query, documents)
    }
}

/// Judge backed by a cross-encoder model; inference runs on a blocking thread.
pub struct CrossEncoderJudge {
    model: Arc<dyn CrossEncoderModel>,
}

impl CrossEncoderJudge {
    pub fn new(model: Arc<dyn CrossEncoderModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl RelevanceJudge for CrossEncoderJudge {
    async fn score(&self, query: &Query, document: &Document) -> Result<f32, JudgeError> {
        let model = Arc::clone(&self.model);
        let query_text = query.text.clone();
        let document_text = document.text.clone();

        let scores = tokio::task::spawn_blocking(move || {
            model.score_pairs(&query_text, &[document_text.as_str()])
        })
        .await
        .map_err(|e| JudgeError::Unavailable(format!("cross-encoder task failed: {e}")))?
        .map_err(|e| JudgeError::Unavailable(e.to_string()))?;

        match scores.first() {
            Some(score) if score.is_finite() => Ok(*score),
            Some(score) => Err(JudgeError::Parse {
                raw: score.to_string(),
            }),
            None => Err(JudgeError::Unavailable(
                "cross-encoder returned no score".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "cross_encoder"
    }
}

/// Default prompt for [`LlmJudge`]; `{query}` and `{document}` are substituted.
pub const DEFAULT_JUDGE_PROMPT: &str = "On a scale of 1-10, rate the relevance of the following document to the query. \
Consider the specific context and intent of the query, not just keyword matches.\n\
Query: {query}\n\
Document: {document}\n\
Respond with a single number.\n\
Relevance Score:";

/// Judge that asks a language model for a numeric relevance rating.
///
/// The first number in the response is taken and clamped to the rating
/// scale. A response without a number is a [`JudgeError::Parse`].
pub struct LlmJudge {
    client: Arc<dyn LlmClient>,
    template: String,
    min_score: f32,
    max_score: f32,
}

impl LlmJudge {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            template: DEFAULT_JUDGE_PROMPT.to_string(),
            min_score: 1.0,
            max_score: 10.0,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Rating scale used for clamping; bounds are swapped if given reversed.
    pub fn with_scale(mut self, min: f32, max: f32) -> Self {
        self.min_score = min.min(max);
        self.max_score = min.max(max);
        self
    }

    pub fn prompt(&self, query: &Query, document: &Document) -> String {
        self.template
            .replace("{query}", &query.text)
            .replace("{document}", &document.text)
    }

    /// Extract a rating from a raw model response.
    pub fn parse_score(&self, raw: &str) -> Result<f32, JudgeError> {
        let trimmed = raw.trim();
        let value = trimmed.parse::<f32>().ok().or_else(|| {
            NUMBER
                .as_ref()
                .and_then(|re| re.find(trimmed))
                .and_then(|m| m.as_str().parse::<f32>().ok())
        });

        match value {
            Some(v) if v.is_finite() => Ok(v.clamp(self.min_score, self.max_score)),
            _ => Err(JudgeError::Parse {
                raw: raw.to_string(),
            }),
        }
    }
}

static NUMBER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").ok());

#[async_trait]
impl RelevanceJudge for LlmJudge {
    async fn score(&self, query: &Query, document: &Document) -> Result<f32, JudgeError> {
        let prompt = self.prompt(query, document);
        let response = self
            .client
            .complete(&prompt)
            .await
            .map_err(|e| JudgeError::Unavailable(e.to_string()))?;

        debug!("LLM judge replied {response:?} for document {}", document.id);
        self.parse_score(&response)
    }

    fn name(&self) -> &str {
        "llm"
    }
}
