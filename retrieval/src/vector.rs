//! Dense vector scoring over corpus embeddings.

use crate::document::Corpus;
use crate::error::{Result, RetrievalError};
use crate::normalize::ScoreDirection;
use crate::result::ScoredCandidate;
use serde::{Deserialize, Serialize};

/// Metric the corpus embeddings are compared with.
///
/// One scorer uses exactly one metric; the corpus must have been embedded
/// for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorMetric {
    /// Cosine similarity in [-1, 1]
    #[default]
    Cosine,
    /// L2 distance
    Euclidean,
    /// Raw inner product
    DotProduct,
}

impl VectorMetric {
    pub fn direction(self) -> ScoreDirection {
        match self {
            VectorMetric::Cosine | VectorMetric::DotProduct => ScoreDirection::HigherIsBetter,
            VectorMetric::Euclidean => ScoreDirection::LowerIsBetter,
        }
    }

    pub fn compute(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Euclidean => euclidean_distance(a, b),
            VectorMetric::DotProduct => dot(a, b),
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot(a, b) / (mag_a * mag_b)
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Scores a query embedding against every corpus embedding
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorScorer {
    metric: VectorMetric,
}

impl VectorScorer {
    pub fn new(metric: VectorMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> VectorMetric {
        self.metric
    }

    /// Direction of the raw scores this scorer returns
    pub fn direction(&self) -> ScoreDirection {
        self.metric.direction()
    }

    fn check_dimension(query: &[f32], corpus: &Corpus) -> Result<()> {
        if !corpus.is_empty() && query.len() != corpus.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: corpus.dimension(),
                actual: query.len(),
            });
        }
        Ok(())
    }

    /// Raw score for every document, in corpus order
    pub fn score_all(&self, query: &[f32], corpus: &Corpus) -> Result<Vec<ScoredCandidate>> {
        Self::check_dimension(query, corpus)?;

        Ok(corpus
            .documents()
            .iter()
            .zip(corpus.embeddings())
            .enumerate()
            .map(|(idx, (doc, embedding))| {
                ScoredCandidate::new(doc.id.clone(), idx, self.metric.compute(query, embedding))
            })
            .collect())
    }

    /// The `k` most relevant documents, best first, ties in corpus order
    pub fn nearest(&self, query: &[f32], corpus: &Corpus, k: usize) -> Result<Vec<ScoredCandidate>> {
        let mut scored = self.score_all(query, corpus)?;
        match self.direction() {
            ScoreDirection::HigherIsBetter => scored.sort_by(|a, b| b.score.total_cmp(&a.score)),
            ScoreDirection::LowerIsBetter => scored.sort_by(|a, b| a.score.total_cmp(&b.score)),
        }
        scored.truncate(k);
        Ok(scored)
    }
}
