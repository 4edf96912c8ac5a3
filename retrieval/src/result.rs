use crate::document::{Document, DocumentId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One scorer's score for one document.
///
/// Raw scores come straight from a scorer; after normalization the same
/// shape carries a value in [0, 1] where higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: DocumentId,
    /// Position of the document in its corpus
    pub index: usize,
    pub score: f32,
}

impl ScoredCandidate {
    pub fn new(id: DocumentId, index: usize, score: f32) -> Self {
        Self { id, index, score }
    }
}

/// Document with its combined fusion score and rank (0 = best)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedCandidate {
    pub id: DocumentId,
    pub score: f32,
    pub rank: usize,
}

/// Document after the reranking stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankedCandidate {
    pub document: Arc<Document>,
    /// Judge score; `None` when the judge timed out or was unavailable
    pub judge_score: Option<f32>,
    /// Position in the candidate list handed to the reranker
    pub pre_rerank_rank: usize,
    /// Final position (0 = best)
    pub rank: usize,
}

/// A fail-soft path taken while producing a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// A scorer returned no score for some documents; they counted as 0
    MissingScores { scorer: String, missing: usize },
    /// Judge output was not a number; the document was scored 0
    JudgeParseFailure { document: DocumentId, raw: String },
    /// Judge call timed out; the document kept its pre-rerank position
    JudgeTimeout { document: DocumentId, timeout_ms: u64 },
    /// Judge call failed; the document kept its pre-rerank position
    JudgeUnavailable { document: DocumentId, reason: String },
}

/// Stage that produced a result's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchSource {
    /// Combined lexical and vector score
    Fused,
    /// Relevance judge score
    Reranked,
}

/// A single search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub document: Arc<Document>,

    /// Fused score in [0, 1] or judge score, depending on `source`
    pub score: f32,

    pub source: SearchSource,

    /// Rank in the result list (0 = best)
    pub rank: usize,
}

impl SearchResult {
    pub fn new(document: Arc<Document>, score: f32, source: SearchSource) -> Self {
        Self {
            document,
            score,
            source,
            rank: 0,
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }
}

/// Ranked results of one retrieval with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Query text that produced these results
    pub query: String,

    pub results: Vec<SearchResult>,

    /// Number of documents scored by the broad retrieval stage
    pub total_candidates: usize,

    pub stats: SearchStats,

    /// Every fail-soft path taken for this query
    pub degradations: Vec<Degradation>,
}

/// Search performance statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub total_time_ms: u64,
    pub lexical_time_ms: u64,
    pub vector_time_ms: u64,
    pub fusion_time_ms: u64,
    pub rerank_time_ms: u64,

    /// Candidates handed to the reranker
    pub rerank_candidates: usize,
    /// Candidates the judge scored (parse failures included)
    pub judged: usize,
    /// Candidates whose judge call timed out or failed
    pub judge_failures: usize,

    /// Lexical index reused from cache
    pub cache_hit: bool,
}

impl SearchResults {
    pub fn new(query: String) -> Self {
        Self {
            query,
            results: Vec::new(),
            total_candidates: 0,
            stats: SearchStats::default(),
            degradations: Vec::new(),
        }
    }

    pub fn with_results(mut self, results: Vec<SearchResult>) -> Self {
        self.results = results;
        self
    }

    pub fn with_total_candidates(mut self, count: usize) -> Self {
        self.total_candidates = count;
        self
    }

    pub fn with_stats(mut self, stats: SearchStats) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_degradations(mut self, degradations: Vec<Degradation>) -> Self {
        self.degradations = degradations;
        self
    }

    /// Get top N results
    pub fn top(&self, n: usize) -> &[SearchResult] {
        &self.results[..n.min(self.results.len())]
    }

    /// Ranked documents, best first
    pub fn documents(&self) -> impl Iterator<Item = &Arc<Document>> {
        self.results.iter().map(|r| &r.document)
    }

    pub fn ids(&self) -> Vec<DocumentId> {
        self.results.iter().map(|r| r.document.id.clone()).collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}
