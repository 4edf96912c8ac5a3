use crate::config::{RetrievalConfig, validate_k, validate_weight};
use crate::document::{Corpus, Document, DocumentId, EmbeddingVector, Query};
use crate::error::{Result, RetrievalError};
use crate::fusion::{FusionEngine, ScoreSets};
use crate::judge::RelevanceJudge;
use crate::lexical::{Bm25Index, Bm25Scorer};
use crate::normalize::{ScoreDirection, normalize};
use crate::rerank::RerankEngine;
use crate::result::{ScoredCandidate, SearchResult, SearchResults, SearchSource, SearchStats};
use crate::rewrite::QueryTransform;
use crate::tokenizer::{SimpleTokenizer, Tokenizer};
use crate::vector::VectorScorer;
use log::{debug, info};
use lru::LruCache;
use ragfuse_embeddings::EmbeddingProvider;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Scorer names used as fusion keys
pub const LEXICAL_SCORER: &str = "lexical";
pub const VECTOR_SCORER: &str = "vector";

/// Per-call values after applying query overrides to the configuration
#[derive(Debug, Clone, Copy)]
struct ResolvedParams {
    alpha: f32,
    initial_k: usize,
    final_k: usize,
}

struct LexicalOutcome {
    index: Arc<Bm25Index>,
    scores: Vec<ScoredCandidate>,
    elapsed_ms: u64,
}

/// Hybrid retrieval engine combining BM25 and vector similarity
pub struct HybridRetrieval {
    config: RetrievalConfig,
    lexical: Bm25Scorer,
    vector: VectorScorer,
    fusion_engine: FusionEngine,
    rerank_engine: RerankEngine,
    judge: Option<Arc<dyn RelevanceJudge>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    rewriter: Option<Arc<dyn QueryTransform>>,
    index_cache: Arc<RwLock<LruCache<u64, Arc<Bm25Index>>>>,
}

impl HybridRetrieval {
    /// Create new hybrid retrieval engine
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "Initializing hybrid retrieval ({:?} fusion, alpha {}, rerank {})",
            config.fusion_strategy, config.fusion_weight, config.rerank_enabled
        );

        let tokenizer: Arc<dyn Tokenizer> = Arc::new(SimpleTokenizer::new(config.tokenizer.clone()));
        let capacity = NonZeroUsize::new(config.cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            lexical: Bm25Scorer::new(config.bm25, tokenizer),
            vector: VectorScorer::new(config.vector_metric),
            fusion_engine: FusionEngine::from_config(&config),
            rerank_engine: RerankEngine::new(config.rerank.clone()),
            judge: None,
            embedder: None,
            rewriter: None,
            index_cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            config,
        })
    }

    /// Judge used when reranking is enabled
    pub fn with_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Provider that embeds queries arriving without an embedding
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Replace the configured tokenizer; cached indexes are dropped
    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.lexical = Bm25Scorer::new(self.config.bm25, tokenizer);
        let capacity = NonZeroUsize::new(self.config.cache_size).unwrap_or(NonZeroUsize::MIN);
        self.index_cache = Arc::new(RwLock::new(LruCache::new(capacity)));
        self
    }

    /// Rewrite query text before scoring. The judge still sees the original.
    pub fn with_rewriter(mut self, rewriter: Arc<dyn QueryTransform>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub async fn retrieve(&self, query: &Query, corpus: &Arc<Corpus>) -> Result<SearchResults> {
        self.retrieve_with_cancel(query, corpus, &CancellationToken::new())
            .await
    }

    /// Retrieve the best documents for `query`.
    ///
    /// Configuration errors are raised before any scoring. The query can be
    /// abandoned between stages through `cancel`; outstanding judge calls are
    /// aborted.
    pub async fn retrieve_with_cancel(
        &self,
        query: &Query,
        corpus: &Arc<Corpus>,
        cancel: &CancellationToken,
    ) -> Result<SearchResults> {
        let start = Instant::now();
        let params = self.resolve(query)?;
        let judge = if self.config.rerank_enabled {
            Some(self.judge.clone().ok_or_else(|| {
                RetrievalError::InvalidConfig(
                    "rerank_enabled is set but no relevance judge is configured".to_string(),
                )
            })?)
        } else {
            None
        };

        debug!("Hybrid retrieval for: '{}'", query.text);

        if corpus.is_empty() {
            debug!("Empty corpus, returning no results");
            return Ok(SearchResults::new(query.text.clone()));
        }

        let scoring_text = match &self.rewriter {
            Some(rewriter) => rewriter.transform(&query.text).await.text,
            None => query.text.clone(),
        };
        let query_embedding = self.query_embedding(query, &scoring_text).await?;
        if query_embedding.len() != corpus.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                expected: corpus.dimension(),
                actual: query_embedding.len(),
            });
        }

        let mut stats = SearchStats::default();
        let mut degradations = Vec::new();

        // Stage 1: lexical and vector scoring, joined before normalization
        Self::check_cancel(cancel, "scoring")?;
        let cached_index = self.cached_index(corpus).await;
        stats.cache_hit = cached_index.is_some();

        let lexical_task = {
            let scorer = self.lexical.clone();
            let corpus = corpus.clone();
            let tokens = scorer.tokenize(&scoring_text);
            tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                let index = cached_index.unwrap_or_else(|| Arc::new(scorer.build_index(&corpus)));
                let scores = scorer.score_with_index(&tokens, &corpus, &index);
                LexicalOutcome {
                    index,
                    scores,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }
            })
        };
        let vector_task = {
            let scorer = self.vector;
            let corpus = corpus.clone();
            tokio::task::spawn_blocking(move || {
                let started = Instant::now();
                scorer
                    .score_all(&query_embedding, &corpus)
                    .map(|scores| (scores, started.elapsed().as_millis() as u64))
            })
        };

        let (lexical, vector) = tokio::try_join!(lexical_task, vector_task)
            .map_err(|e| RetrievalError::Task(e.to_string()))?;
        let (vector_scores, vector_time_ms) = vector?;

        stats.lexical_time_ms = lexical.elapsed_ms;
        stats.vector_time_ms = vector_time_ms;
        if !stats.cache_hit {
            self.store_index(corpus, lexical.index).await;
        }
        debug!(
            "Scored {} documents lexically and {} by vector",
            lexical.scores.len(),
            vector_scores.len()
        );

        // Stage 2: normalization and fusion
        Self::check_cancel(cancel, "fusion")?;
        let fusion_start = Instant::now();
        let epsilon = self.config.normalization_epsilon;
        let mut score_sets = ScoreSets::new();
        score_sets.insert(
            LEXICAL_SCORER.to_string(),
            Self::normalized(&lexical.scores, ScoreDirection::HigherIsBetter, epsilon),
        );
        score_sets.insert(
            VECTOR_SCORER.to_string(),
            Self::normalized(&vector_scores, self.vector.direction(), epsilon),
        );
        let weights = HashMap::from([
            (VECTOR_SCORER.to_string(), params.alpha),
            (LEXICAL_SCORER.to_string(), 1.0 - params.alpha),
        ]);

        let fused = self.fusion_engine.fuse(&corpus.ids(), &score_sets, &weights)?;
        degradations.extend(fused.degradations);
        stats.fusion_time_ms = fusion_start.elapsed().as_millis() as u64;
        debug!("Fusion ranked {} documents", fused.candidates.len());

        let by_id: HashMap<&DocumentId, &Arc<Document>> =
            corpus.documents().iter().map(|doc| (&doc.id, doc)).collect();
        let fused_scores: HashMap<&DocumentId, f32> =
            fused.candidates.iter().map(|c| (&c.id, c.score)).collect();

        // Stage 3: optional reranking of the shortlist
        let results: Vec<SearchResult> = match judge {
            Some(judge) => {
                Self::check_cancel(cancel, "reranking")?;
                let rerank_start = Instant::now();
                let shortlist: Vec<Arc<Document>> = fused
                    .candidates
                    .iter()
                    .take(params.initial_k)
                    .filter_map(|c| by_id.get(&c.id).copied().cloned())
                    .collect();
                stats.rerank_candidates = shortlist.len();

                let reranked = self
                    .rerank_engine
                    .rerank(query, shortlist, judge, params.final_k, cancel)
                    .await?;
                stats.rerank_time_ms = rerank_start.elapsed().as_millis() as u64;
                stats.judged = reranked.judged;
                stats.judge_failures = reranked.failed;
                degradations.extend(reranked.degradations);

                reranked
                    .candidates
                    .into_iter()
                    .map(|c| {
                        let result = match c.judge_score {
                            Some(score) => SearchResult::new(c.document, score, SearchSource::Reranked),
                            None => {
                                let score = fused_scores.get(&c.document.id).copied().unwrap_or(0.0);
                                SearchResult::new(c.document, score, SearchSource::Fused)
                            }
                        };
                        result.with_rank(c.rank)
                    })
                    .collect()
            }
            None => fused
                .candidates
                .iter()
                .take(params.final_k)
                .filter_map(|c| {
                    by_id.get(&c.id).map(|doc| {
                        SearchResult::new(Arc::clone(doc), c.score, SearchSource::Fused).with_rank(c.rank)
                    })
                })
                .collect(),
        };

        stats.total_time_ms = start.elapsed().as_millis() as u64;

        let results = SearchResults::new(query.text.clone())
            .with_results(results)
            .with_total_candidates(corpus.len())
            .with_stats(stats)
            .with_degradations(degradations);

        info!(
            "Retrieval completed in {}ms, returned {} results ({} degradations)",
            results.stats.total_time_ms,
            results.len(),
            results.degradations.len()
        );

        Ok(results)
    }

    fn resolve(&self, query: &Query) -> Result<ResolvedParams> {
        let alpha = query.params.fusion_weight.unwrap_or(self.config.fusion_weight);
        let initial_k = query.params.initial_k.unwrap_or(self.config.initial_k);
        let final_k = query.params.final_k.unwrap_or(self.config.final_k);

        validate_weight("fusion_weight", alpha)?;
        validate_k("initial_k", initial_k)?;
        validate_k("final_k", final_k)?;

        Ok(ResolvedParams {
            alpha,
            initial_k,
            final_k,
        })
    }

    async fn query_embedding(&self, query: &Query, text: &str) -> Result<EmbeddingVector> {
        if let Some(embedding) = &query.embedding {
            return Ok(embedding.clone());
        }
        let embedder = self
            .embedder
            .as_ref()
            .ok_or(RetrievalError::MissingQueryEmbedding)?;
        Ok(embedder.embed_single(text).await?)
    }

    fn check_cancel(cancel: &CancellationToken, stage: &'static str) -> Result<()> {
        if cancel.is_cancelled() {
            debug!("Retrieval cancelled before {stage}");
            return Err(RetrievalError::Cancelled { stage });
        }
        Ok(())
    }

    /// Non-finite raw scores are left out so fusion reports them as missing.
    fn normalized(
        scores: &[ScoredCandidate],
        direction: ScoreDirection,
        epsilon: f32,
    ) -> HashMap<DocumentId, f32> {
        let usable: Vec<&ScoredCandidate> =
            scores.iter().filter(|c| c.score.is_finite()).collect();
        let raw: Vec<f32> = usable.iter().map(|c| c.score).collect();
        usable
            .into_iter()
            .zip(normalize(&raw, direction, epsilon))
            .map(|(c, norm)| (c.id.clone(), norm))
            .collect()
    }

    async fn cached_index(&self, corpus: &Corpus) -> Option<Arc<Bm25Index>> {
        if !self.config.enable_cache {
            return None;
        }
        let mut cache = self.index_cache.write().await;
        let hit = cache.get(&corpus.fingerprint()).cloned();
        if hit.is_some() {
            debug!("BM25 index cache hit for corpus {:016x}", corpus.fingerprint());
        }
        hit
    }

    async fn store_index(&self, corpus: &Corpus, index: Arc<Bm25Index>) {
        if self.config.enable_cache {
            let mut cache = self.index_cache.write().await;
            cache.put(corpus.fingerprint(), index);
        }
    }

    /// Clear the BM25 index cache
    pub async fn clear_cache(&self) {
        let mut cache = self.index_cache.write().await;
        cache.clear();
        info!("Index cache cleared");
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> CacheStats {
        let cache = self.index_cache.read().await;
        CacheStats {
            size: cache.len(),
            capacity: cache.cap().get(),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
}
