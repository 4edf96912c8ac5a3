use crate::config::{RerankConfig, validate_k};
use crate::document::{Document, Query};
use crate::error::{Result, RetrievalError};
use crate::fusion::rank_with_ties;
use crate::judge::{JudgeError, RelevanceJudge};
use crate::result::{Degradation, RerankedCandidate};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Reranked shortlist plus the fail-soft notes recorded while judging
#[derive(Debug, Clone, Default)]
pub struct RerankOutput {
    pub candidates: Vec<RerankedCandidate>,
    pub degradations: Vec<Degradation>,
    /// Candidates that received a judge score (parse failures score 0)
    pub judged: usize,
    /// Candidates whose judge call timed out or failed
    pub failed: usize,
}

/// Reranking engine for refining a fused shortlist with a relevance judge
pub struct RerankEngine {
    config: RerankConfig,
}

impl Default for RerankEngine {
    fn default() -> Self {
        Self::new(RerankConfig::default())
    }
}

enum Verdict {
    Scored(f32),
    Fallback,
}

impl RerankEngine {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RerankConfig {
        &self.config
    }

    /// Rerank `candidates` (best first) and keep at most `top_k`.
    ///
    /// Every candidate is judged independently with at most
    /// `max_concurrency` calls in flight, each under its own timeout. A
    /// candidate whose judge call timed out or failed keeps its pre-rerank
    /// position; judged candidates fill the remaining positions by judge
    /// score, ties broken by pre-rerank order. Unparseable judge output
    /// scores 0. Cancelling `cancel` aborts outstanding judge calls.
    pub async fn rerank(
        &self,
        query: &Query,
        candidates: Vec<Arc<Document>>,
        judge: Arc<dyn RelevanceJudge>,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Result<RerankOutput> {
        validate_k("top_k", top_k)?;
        self.config.validate()?;

        if cancel.is_cancelled() {
            return Err(RetrievalError::Cancelled { stage: "reranking" });
        }

        let mut seen = HashSet::with_capacity(candidates.len());
        let candidates: Vec<Arc<Document>> = candidates
            .into_iter()
            .filter(|doc| seen.insert(doc.id.clone()))
            .collect();

        if candidates.is_empty() {
            return Ok(RerankOutput::default());
        }

        debug!(
            "Reranking {} candidates with {} judge (concurrency {})",
            candidates.len(),
            judge.name(),
            self.config.max_concurrency
        );

        let outcomes = self.judge_all(query, &candidates, judge, cancel).await?;
        Ok(Self::order(candidates, outcomes, top_k))
    }

    async fn judge_all(
        &self,
        query: &Query,
        candidates: &[Arc<Document>],
        judge: Arc<dyn RelevanceJudge>,
        cancel: &CancellationToken,
    ) -> Result<Vec<std::result::Result<f32, JudgeError>>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let timeout = Duration::from_millis(self.config.judge_timeout_ms);
        let query = Arc::new(query.clone());

        let tasks: Vec<JoinHandle<std::result::Result<f32, JudgeError>>> = candidates
            .iter()
            .map(|doc| {
                let semaphore = semaphore.clone();
                let judge = judge.clone();
                let query = query.clone();
                let doc = doc.clone();

                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        JudgeError::Unavailable(format!("Semaphore error: {e}"))
                    })?;

                    match tokio::time::timeout(timeout, judge.score(&query, &doc)).await {
                        Ok(outcome) => outcome,
                        Err(_) => Err(JudgeError::Timeout(timeout)),
                    }
                })
            })
            .collect();

        let abort_handles: Vec<_> = tasks.iter().map(JoinHandle::abort_handle).collect();
        let mut outcomes = Vec::with_capacity(tasks.len());

        for task in tasks {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    debug!("Reranking cancelled, aborted outstanding judge calls");
                    return Err(RetrievalError::Cancelled { stage: "reranking" });
                }
                joined = task => joined,
            };

            outcomes.push(joined.unwrap_or_else(|e| {
                Err(JudgeError::Unavailable(format!("judge task failed: {e}")))
            }));
        }

        Ok(outcomes)
    }

    fn order(
        candidates: Vec<Arc<Document>>,
        outcomes: Vec<std::result::Result<f32, JudgeError>>,
        top_k: usize,
    ) -> RerankOutput {
        let mut degradations = Vec::new();
        let mut verdicts = Vec::with_capacity(candidates.len());

        for (doc, outcome) in candidates.iter().zip(outcomes) {
            let verdict = match outcome {
                Ok(score) if score.is_finite() => Verdict::Scored(score),
                Ok(score) => {
                    warn!("Judge score for {} is not finite, scoring 0: {score}", doc.id);
                    degradations.push(Degradation::JudgeParseFailure {
                        document: doc.id.clone(),
                        raw: score.to_string(),
                    });
                    Verdict::Scored(0.0)
                }
                Err(JudgeError::Parse { raw }) => {
                    warn!("Judge output for {} is not a number, scoring 0: {raw:?}", doc.id);
                    degradations.push(Degradation::JudgeParseFailure {
                        document: doc.id.clone(),
                        raw,
                    });
                    Verdict::Scored(0.0)
                }
                Err(JudgeError::Timeout(elapsed)) => {
                    warn!("Judge timed out for {}, keeping pre-rerank position", doc.id);
                    degradations.push(Degradation::JudgeTimeout {
                        document: doc.id.clone(),
                        timeout_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                    });
                    Verdict::Fallback
                }
                Err(JudgeError::Unavailable(reason)) => {
                    warn!("Judge unavailable for {}: {reason}", doc.id);
                    degradations.push(Degradation::JudgeUnavailable {
                        document: doc.id.clone(),
                        reason,
                    });
                    Verdict::Fallback
                }
            };
            verdicts.push(verdict);
        }

        // Equal judge scores keep pre-rerank order.
        let judged = rank_with_ties(
            verdicts
                .iter()
                .enumerate()
                .filter_map(|(pos, v)| match v {
                    Verdict::Scored(score) => Some((pos, *score)),
                    Verdict::Fallback => None,
                })
                .collect(),
        );

        let judged_count = judged.len();
        let failed = candidates.len() - judged_count;

        // Fallback candidates pin their own slot; judged ones fill the gaps.
        let mut slots: Vec<Option<(usize, Option<f32>)>> = verdicts
            .iter()
            .enumerate()
            .map(|(pos, v)| match v {
                Verdict::Fallback => Some((pos, None)),
                Verdict::Scored(_) => None,
            })
            .collect();
        let mut judged_iter = judged.into_iter();
        for slot in slots.iter_mut().filter(|s| s.is_none()) {
            *slot = judged_iter.next().map(|(pos, score)| (pos, Some(score)));
        }

        let reranked = slots
            .into_iter()
            .flatten()
            .take(top_k)
            .enumerate()
            .map(|(rank, (pos, judge_score))| RerankedCandidate {
                document: candidates[pos].clone(),
                judge_score,
                pre_rerank_rank: pos,
                rank,
            })
            .collect();

        RerankOutput {
            candidates: reranked,
            degradations,
            judged: judged_count,
            failed,
        }
    }
}

/// Rerank a shortlist with default limits and no external cancellation.
pub async fn rerank(
    query: &Query,
    candidates: Vec<Arc<Document>>,
    judge: Arc<dyn RelevanceJudge>,
    top_k: usize,
) -> Result<RerankOutput> {
    RerankEngine::default()
        .rerank(query, candidates, judge, top_k, &CancellationToken::new())
        .await
}
