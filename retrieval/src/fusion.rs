use crate::config::{FusionStrategy, RetrievalConfig};
use crate::document::DocumentId;
use crate::error::{Result, RetrievalError};
use crate::result::{Degradation, FusedCandidate};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Neighbouring scores closer than this are ties, broken by corpus order
pub const TIE_TOLERANCE: f64 = 1e-6;

/// Normalized scores per scorer name, per document
pub type ScoreSets = BTreeMap<String, HashMap<DocumentId, f32>>;

/// Fused ranking plus the fail-soft notes recorded while fusing
#[derive(Debug, Clone, Default)]
pub struct FusionOutput {
    pub candidates: Vec<FusedCandidate>,
    pub degradations: Vec<Degradation>,
}

/// Fusion engine for combining normalized scorer outputs
#[derive(Debug, Clone)]
pub struct FusionEngine {
    strategy: FusionStrategy,
    rrf_k: f32,
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self {
            strategy: FusionStrategy::WeightedScore,
            rrf_k: 60.0,
        }
    }
}

/// Order `(position, score)` pairs best first.
///
/// After a descending sort, each run of neighbours no more than
/// [`TIE_TOLERANCE`] apart is one tie group, emitted in position order.
pub(crate) fn rank_with_ties(mut items: Vec<(usize, f32)>) -> Vec<(usize, f32)> {
    items.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut ordered = Vec::with_capacity(items.len());
    let mut group: Vec<(usize, f32)> = Vec::new();
    for item in items {
        let splits = group
            .last()
            .is_some_and(|&(_, previous)| f64::from(previous) - f64::from(item.1) > TIE_TOLERANCE);
        if splits {
            group.sort_by_key(|&(pos, _)| pos);
            ordered.append(&mut group);
        }
        group.push(item);
    }
    group.sort_by_key(|&(pos, _)| pos);
    ordered.append(&mut group);
    ordered
}

impl FusionEngine {
    pub fn new(strategy: FusionStrategy, rrf_k: f32) -> Self {
        Self { strategy, rrf_k }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.fusion_strategy, config.rrf_k)
    }

    pub fn strategy(&self) -> FusionStrategy {
        self.strategy
    }

    /// Fuse normalized score sets into one ranking over `order`.
    ///
    /// `order` is the corpus insertion order and breaks ties. A document
    /// missing from a scorer contributes 0 for that scorer and is recorded as
    /// a [`Degradation::MissingScores`]; a scorer covering none of the
    /// documents is an error.
    pub fn fuse(
        &self,
        order: &[DocumentId],
        score_sets: &ScoreSets,
        weights: &HashMap<String, f32>,
    ) -> Result<FusionOutput> {
        Self::validate(score_sets, weights)?;

        let mut seen = HashSet::with_capacity(order.len());
        let order: Vec<&DocumentId> = order.iter().filter(|id| seen.insert(*id)).collect();
        if order.is_empty() {
            return Ok(FusionOutput::default());
        }

        let mut degradations = Vec::new();
        for (name, scores) in score_sets {
            let missing = order
                .iter()
                .filter(|id| !scores.get(**id).is_some_and(|s| s.is_finite()))
                .count();
            if missing == order.len() {
                return Err(RetrievalError::ScorerWithoutScores(name.clone()));
            }
            if missing > 0 {
                warn!(
                    "Scorer '{name}' has no score for {missing} of {} documents, counting them as 0",
                    order.len()
                );
                degradations.push(Degradation::MissingScores {
                    scorer: name.clone(),
                    missing,
                });
            }
        }

        debug!(
            "{:?} fusion over {} documents from {} scorers",
            self.strategy,
            order.len(),
            score_sets.len()
        );

        let combined = match self.strategy {
            FusionStrategy::WeightedScore => Self::weighted_sum(&order, score_sets, weights),
            FusionStrategy::ReciprocalRank => {
                self.reciprocal_rank(&order, score_sets, weights)
            }
        };

        let ranked = rank_with_ties(combined.into_iter().enumerate().collect());

        let candidates = ranked
            .into_iter()
            .enumerate()
            .map(|(rank, (idx, score))| FusedCandidate {
                id: order[idx].clone(),
                score,
                rank,
            })
            .collect();

        Ok(FusionOutput {
            candidates,
            degradations,
        })
    }

    fn validate(score_sets: &ScoreSets, weights: &HashMap<String, f32>) -> Result<()> {
        for (name, &weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RetrievalError::InvalidWeight {
                    name: name.clone(),
                    value: weight,
                });
            }
            if !score_sets.contains_key(name) {
                return Err(RetrievalError::ScorerWithoutScores(name.clone()));
            }
        }
        if let Some(name) = score_sets.keys().find(|name| !weights.contains_key(*name)) {
            return Err(RetrievalError::InvalidConfig(format!(
                "no fusion weight for scorer '{name}'"
            )));
        }
        Ok(())
    }

    fn score_of(scores: &HashMap<DocumentId, f32>, id: &DocumentId) -> f32 {
        scores
            .get(id)
            .copied()
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
    }

    /// combined(d) = Σ weight(s) · score(s, d)
    fn weighted_sum(
        order: &[&DocumentId],
        score_sets: &ScoreSets,
        weights: &HashMap<String, f32>,
    ) -> Vec<f32> {
        order
            .iter()
            .map(|id| {
                score_sets
                    .iter()
                    .map(|(name, scores)| {
                        weights.get(name).copied().unwrap_or(0.0) * Self::score_of(scores, id)
                    })
                    .sum()
            })
            .collect()
    }

    /// RRF(d) = Σ weight(s) / (k + rank_s(d)), rank 1-based; unscored documents
    /// get no contribution from that scorer.
    fn reciprocal_rank(
        &self,
        order: &[&DocumentId],
        score_sets: &ScoreSets,
        weights: &HashMap<String, f32>,
    ) -> Vec<f32> {
        let mut combined = vec![0.0_f32; order.len()];

        for (name, scores) in score_sets {
            let weight = weights.get(name).copied().unwrap_or(0.0);
            let ranked: Vec<(usize, f32)> = order
                .iter()
                .enumerate()
                .filter_map(|(idx, id)| {
                    scores
                        .get(*id)
                        .copied()
                        .filter(|s| s.is_finite())
                        .map(|s| (idx, s))
                })
                .collect();

            for (rank, (idx, _)) in rank_with_ties(ranked).into_iter().enumerate() {
                combined[idx] += weight / (self.rrf_k + rank as f32 + 1.0);
            }
        }

        combined
    }
}

/// Fuse normalized score sets with the default weighted-sum strategy.
pub fn fuse_scores(
    order: &[DocumentId],
    score_sets: &ScoreSets,
    weights: &HashMap<String, f32>,
) -> Result<FusionOutput> {
    FusionEngine::default().fuse(order, score_sets, weights)
}
