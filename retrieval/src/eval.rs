//! Offline retrieval quality metrics.
//!
//! All metrics take a ranked id list (best first) and the set of ids judged
//! relevant, with binary relevance.

use crate::config::validate_k;
use crate::document::{Corpus, DocumentId, Query};
use crate::error::Result;
use crate::retrieval::HybridRetrieval;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

fn hits_in_top(ranked: &[DocumentId], relevant: &HashSet<DocumentId>, k: usize) -> usize {
    ranked.iter().take(k).filter(|id| relevant.contains(*id)).count()
}

/// 1.0 if any of the top `k` is relevant
pub fn hit_rate_at_k(ranked: &[DocumentId], relevant: &HashSet<DocumentId>, k: usize) -> f64 {
    if hits_in_top(ranked, relevant, k) > 0 { 1.0 } else { 0.0 }
}

/// 1 / position of the first relevant id (1-based), 0 if none
pub fn reciprocal_rank(ranked: &[DocumentId], relevant: &HashSet<DocumentId>) -> f64 {
    ranked
        .iter()
        .position(|id| relevant.contains(id))
        .map_or(0.0, |pos| 1.0 / (pos as f64 + 1.0))
}

pub fn precision_at_k(ranked: &[DocumentId], relevant: &HashSet<DocumentId>, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    hits_in_top(ranked, relevant, k) as f64 / k as f64
}

pub fn recall_at_k(ranked: &[DocumentId], relevant: &HashSet<DocumentId>, k: usize) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    hits_in_top(ranked, relevant, k) as f64 / relevant.len() as f64
}

/// Normalized discounted cumulative gain with binary gains
pub fn ndcg_at_k(ranked: &[DocumentId], relevant: &HashSet<DocumentId>, k: usize) -> f64 {
    let discount = |pos: usize| 1.0 / (pos as f64 + 2.0).log2();

    let dcg: f64 = ranked
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, id)| relevant.contains(*id))
        .map(|(pos, _)| discount(pos))
        .sum();
    let ideal: f64 = (0..k.min(relevant.len())).map(discount).sum();

    if ideal == 0.0 { 0.0 } else { dcg / ideal }
}

/// A query with the ids a human judged relevant to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledQuery {
    pub query: Query,
    pub relevant: HashSet<DocumentId>,
}

/// Mean metrics over a set of labelled queries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub queries: usize,
    pub k: usize,
    pub hit_rate: f64,
    pub mrr: f64,
    pub precision: f64,
    pub recall: f64,
    pub ndcg: f64,
}

impl EvaluationReport {
    /// Aggregate metrics over `(ranked ids, relevant ids)` pairs.
    pub fn from_rankings(rankings: &[(Vec<DocumentId>, HashSet<DocumentId>)], k: usize) -> Self {
        let mut report = Self {
            queries: rankings.len(),
            k,
            ..Default::default()
        };
        if rankings.is_empty() {
            return report;
        }

        for (ranked, relevant) in rankings {
            report.hit_rate += hit_rate_at_k(ranked, relevant, k);
            report.mrr += reciprocal_rank(ranked, relevant);
            report.precision += precision_at_k(ranked, relevant, k);
            report.recall += recall_at_k(ranked, relevant, k);
            report.ndcg += ndcg_at_k(ranked, relevant, k);
        }

        let n = rankings.len() as f64;
        report.hit_rate /= n;
        report.mrr /= n;
        report.precision /= n;
        report.recall /= n;
        report.ndcg /= n;
        report
    }
}

/// Run every labelled query through `retrieval` and score the top `k`.
pub async fn evaluate(
    retrieval: &HybridRetrieval,
    corpus: &Arc<Corpus>,
    labelled: &[LabelledQuery],
    k: usize,
) -> Result<EvaluationReport> {
    validate_k("k", k)?;

    let mut rankings = Vec::with_capacity(labelled.len());
    for item in labelled {
        let query = item.query.clone().with_final_k(k);
        let results = retrieval.retrieve(&query, corpus).await?;
        rankings.push((results.ids(), item.relevant.clone()));
    }

    let report = EvaluationReport::from_rankings(&rankings, k);
    info!(
        "Evaluated {} queries at k={k}: hit rate {:.3}, MRR {:.3}, nDCG {:.3}",
        report.queries, report.hit_rate, report.mrr, report.ndcg
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(names: &[&str]) -> Vec<DocumentId> {
        names.iter().map(|n| DocumentId::from(*n)).collect()
    }

    fn set(names: &[&str]) -> HashSet<DocumentId> {
        names.iter().map(|n| DocumentId::from(*n)).collect()
    }

    #[test]
    fn test_rank_metrics() {
        let ranked = ids(&["d", "a", "c", "b"]);
        let relevant = set(&["a", "b"]);

        assert_eq!(hit_rate_at_k(&ranked, &relevant, 1), 0.0);
        assert_eq!(hit_rate_at_k(&ranked, &relevant, 2), 1.0);
        assert_eq!(reciprocal_rank(&ranked, &relevant), 0.5);
        assert_eq!(precision_at_k(&ranked, &relevant, 2), 0.5);
        assert_eq!(recall_at_k(&ranked, &relevant, 2), 0.5);
        assert_eq!(recall_at_k(&ranked, &relevant, 4), 1.0);
    }

    #[test]
    fn test_ndcg() {
        let relevant = set(&["a"]);
        assert_eq!(ndcg_at_k(&ids(&["a", "b"]), &relevant, 2), 1.0);

        let second = ndcg_at_k(&ids(&["b", "a"]), &relevant, 2);
        assert!((second - 1.0 / 3f64.log2()).abs() < 1e-12);

        assert_eq!(ndcg_at_k(&ids(&["b", "c"]), &relevant, 2), 0.0);
        assert_eq!(ndcg_at_k(&ids(&["a"]), &HashSet::new(), 2), 0.0);
    }

    #[test]
    fn test_degenerate_inputs() {
        let relevant = set(&["a"]);
        assert_eq!(precision_at_k(&ids(&["a"]), &relevant, 0), 0.0);
        assert_eq!(reciprocal_rank(&[], &relevant), 0.0);
        assert_eq!(recall_at_k(&ids(&["a"]), &HashSet::new(), 3), 0.0);
    }

    #[test]
    fn test_report_means() {
        let rankings = vec![
            (ids(&["a", "b"]), set(&["a"])),
            (ids(&["b", "a"]), set(&["c"])),
        ];
        let report = EvaluationReport::from_rankings(&rankings, 2);

        assert_eq!(report.queries, 2);
        assert_eq!(report.hit_rate, 0.5);
        assert_eq!(report.mrr, 0.5);
        assert_eq!(report.precision, 0.25);
        assert_eq!(report.recall, 0.5);
        assert_eq!(report.ndcg, 0.5);
    }

    #[test]
    fn test_empty_report() {
        let report = EvaluationReport::from_rankings(&[], 5);
        assert_eq!(report, EvaluationReport { k: 5, ..Default::default() });
    }
}
