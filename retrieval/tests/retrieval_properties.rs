//! Ranking invariants of the normalizer, fusion ranker and reranker.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use ragfuse_retrieval::{
    DEFAULT_EPSILON, Document, DocumentId, FusionOutput, JudgeError, Query, RelevanceJudge,
    ScoreDirection, ScoreSets, fuse_scores, normalize, rerank,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

fn ids(n: usize) -> Vec<DocumentId> {
    (0..n).map(|i| DocumentId::from(format!("doc{}", i + 1))).collect()
}

fn score_sets(order: &[DocumentId], vector: &[f32], lexical: &[f32]) -> ScoreSets {
    let mut sets = ScoreSets::new();
    sets.insert(
        "vector".to_string(),
        order.iter().cloned().zip(vector.iter().copied()).collect(),
    );
    sets.insert(
        "lexical".to_string(),
        order.iter().cloned().zip(lexical.iter().copied()).collect(),
    );
    sets
}

fn weights(alpha: f32) -> HashMap<String, f32> {
    HashMap::from([
        ("vector".to_string(), alpha),
        ("lexical".to_string(), 1.0 - alpha),
    ])
}

fn position(output: &FusionOutput, id: &DocumentId) -> usize {
    output
        .candidates
        .iter()
        .position(|c| &c.id == id)
        .unwrap()
}

fn score_of(output: &FusionOutput, id: &DocumentId) -> f32 {
    output.candidates.iter().find(|c| &c.id == id).unwrap().score
}

#[test]
fn normalization_stays_in_unit_range() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let len = rng.random_range(2..20);
        let scores: Vec<f32> = (0..len).map(|_| rng.random_range(-50.0..50.0)).collect();
        let normalized = normalize(&scores, ScoreDirection::HigherIsBetter, DEFAULT_EPSILON);

        assert!(normalized.iter().all(|s| (0.0..=1.0).contains(s)));

        let (max_idx, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        let (min_idx, _) = scores
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        if scores[max_idx] - scores[min_idx] > 1e-3 {
            assert!((normalized[max_idx] - 1.0).abs() < 1e-5);
            assert!(normalized[min_idx].abs() < 1e-5);
        }
    }
}

#[test]
fn lower_is_better_puts_smallest_distance_first() {
    let distances = [3.2, 0.4, 1.7, 9.0];
    let normalized = normalize(&distances, ScoreDirection::LowerIsBetter, DEFAULT_EPSILON);

    let best = normalized
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(best, 1);
    assert!((normalized[1] - 1.0).abs() < 1e-6);
    assert!(normalized[3].abs() < 1e-6);
}

#[test]
fn raising_one_score_never_hurts_that_document() {
    let mut rng = StdRng::seed_from_u64(42);
    let order = ids(8);

    for _ in 0..200 {
        let alpha: f32 = rng.random();
        let vector: Vec<f32> = (0..order.len()).map(|_| rng.random()).collect();
        let lexical: Vec<f32> = (0..order.len()).map(|_| rng.random()).collect();
        let before = fuse_scores(&order, &score_sets(&order, &vector, &lexical), &weights(alpha))
            .unwrap();

        let target = rng.random_range(0..order.len());
        let mut raised_vector = vector.clone();
        let mut raised_lexical = lexical.clone();
        if rng.random_bool(0.5) {
            raised_vector[target] = (vector[target] + rng.random::<f32>()).min(1.0);
        } else {
            raised_lexical[target] = (lexical[target] + rng.random::<f32>()).min(1.0);
        }
        let after = fuse_scores(
            &order,
            &score_sets(&order, &raised_vector, &raised_lexical),
            &weights(alpha),
        )
        .unwrap();

        let id = &order[target];
        assert!(score_of(&after, id) >= score_of(&before, id));
        for other in order.iter().filter(|other| *other != id) {
            if position(&before, id) < position(&before, other) {
                assert!(position(&after, id) < position(&after, other));
            }
        }
    }
}

#[test]
fn weight_extremes_reduce_to_single_scorer_order() {
    let mut rng = StdRng::seed_from_u64(3);
    let order = ids(12);

    let mut vector: Vec<f32> = (0..order.len()).map(|i| i as f32 / 12.0).collect();
    let mut lexical = vector.clone();
    vector.shuffle(&mut rng);
    lexical.shuffle(&mut rng);
    let sets = score_sets(&order, &vector, &lexical);

    let single_order = |scores: &[f32]| -> Vec<DocumentId> {
        let mut idx: Vec<usize> = (0..scores.len()).collect();
        idx.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));
        idx.into_iter().map(|i| order[i].clone()).collect()
    };
    let fused_order = |output: FusionOutput| -> Vec<DocumentId> {
        output.candidates.into_iter().map(|c| c.id).collect()
    };

    let pure_vector = fuse_scores(&order, &sets, &weights(1.0)).unwrap();
    assert_eq!(fused_order(pure_vector), single_order(&vector));

    let pure_lexical = fuse_scores(&order, &sets, &weights(0.0)).unwrap();
    assert_eq!(fused_order(pure_lexical), single_order(&lexical));
}

#[test]
fn identical_combined_scores_keep_corpus_order() {
    let order = ids(5);
    let sets = score_sets(&order, &[0.4, 0.7, 0.4, 0.7, 0.4], &[0.6, 0.3, 0.6, 0.3, 0.6]);
    let output = fuse_scores(&order, &sets, &weights(0.5)).unwrap();

    let ranked: Vec<&str> = output.candidates.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ranked, vec!["doc1", "doc2", "doc3", "doc4", "doc5"]);
}

#[test]
fn scenario_bm25_and_similarity_with_tie() {
    let order = ids(3);
    let lexical = normalize(&[5.0, 1.0, 0.0], ScoreDirection::HigherIsBetter, DEFAULT_EPSILON);
    assert_eq!(lexical, vec![1.0, 0.2, 0.0]);

    // Vector similarities arrive already normalized.
    let sets = score_sets(&order, &[0.1, 0.9, 0.5], &lexical);
    let output = fuse_scores(&order, &sets, &weights(0.5)).unwrap();

    let ranked: Vec<&str> = output.candidates.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ranked, vec!["doc1", "doc2", "doc3"]);
    assert!((output.candidates[0].score - 0.55).abs() < 1e-6);
    assert!((output.candidates[1].score - 0.55).abs() < 1e-6);
    assert!((output.candidates[2].score - 0.25).abs() < 1e-6);
}

#[test]
fn scenario_single_document_is_not_degenerate() {
    let order = ids(1);
    let lexical = normalize(&[3.7], ScoreDirection::HigherIsBetter, DEFAULT_EPSILON);
    let vector = normalize(&[0.42], ScoreDirection::LowerIsBetter, DEFAULT_EPSILON);
    assert_eq!(lexical, vec![1.0]);
    assert_eq!(vector, vec![1.0]);

    let output = fuse_scores(&order, &score_sets(&order, &vector, &lexical), &weights(0.5))
        .unwrap();
    assert_eq!(output.candidates.len(), 1);
    assert_eq!(output.candidates[0].score, 1.0);
}

struct SeededJudge {
    scores: HashMap<DocumentId, f32>,
}

#[async_trait]
impl RelevanceJudge for SeededJudge {
    async fn score(&self, _: &Query, document: &Document) -> Result<f32, JudgeError> {
        match self.scores.get(&document.id) {
            Some(score) => Ok(*score),
            None => Err(JudgeError::Parse {
                raw: "I am not sure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "seeded"
    }
}

#[tokio::test]
async fn reranker_is_bounded_by_top_k_and_input() {
    let mut rng = StdRng::seed_from_u64(5);

    for _ in 0..25 {
        let count = rng.random_range(1..10);
        let candidates: Vec<Arc<Document>> = (0..count)
            .map(|i| Arc::new(Document::new(format!("c{i}"), format!("candidate {i}"))))
            .collect();
        let mut scores = HashMap::new();
        for doc in &candidates {
            if rng.random_bool(0.8) {
                scores.insert(doc.id.clone(), rng.random_range(1.0..10.0));
            }
        }
        let judge = Arc::new(SeededJudge { scores });
        let top_k = rng.random_range(1..12);
        let input: HashSet<DocumentId> = candidates.iter().map(|d| d.id.clone()).collect();

        let output = rerank(&Query::new("q"), candidates, judge, top_k).await.unwrap();

        assert!(output.candidates.len() <= top_k);
        assert_eq!(output.candidates.len(), top_k.min(count));
        let returned: HashSet<DocumentId> = output
            .candidates
            .iter()
            .map(|c| c.document.id.clone())
            .collect();
        assert_eq!(returned.len(), output.candidates.len());
        assert!(returned.is_subset(&input));
    }
}

#[tokio::test]
async fn non_numeric_judge_output_scores_zero_without_failing() {
    let candidates: Vec<Arc<Document>> = ["a", "b", "c"]
        .iter()
        .map(|id| Arc::new(Document::new(*id, "text")))
        .collect();
    let judge = Arc::new(SeededJudge {
        scores: HashMap::from([("a".into(), 2.0), ("c".into(), 4.0)]),
    });

    let output = rerank(&Query::new("q"), candidates, judge, 3).await.unwrap();

    let ranked: Vec<(&str, Option<f32>)> = output
        .candidates
        .iter()
        .map(|c| (c.document.id.as_str(), c.judge_score))
        .collect();
    assert_eq!(ranked, vec![("c", Some(4.0)), ("a", Some(2.0)), ("b", Some(0.0))]);
    assert_eq!(output.degradations.len(), 1);
}
