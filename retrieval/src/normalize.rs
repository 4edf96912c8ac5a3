//! Min-max score normalization onto a common "higher is better" [0, 1] scale.

use serde::{Deserialize, Serialize};

/// Default guard added to the min-max denominator
pub const DEFAULT_EPSILON: f32 = 1e-8;

/// Whether larger raw scores mean more relevant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    /// Similarities, BM25
    HigherIsBetter,
    /// Distances
    LowerIsBetter,
}

/// Rescale `scores` into [0, 1], higher = better.
///
/// `(s - min) / (max - min + epsilon)`, inverted for `LowerIsBetter`.
/// Non-finite inputs are ignored when computing the range and map to 0.
/// A degenerate range (all finite scores within `epsilon`, including a
/// single score) maps every finite score to 1.0.
pub fn normalize(scores: &[f32], direction: ScoreDirection, epsilon: f32) -> Vec<f32> {
    let (min, max) = scores
        .iter()
        .filter(|s| s.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| {
            (lo.min(s), hi.max(s))
        });

    if min > max {
        // No finite score at all.
        return vec![0.0; scores.len()];
    }

    let range = max - min;
    if range <= epsilon {
        return scores
            .iter()
            .map(|s| if s.is_finite() { 1.0 } else { 0.0 })
            .collect();
    }

    let denom = range + epsilon;
    scores
        .iter()
        .map(|&s| {
            if !s.is_finite() {
                return 0.0;
            }
            let scaled = ((s - min) / denom).clamp(0.0, 1.0);
            match direction {
                ScoreDirection::HigherIsBetter => scaled,
                ScoreDirection::LowerIsBetter => 1.0 - scaled,
            }
        })
        .collect()
}
