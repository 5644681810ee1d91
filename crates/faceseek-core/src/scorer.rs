//! Combined-metric similarity between two embeddings.
//!
//! Cosine similarity favors angular agreement; euclidean distance between
//! the re-normalized vectors corroborates it. Both are mapped into [0, 1]
//! and blended with fixed weights, so the final score is bounded and
//! symmetric.

use crate::types::{Embedding, DEGENERATE_NORM};

// --- Named constants (defaults for the weight fields) ---
const COSINE_WEIGHT: f32 = 0.6;
const EUCLIDEAN_WEIGHT: f32 = 0.4;
/// Maximum euclidean distance between two unit vectors.
const MAX_UNIT_DISTANCE: f32 = std::f32::consts::SQRT_2;

/// Scores embedding pairs into [0, 1].
#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    pub cosine_weight: f32,
    pub euclidean_weight: f32,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self {
            cosine_weight: COSINE_WEIGHT,
            euclidean_weight: EUCLIDEAN_WEIGHT,
        }
    }
}

impl SimilarityScorer {
    pub fn new(cosine_weight: f32, euclidean_weight: f32) -> Self {
        Self { cosine_weight, euclidean_weight }
    }

    /// Combined similarity in [0, 1]. Higher = more similar.
    ///
    /// Defensive on malformed input from persistence: mismatched lengths
    /// compare over the shared prefix, and a near-zero norm on either side
    /// returns 0.0 rather than faulting.
    pub fn score(&self, a: &Embedding, b: &Embedding) -> f32 {
        let len = a.values.len().min(b.values.len());
        if len == 0 {
            return 0.0;
        }
        let a = &a.values[..len];
        let b = &b.values[..len];

        let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm_a < DEGENERATE_NORM || norm_b < DEGENERATE_NORM {
            return 0.0;
        }

        let mut dot = 0.0f32;
        let mut dist_sq = 0.0f32;
        for i in 0..len {
            let x = a[i] / norm_a;
            let y = b[i] / norm_b;
            dot += x * y;
            let d = x - y;
            dist_sq += d * d;
        }

        let cosine_score = ((dot + 1.0) / 2.0).max(0.0);
        let euclidean_score = (1.0 - dist_sq.sqrt() / MAX_UNIT_DISTANCE).max(0.0);

        let combined =
            (self.cosine_weight * cosine_score + self.euclidean_weight * euclidean_score)
                .clamp(0.0, 1.0);
        tracing::trace!(cosine_score, euclidean_score, combined, "compared embeddings");
        combined
    }
}
