//! Gallery ranking.
//!
//! Linear scan over the caller-supplied gallery: score every entry, keep
//! those at or above the threshold, sort descending. The sort is stable, so
//! exact ties keep their gallery scan order and identical inputs always
//! produce identical output.

use crate::scorer::SimilarityScorer;
use crate::types::{Embedding, GalleryEntry, MatchResult};

// --- Named constants (defaults for the policy fields) ---
const DEFAULT_THRESHOLD_FLOOR: f32 = 0.85;
const DEFAULT_THRESHOLD_MARGIN: f32 = 0.25;

/// Normalize a caller-supplied threshold: values above 1 are percentages,
/// and the result is clamped to [0, 1]. Configuration faults are resolved,
/// never rejected.
pub fn resolve_threshold(raw: f32) -> f32 {
    let threshold = if raw > 1.0 { raw / 100.0 } else { raw };
    threshold.clamp(0.0, 1.0)
}

/// Floor policy applied when the caller supplies no explicit threshold:
/// `max(floor, configured − margin)`.
///
/// The floor and the configured threshold are unrelated quantities; keeping
/// both visible here avoids conflating them at call sites.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdPolicy {
    pub floor: f32,
    pub margin: f32,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            floor: DEFAULT_THRESHOLD_FLOOR,
            margin: DEFAULT_THRESHOLD_MARGIN,
        }
    }
}

impl ThresholdPolicy {
    pub fn effective(&self, configured: f32) -> f32 {
        (configured - self.margin).max(self.floor)
    }
}

/// Ranks a gallery against a query embedding.
#[derive(Debug, Clone, Default)]
pub struct MatchRanker {
    pub scorer: SimilarityScorer,
}

impl MatchRanker {
    pub fn new(scorer: SimilarityScorer) -> Self {
        Self { scorer }
    }

    /// Scan the gallery, keep entries scoring at or above `threshold`
    /// (inclusive), and sort by score descending. Entries with an empty
    /// embedding are skipped. An empty gallery yields an empty result.
    pub fn rank(
        &self,
        query: &Embedding,
        gallery: &[GalleryEntry],
        threshold: f32,
    ) -> Vec<MatchResult> {
        let mut matches = Vec::new();

        for entry in gallery {
            if entry.embedding.values.is_empty() {
                tracing::debug!(id = %entry.id, "skipping entry with empty embedding");
                continue;
            }
            let score = self.scorer.score(query, &entry.embedding);
            if score >= threshold {
                matches.push(MatchResult { id: entry.id.clone(), score });
            }
        }

        // Stable sort: ties keep their gallery scan order.
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        tracing::debug!(
            gallery = gallery.len(),
            matched = matches.len(),
            threshold,
            "gallery scan complete"
        );
        matches
    }
}
