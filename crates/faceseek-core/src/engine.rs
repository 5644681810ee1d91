//! High-level pipeline facade.
//!
//! Wires locator → builder → ranker into the operations the surrounding
//! service consumes: embed, search, validate. Every operation degrades to a
//! defined fallback instead of failing — undecodable input yields the
//! sentinel embedding, a missing face falls back to full-image features.

use crate::embedding::EmbeddingBuilder;
use crate::locator::FaceLocator;
use crate::ranker::{resolve_threshold, MatchRanker, ThresholdPolicy};
use crate::types::{Embedding, GalleryEntry, MatchResult, Region};
use image::DynamicImage;

/// Default configured similarity threshold, fed through the floor policy
/// when a search supplies no explicit value.
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Face matching engine: detection, embedding extraction and gallery search
/// behind one handle. Stateless between calls; safe to share across threads.
#[derive(Debug, Clone)]
pub struct FaceEngine {
    pub locator: FaceLocator,
    pub builder: EmbeddingBuilder,
    pub ranker: MatchRanker,
    pub threshold_policy: ThresholdPolicy,
    pub similarity_threshold: f32,
}

impl Default for FaceEngine {
    fn default() -> Self {
        Self {
            locator: FaceLocator::default(),
            builder: EmbeddingBuilder::default(),
            ranker: MatchRanker::default(),
            threshold_policy: ThresholdPolicy::default(),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl FaceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// All candidate face regions in a decoded image.
    pub fn detect(&self, image: &DynamicImage) -> Vec<Region> {
        self.locator.detect(image)
    }

    /// Embed a decoded image: locate the most probable face, falling back to
    /// full-image features when none is found.
    pub fn embed_image(&self, image: &DynamicImage) -> Embedding {
        let region = self.locator.locate(image);
        if region.is_none() {
            tracing::warn!("no face detected, using full image features");
        }
        self.builder.build(image, region)
    }

    /// Embed an encoded image buffer. Decode failure is a normal empty
    /// result, not an error: the caller receives the all-zero sentinel.
    pub fn embed_bytes(&self, bytes: &[u8]) -> Embedding {
        match image::load_from_memory(bytes) {
            Ok(image) => self.embed_image(&image),
            Err(err) => {
                tracing::warn!(error = %err, "image decode failed, returning sentinel embedding");
                Embedding::zero()
            }
        }
    }

    /// Rank the gallery against a query embedding.
    ///
    /// An explicit threshold is resolved (percentages divided down, then
    /// clamped); with `None` the configured threshold is passed through the
    /// floor policy.
    pub fn search(
        &self,
        query: &Embedding,
        gallery: &[GalleryEntry],
        threshold: Option<f32>,
    ) -> Vec<MatchResult> {
        let threshold = match threshold {
            Some(raw) => resolve_threshold(raw),
            None => self.threshold_policy.effective(self.similarity_threshold),
        };
        tracing::info!(gallery = gallery.len(), threshold, "searching gallery");
        self.ranker.rank(query, gallery, threshold)
    }

    /// Check that a buffer decodes to an image, and report a face count.
    /// Returns `(false, 0)` for undecodable input, otherwise
    /// `(true, max(1, faces))` — a decodable image always counts as usable.
    pub fn validate_bytes(&self, bytes: &[u8]) -> (bool, usize) {
        match image::load_from_memory(bytes) {
            Ok(image) => (true, self.locator.count(&image).max(1)),
            Err(err) => {
                tracing::warn!(error = %err, "image validation failed");
                (false, 0)
            }
        }
    }
}
