//! Embedding assembly.
//!
//! Concatenates the feature families in their contractual order, pads or
//! truncates to exactly [`EMBEDDING_DIM`] values, and L2-normalizes. The 12
//! dimensions beyond [`FEATURE_DIM`] are reserved capacity and always zero.

use crate::features::{self, EdgeThresholds};
use crate::types::{Embedding, Region, DEGENERATE_NORM, EMBEDDING_DIM};
use image::DynamicImage;

/// Builds fixed-length embeddings from a face region.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingBuilder {
    /// Edge-map thresholds for the shape descriptor family.
    pub edge_thresholds: EdgeThresholds,
}

impl EmbeddingBuilder {
    pub fn new(edge_thresholds: EdgeThresholds) -> Self {
        Self { edge_thresholds }
    }

    /// Build an embedding from the given region, or from the full image when
    /// no region is supplied (the no-face degraded mode).
    ///
    /// Always returns exactly [`EMBEDDING_DIM`] values: L2-normalized, or the
    /// all-zero sentinel when the feature vector is too small to normalize.
    pub fn build(&self, image: &DynamicImage, region: Option<Region>) -> Embedding {
        let patch = features::prepare_region(image, region);
        let gray = patch.to_luma8();
        let rgb = patch.to_rgb8();

        let mut values = Vec::with_capacity(EMBEDDING_DIM);
        values.extend(features::orientation_histograms(&gray));
        values.extend(features::intensity_histogram(&gray));
        values.extend(features::color_histograms(&rgb));
        values.extend(features::texture_statistics(&gray));
        values.extend(features::shape_descriptors(&gray, self.edge_thresholds));
        values.extend(features::spatial_grid(&gray));

        values.truncate(EMBEDDING_DIM);
        values.resize(EMBEDDING_DIM, 0.0);

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= DEGENERATE_NORM {
            tracing::warn!(norm, "feature vector below normalizable range, returning sentinel");
            return Embedding::zero();
        }
        for v in &mut values {
            *v /= norm;
        }

        tracing::debug!(region = ?region, "built embedding");
        Embedding { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FEATURE_DIM;
    use image::{GrayImage, Luma};

    fn test_image() -> DynamicImage {
        // Gradient with structure in every feature family.
        DynamicImage::ImageLuma8(GrayImage::from_fn(64, 64, |x, y| {
            Luma([((x * 3 + y * 2) % 256) as u8])
        }))
    }

    #[test]
    fn test_embedding_length_and_norm() {
        let e = EmbeddingBuilder::default().build(&test_image(), None);
        assert_eq!(e.values.len(), EMBEDDING_DIM);
        assert!((e.norm() - 1.0).abs() < 1e-5, "norm {}", e.norm());
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = EmbeddingBuilder::default();
        let img = test_image();
        let a = builder.build(&img, None);
        let b = builder.build(&img, None);
        assert_eq!(a.values, b.values, "repeat builds must be bit-identical");
    }

    #[test]
    fn test_reserved_dimensions_stay_zero() {
        let e = EmbeddingBuilder::default().build(&test_image(), None);
        assert!(e.values[FEATURE_DIM..].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_region_and_full_image_differ() {
        let builder = EmbeddingBuilder::default();
        let img = test_image();
        let full = builder.build(&img, None);
        let crop = builder.build(&img, Some(Region { x: 0, y: 0, width: 20, height: 20 }));
        assert_eq!(crop.values.len(), EMBEDDING_DIM);
        assert_ne!(full.values, crop.values);
    }

    #[test]
    fn test_degenerate_region_still_yields_full_length() {
        let img = test_image();
        let tiny = Region { x: 0, y: 0, width: 2, height: 2 };
        let e = EmbeddingBuilder::default().build(&img, Some(tiny));
        assert_eq!(e.values.len(), EMBEDDING_DIM);
        // Upscaled patch still has an intensity histogram, so this is a
        // valid normalized embedding rather than the sentinel.
        assert!(!e.is_degenerate());
    }
}
