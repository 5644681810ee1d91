use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed length of every embedding. Part of the storage contract: reordering
/// feature families or changing this value silently invalidates every stored
/// embedding.
pub const EMBEDDING_DIM: usize = 256;

/// Number of dimensions actually populated by the feature families
/// (96 + 32 + 96 + 8 + 4 + 8). Dimensions [FEATURE_DIM, EMBEDDING_DIM) are
/// reserved capacity and always zero.
pub const FEATURE_DIM: usize = 244;

/// Norm below which a vector is treated as the extraction-failure sentinel.
pub const DEGENERATE_NORM: f32 = 1e-6;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("stored embedding has {actual} values, expected {expected}")]
    WrongLength { expected: usize, actual: usize },
}

/// Axis-aligned face region within an image.
///
/// Invariant: `x + width` and `y + height` never exceed the bounds of the
/// image the region was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Expand symmetrically by `fraction` of the region width on all sides,
    /// then clip to the `image_width` × `image_height` bounds.
    pub fn expanded(&self, fraction: f32, image_width: u32, image_height: u32) -> Region {
        let pad = (self.width as f32 * fraction) as i64;
        let x0 = (self.x as i64 - pad).max(0);
        let y0 = (self.y as i64 - pad).max(0);
        let x1 = (self.x as i64 + self.width as i64 + pad).min(image_width as i64);
        let y1 = (self.y as i64 + self.height as i64 + pad).min(image_height as i64);
        Region {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0).max(0) as u32,
            height: (y1 - y0).max(0) as u32,
        }
    }
}

/// Fixed-length face fingerprint.
///
/// Either L2-normalized (norm ≈ 1.0) or the all-zero extraction-failure
/// sentinel — never partially normalized. Immutable once built; carries no
/// reference to the source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    /// The all-zero sentinel denoting extraction failure.
    pub fn zero() -> Self {
        Self { values: vec![0.0; EMBEDDING_DIM] }
    }

    /// Wrap a stored float sequence, rejecting anything that is not exactly
    /// [`EMBEDDING_DIM`] values. Persistence collaborators use this to reject
    /// corrupt rows early; the scorer itself stays tolerant of bad lengths.
    pub fn from_stored(values: Vec<f32>) -> Result<Self, EmbeddingError> {
        if values.len() != EMBEDDING_DIM {
            return Err(EmbeddingError::WrongLength {
                expected: EMBEDDING_DIM,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// True for the sentinel (and for anything too small to renormalize).
    pub fn is_degenerate(&self) -> bool {
        self.values.is_empty() || self.norm() < DEGENERATE_NORM
    }
}

/// One stored identity in the gallery. The core only reads these during a
/// scan; ownership and persistence belong to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: String,
    pub embedding: Embedding,
}

/// One ranked match, produced fresh per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: String,
    /// Combined similarity in [0, 1].
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_embedding_is_degenerate() {
        let e = Embedding::zero();
        assert_eq!(e.values.len(), EMBEDDING_DIM);
        assert!(e.is_degenerate());
        assert!(e.norm() < DEGENERATE_NORM);
    }

    #[test]
    fn test_from_stored_accepts_exact_length() {
        let e = Embedding::from_stored(vec![0.5; EMBEDDING_DIM]).unwrap();
        assert_eq!(e.values.len(), EMBEDDING_DIM);
        assert!(!e.is_degenerate());
    }

    #[test]
    fn test_from_stored_rejects_wrong_length() {
        let err = Embedding::from_stored(vec![0.5; 128]).unwrap_err();
        match err {
            EmbeddingError::WrongLength { expected, actual } => {
                assert_eq!(expected, EMBEDDING_DIM);
                assert_eq!(actual, 128);
            }
        }
    }

    #[test]
    fn test_region_expansion_interior() {
        let r = Region { x: 50, y: 50, width: 100, height: 100 };
        let e = r.expanded(0.1, 640, 480);
        // 10% of width = 10 on every side
        assert_eq!(e, Region { x: 40, y: 40, width: 120, height: 120 });
    }

    #[test]
    fn test_region_expansion_clips_to_bounds() {
        let r = Region { x: 0, y: 0, width: 100, height: 100 };
        let e = r.expanded(0.1, 105, 105);
        assert_eq!(e.x, 0);
        assert_eq!(e.y, 0);
        assert_eq!(e.width, 105);
        assert_eq!(e.height, 105);
    }

    #[test]
    fn test_region_area() {
        let r = Region { x: 0, y: 0, width: 30, height: 40 };
        assert_eq!(r.area(), 1200);
    }
}
