//! faceseek-core — face matching engine.
//!
//! Turns an image into a fixed-length 256-float embedding built from
//! handcrafted feature families, and ranks galleries of stored embeddings
//! by combined cosine+euclidean similarity. Pure, synchronous, no I/O.

pub mod embedding;
pub mod engine;
pub mod features;
pub mod locator;
pub mod ranker;
pub mod scorer;
pub mod types;

pub use embedding::EmbeddingBuilder;
pub use engine::FaceEngine;
pub use locator::FaceLocator;
pub use ranker::{resolve_threshold, MatchRanker, ThresholdPolicy};
pub use scorer::SimilarityScorer;
pub use types::{Embedding, EmbeddingError, GalleryEntry, MatchResult, Region, EMBEDDING_DIM};
