//! JSON gallery file.
//!
//! The storage format belongs to this collaborator, not the core: records
//! carry the identity metadata, and embeddings are stored as plain float
//! arrays. Corrupt rows are skipped with a warning rather than failing the
//! whole scan.

use chrono::Utc;
use faceseek_core::{Embedding, GalleryEntry};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery file access failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("gallery file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One enrolled identity as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryRecord {
    pub id: String,
    pub name: String,
    pub embedding: Vec<f32>,
    pub created_at: String,
}

impl GalleryRecord {
    pub fn new(name: &str, embedding: &Embedding) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            embedding: embedding.values.clone(),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Load all records; a missing file is an empty gallery.
pub fn load(path: &Path) -> Result<Vec<GalleryRecord>, GalleryError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save(path: &Path, records: &[GalleryRecord]) -> Result<(), GalleryError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(records)?)?;
    Ok(())
}

/// Convert stored records to core gallery entries, skipping any row whose
/// embedding is not exactly the contractual length.
pub fn to_entries(records: &[GalleryRecord]) -> Vec<GalleryEntry> {
    records
        .iter()
        .filter_map(|record| match Embedding::from_stored(record.embedding.clone()) {
            Ok(embedding) => Some(GalleryEntry { id: record.id.clone(), embedding }),
            Err(err) => {
                tracing::warn!(id = %record.id, error = %err, "skipping corrupt gallery record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use faceseek_core::EMBEDDING_DIM;

    fn unit_embedding() -> Embedding {
        let mut values = vec![0.0; EMBEDDING_DIM];
        values[0] = 1.0;
        Embedding { values }
    }

    #[test]
    fn test_record_round_trip() {
        let path = std::env::temp_dir().join(format!("faceseek-test-{}.json", Uuid::new_v4()));
        let records = vec![GalleryRecord::new("alice", &unit_embedding())];

        save(&path, &records).unwrap();
        let loaded = load(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "alice");
        assert_eq!(loaded[0].embedding.len(), EMBEDDING_DIM);
        assert_eq!(loaded[0].id, records[0].id);
    }

    #[test]
    fn test_missing_file_is_empty_gallery() {
        let path = std::env::temp_dir().join(format!("faceseek-absent-{}.json", Uuid::new_v4()));
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_to_entries_skips_corrupt_rows() {
        let good = GalleryRecord::new("good", &unit_embedding());
        let bad = GalleryRecord {
            id: "bad".into(),
            name: "bad".into(),
            embedding: vec![1.0; 17],
            created_at: Utc::now().to_rfc3339(),
        };

        let entries = to_entries(&[bad, good.clone()]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, good.id);
    }
}
