use faceseek_core::{FaceEngine, ThresholdPolicy};
use std::path::PathBuf;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Path to the JSON gallery file.
    pub gallery_path: PathBuf,
    /// Configured similarity threshold for searches.
    pub similarity_threshold: f32,
    /// Threshold floor applied when a search gives no explicit threshold.
    pub threshold_floor: f32,
    /// Margin subtracted from the configured threshold before the floor.
    pub threshold_margin: f32,
}

impl Config {
    /// Load configuration from `FACESEEK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("faceseek");

        let gallery_path = std::env::var("FACESEEK_GALLERY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("gallery.json"));

        Self {
            gallery_path,
            similarity_threshold: env_f32("FACESEEK_SIMILARITY_THRESHOLD", 0.85),
            threshold_floor: env_f32("FACESEEK_THRESHOLD_FLOOR", 0.85),
            threshold_margin: env_f32("FACESEEK_THRESHOLD_MARGIN", 0.25),
        }
    }

    /// Build an engine configured from this environment.
    pub fn engine(&self) -> FaceEngine {
        FaceEngine {
            similarity_threshold: self.similarity_threshold,
            threshold_policy: ThresholdPolicy {
                floor: self.threshold_floor,
                margin: self.threshold_margin,
            },
            ..FaceEngine::default()
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
