use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_path: Option<String>,
    pub read_pool_size: Option<usize>,
    pub spotify_base_url: Option<String>,
    pub access_token: Option<String>,

    // Feature configs
    pub reconciler: Option<ReconcilerConfig>,
    pub recommendation: Option<RecommendationConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub max_batch_size: Option<usize>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct RecommendationConfig {
    pub max_seeds: Option<usize>,
    pub limit: Option<usize>,
    pub bounded_delta: Option<f64>,
    /// Per-dimension overrides of `bounded_delta`, keyed by dimension label.
    pub deltas: Option<HashMap<String, f64>>,
    pub tempo_delta: Option<f64>,
    pub tempo_ceiling: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_full_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
db_path = "/data/synai.db"
access_token = "token"

[reconciler]
max_batch_size = 20
max_retries = 5

[recommendation]
max_seeds = 3
tempo_delta = 15.0

[recommendation.deltas]
energy = 0.25
"#
        )
        .unwrap();

        let config = FileConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path.as_deref(), Some("/data/synai.db"));
        assert_eq!(config.access_token.as_deref(), Some("token"));
        assert!(config.spotify_base_url.is_none());

        let reconciler = config.reconciler.unwrap();
        assert_eq!(reconciler.max_batch_size, Some(20));
        assert_eq!(reconciler.max_retries, Some(5));
        assert!(reconciler.initial_backoff_ms.is_none());

        let recommendation = config.recommendation.unwrap();
        assert_eq!(recommendation.max_seeds, Some(3));
        assert_eq!(recommendation.tempo_delta, Some(15.0));
        assert_eq!(recommendation.deltas.unwrap().get("energy"), Some(&0.25));
    }

    #[test]
    fn test_load_empty_file_is_all_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = FileConfig::load(file.path()).unwrap();
        assert!(config.db_path.is_none());
        assert!(config.reconciler.is_none());
        assert!(config.recommendation.is_none());
    }

    #[test]
    fn test_load_rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reconciler\nmax_batch_size = ").unwrap();
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
