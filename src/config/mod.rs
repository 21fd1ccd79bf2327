mod file_config;

pub use file_config::{FileConfig, ReconcilerConfig, RecommendationConfig};

use crate::catalog::FeatureDimension;
use crate::catalog_client::SPOTIFY_API_BASE;
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub read_pool_size: Option<usize>,
    pub spotify_base_url: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_path: PathBuf,
    pub read_pool_size: usize,
    pub spotify_base_url: String,
    pub access_token: Option<String>,

    // Feature configs (with defaults)
    pub reconciler: ReconcilerSettings,
    pub recommendation: RecommendationSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }
        if db_path.is_dir() {
            bail!("db_path is a directory: {:?}", db_path);
        }

        let read_pool_size = file.read_pool_size.or(cli.read_pool_size).unwrap_or(4);
        if read_pool_size == 0 {
            bail!("read_pool_size must be at least 1");
        }

        let spotify_base_url = file
            .spotify_base_url
            .or_else(|| cli.spotify_base_url.clone())
            .unwrap_or_else(|| SPOTIFY_API_BASE.to_string());

        let access_token = file.access_token.or_else(|| cli.access_token.clone());

        // Reconciler settings - merge file config with defaults
        let rc_file = file.reconciler.unwrap_or_default();
        let rc_defaults = ReconcilerSettings::default();
        let reconciler = ReconcilerSettings {
            max_batch_size: rc_file.max_batch_size.unwrap_or(rc_defaults.max_batch_size),
            max_retries: rc_file.max_retries.unwrap_or(rc_defaults.max_retries),
            initial_backoff_ms: rc_file
                .initial_backoff_ms
                .unwrap_or(rc_defaults.initial_backoff_ms),
            max_backoff_ms: rc_file.max_backoff_ms.unwrap_or(rc_defaults.max_backoff_ms),
            backoff_multiplier: rc_file
                .backoff_multiplier
                .unwrap_or(rc_defaults.backoff_multiplier),
            request_timeout_secs: rc_file
                .request_timeout_secs
                .unwrap_or(rc_defaults.request_timeout_secs),
        };
        reconciler.validate()?;

        let rec_file = file.recommendation.unwrap_or_default();
        let rec_defaults = RecommendationSettings::default();
        let mut dimension_deltas = HashMap::new();
        for (label, delta) in rec_file.deltas.unwrap_or_default() {
            let Some(dimension) = FeatureDimension::from_label(&label) else {
                bail!("Unknown feature dimension in [recommendation.deltas]: {}", label);
            };
            if !dimension.is_bounded() {
                bail!(
                    "Tempo tolerance is configured with tempo_delta, \
                     not in [recommendation.deltas]"
                );
            }
            dimension_deltas.insert(dimension, delta);
        }
        let recommendation = RecommendationSettings {
            max_seeds: rec_file.max_seeds.unwrap_or(rec_defaults.max_seeds),
            limit: rec_file.limit.unwrap_or(rec_defaults.limit),
            bounded_delta: rec_file.bounded_delta.unwrap_or(rec_defaults.bounded_delta),
            dimension_deltas,
            tempo_delta: rec_file.tempo_delta.unwrap_or(rec_defaults.tempo_delta),
            tempo_ceiling: rec_file.tempo_ceiling.unwrap_or(rec_defaults.tempo_ceiling),
        };
        recommendation.validate()?;

        Ok(Self {
            db_path,
            read_pool_size,
            spotify_base_url,
            access_token,
            reconciler,
            recommendation,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilerSettings {
    /// Upper bound on ids per remote batch call; each kind further caps it.
    pub max_batch_size: usize,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub request_timeout_secs: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            request_timeout_secs: 10,
        }
    }
}

impl ReconcilerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            bail!("reconciler.max_batch_size must be at least 1");
        }
        if self.backoff_multiplier < 1.0 {
            bail!(
                "reconciler.backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("reconciler.request_timeout_secs must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSettings {
    pub max_seeds: usize,
    pub limit: usize,
    /// Half-width of the window for every bounded dimension without an override.
    pub bounded_delta: f64,
    pub dimension_deltas: HashMap<FeatureDimension, f64>,
    /// Half-width of the tempo window, in BPM.
    pub tempo_delta: f64,
    pub tempo_ceiling: f64,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            max_seeds: 5,
            limit: 20,
            bounded_delta: 0.1,
            dimension_deltas: HashMap::new(),
            tempo_delta: 10.0,
            tempo_ceiling: 250.0,
        }
    }
}

impl RecommendationSettings {
    pub fn delta(&self, dimension: FeatureDimension) -> f64 {
        if !dimension.is_bounded() {
            return self.tempo_delta;
        }
        self.dimension_deltas
            .get(&dimension)
            .copied()
            .unwrap_or(self.bounded_delta)
    }

    fn validate(&self) -> Result<()> {
        if self.max_seeds == 0 {
            bail!("recommendation.max_seeds must be at least 1");
        }
        if self.limit == 0 {
            bail!("recommendation.limit must be at least 1");
        }
        for dimension in FeatureDimension::ALL {
            let delta = self.delta(dimension);
            if !(delta >= 0.0) {
                bail!(
                    "recommendation delta for {} must be non-negative, got {}",
                    dimension.label(),
                    delta
                );
            }
        }
        if !(self.tempo_ceiling > 0.0) {
            bail!(
                "recommendation.tempo_ceiling must be positive, got {}",
                self.tempo_ceiling
            );
        }
        Ok(())
    }
}
