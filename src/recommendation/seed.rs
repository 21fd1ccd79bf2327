//! Recommendation seed construction.
//!
//! A seed is a small random sample of an analysis's tracks plus a window
//! around the analysis summary that recommended tracks must fall into.

use crate::catalog::{Analysis, AudioFeatures, FeatureDimension};
use crate::config::RecommendationSettings;
use crate::error::EngineError;
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;

/// Per-dimension `[min, max]` bounds for recommended tracks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ToleranceWindow {
    pub min: AudioFeatures,
    pub max: AudioFeatures,
}

impl ToleranceWindow {
    /// Window of half-width `settings.delta(dim)` around `center`.
    ///
    /// Bounded dimensions are clamped to `[0, 1]`, tempo to `[0, tempo_ceiling]`.
    /// A center above its ceiling raises the ceiling to the center, so the
    /// window always contains the center itself.
    pub fn around(center: &AudioFeatures, settings: &RecommendationSettings) -> Self {
        let ceiling = |dimension: FeatureDimension| {
            let ceiling = if dimension.is_bounded() {
                1.0
            } else {
                settings.tempo_ceiling
            };
            ceiling.max(center.get(dimension))
        };
        let min = AudioFeatures::from_fn(|dimension| {
            (center.get(dimension) - settings.delta(dimension)).clamp(0.0, ceiling(dimension))
        });
        let max = AudioFeatures::from_fn(|dimension| {
            (center.get(dimension) + settings.delta(dimension)).clamp(0.0, ceiling(dimension))
        });
        ToleranceWindow { min, max }
    }

    pub fn range(&self, dimension: FeatureDimension) -> (f64, f64) {
        (self.min.get(dimension), self.max.get(dimension))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Seed {
    /// Distinct external track ids.
    pub track_ids: Vec<String>,
    pub window: ToleranceWindow,
}

#[derive(Debug, Clone, Default)]
pub struct SeedBuilder {
    settings: RecommendationSettings,
}

impl SeedBuilder {
    pub fn new(settings: RecommendationSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RecommendationSettings {
        &self.settings
    }

    /// Sample up to `max_seeds` distinct track ids from `analysis`, uniformly
    /// without replacement, and compute the tolerance window of its summary.
    pub fn build_seed<R: Rng + ?Sized>(
        &self,
        analysis: &Analysis,
        max_seeds: usize,
        rng: &mut R,
    ) -> Result<Seed, EngineError> {
        let mut seen = HashSet::new();
        let distinct: Vec<&str> = analysis
            .tracks
            .iter()
            .map(|t| t.external_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();
        if distinct.is_empty() {
            return Err(EngineError::InsufficientTracks);
        }

        let track_ids = distinct
            .choose_multiple(rng, max_seeds.min(distinct.len()))
            .map(|id| id.to_string())
            .collect();

        Ok(Seed {
            track_ids,
            window: ToleranceWindow::around(&analysis.summary, &self.settings),
        })
    }
}
