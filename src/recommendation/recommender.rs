use super::seed::{Seed, SeedBuilder};
use crate::catalog::{Analysis, Track};
use crate::config::RecommendationSettings;
use crate::error::EngineResult;
use crate::reconciler::Reconciler;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub seed: Seed,
    /// Recommended tracks, resolved and stored, in remote order.
    pub tracks: Vec<Track>,
    pub remote_calls: usize,
}

/// Turns an analysis into recommended tracks via the remote catalog.
pub struct Recommender {
    reconciler: Arc<Reconciler>,
    seed_builder: SeedBuilder,
}

impl Recommender {
    pub fn new(reconciler: Arc<Reconciler>, settings: RecommendationSettings) -> Self {
        Self {
            reconciler,
            seed_builder: SeedBuilder::new(settings),
        }
    }

    /// Recommend up to `limit` tracks similar to `analysis`, seeded with the
    /// configured number of randomly sampled analysis tracks.
    pub async fn recommend(
        &self,
        analysis: &Analysis,
        limit: usize,
    ) -> EngineResult<Recommendation> {
        let seed = {
            let mut rng = rand::rng();
            self.seed_for(analysis, &mut rng)?
        };
        self.recommend_from_seed(seed, limit).await
    }

    pub fn seed_for<R: Rng + ?Sized>(
        &self,
        analysis: &Analysis,
        rng: &mut R,
    ) -> EngineResult<Seed> {
        let max_seeds = self.seed_builder.settings().max_seeds;
        self.seed_builder.build_seed(analysis, max_seeds, rng)
    }

    pub async fn recommend_from_seed(
        &self,
        seed: Seed,
        limit: usize,
    ) -> EngineResult<Recommendation> {
        let client = self.reconciler.client().clone();
        let (track_ids, calls) = self
            .reconciler
            .with_retry("recommendations", || {
                client.recommend(&seed.track_ids, &seed.window, limit)
            })
            .await?;

        let resolution = self.reconciler.resolve_tracks(&track_ids).await?;
        if !resolution.not_found.is_empty() {
            warn!(
                "{} recommended tracks could not be resolved: {}",
                resolution.not_found.len(),
                resolution.not_found.join(", ")
            );
        }
        info!(
            "Recommended {} tracks from {} seeds",
            resolution.entities.len(),
            seed.track_ids.len()
        );

        Ok(Recommendation {
            seed,
            tracks: resolution.entities,
            remote_calls: calls + resolution.remote_calls,
        })
    }
}
